//! Boolean grid used for passability, land/water and placement layers.
use crate::error::{Error, Result};
use crate::mask::{hash_dimensions, FloatMask, Mask};

/// Row-major grid of flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BooleanMask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl BooleanMask {
    /// Create a new mask with every cell unset.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, false)
    }

    pub fn filled(width: usize, height: usize, value: bool) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Cells of `field` whose value lies in `[min, max]`.
    pub fn from_range(field: &FloatMask, min: f32, max: f32) -> Self {
        let (width, height) = field.size();
        Self {
            width,
            height,
            data: field.data().iter().map(|v| *v >= min && *v <= max).collect(),
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[bool] {
        &self.data
    }

    /// Get the flag at the given cell, returning `false` if out of bounds.
    pub fn get(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return false;
        }
        self.data[(y as usize) * self.width + x as usize]
    }

    /// Set the flag at the given cell. Out of bounds writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Number of set cells.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    pub fn invert(&mut self) {
        self.data.iter_mut().for_each(|v| *v = !*v);
    }

    pub fn and(&mut self, other: &BooleanMask) -> Result<()> {
        self.ensure_same_size(other)?;
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a &= *b;
        }
        Ok(())
    }

    /// Clear every cell that is set in `other`.
    pub fn and_not(&mut self, other: &BooleanMask) -> Result<()> {
        self.ensure_same_size(other)?;
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a &= !*b;
        }
        Ok(())
    }

    /// Keep only cells whose whole square neighbourhood of `radius` is set.
    /// Cells near the edge see the outside as unset.
    pub fn erode(&mut self, radius: usize) {
        if radius == 0 {
            return;
        }
        let r = radius as isize;
        let source = self.clone();
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                if !source.get(x, y) {
                    continue;
                }
                let keep = (-r..=r).all(|dy| (-r..=r).all(|dx| source.get(x + dx, y + dy)));
                self.set(x as usize, y as usize, keep);
            }
        }
    }

    /// Coordinates of all set cells in row-major order.
    pub fn positions(&self) -> Vec<(usize, usize)> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(|(i, _)| (i % self.width, i / self.width))
            .collect()
    }

    fn ensure_same_size(&self, other: &BooleanMask) -> Result<()> {
        if self.size() != other.size() {
            return Err(Error::Other(format!(
                "mask size mismatch: {:?} vs {:?}",
                self.size(),
                other.size()
            )));
        }
        Ok(())
    }
}

impl Mask for BooleanMask {
    fn hash_content(&self, hasher: &mut blake3::Hasher) {
        hash_dimensions(hasher, self.width, self.height);
        let bytes: Vec<u8> = self.data.iter().map(|v| u8::from(*v)).collect();
        hasher.update(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_range_selects_inclusive_band() {
        let mut field = FloatMask::new(3, 1);
        field.set(0, 0, 0.1);
        field.set(1, 0, 0.5);
        field.set(2, 0, 0.9);
        let mask = BooleanMask::from_range(&field, 0.5, 0.9);
        assert_eq!(mask.data(), &[false, true, true]);
    }

    #[test]
    fn and_not_clears_overlap() {
        let mut a = BooleanMask::filled(2, 1, true);
        let mut b = BooleanMask::new(2, 1);
        b.set(1, 0, true);
        a.and_not(&b).unwrap();
        assert_eq!(a.data(), &[true, false]);
    }

    #[test]
    fn erode_shrinks_from_edges() {
        let mut mask = BooleanMask::filled(5, 5, true);
        mask.erode(1);
        assert_eq!(mask.count(), 9);
        assert!(mask.get(2, 2));
        assert!(!mask.get(0, 2));
    }

    #[test]
    fn positions_are_row_major() {
        let mut mask = BooleanMask::new(3, 2);
        mask.set(2, 0, true);
        mask.set(0, 1, true);
        assert_eq!(mask.positions(), vec![(2, 0), (0, 1)]);
    }
}
