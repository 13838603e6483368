//! Scalar `f32` grid used for heightmaps, slopes and intermediate fields.
use crate::error::{Error, Result};
use crate::mask::{hash_dimensions, Mask};

/// Row-major grid of `f32` values.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatMask {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl FloatMask {
    /// Create a new mask with all values set to zero.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Create a new mask with all values set to `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Get the size of the mask as `(width, height)`.
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Get the value at the given cell, returning `0.0` if out of bounds.
    pub fn get(&self, x: isize, y: isize) -> f32 {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return 0.0;
        }
        self.data[(y as usize) * self.width + x as usize]
    }

    /// Get the value at the given cell, clamping coordinates to the mask edge.
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.width + cx]
    }

    /// Set the value at the given cell. Out of bounds writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    pub fn add_scalar(&mut self, value: f32) {
        self.data.iter_mut().for_each(|v| *v += value);
    }

    pub fn multiply_scalar(&mut self, value: f32) {
        self.data.iter_mut().for_each(|v| *v *= value);
    }

    /// Cell-wise sum with another mask of the same size.
    pub fn add(&mut self, other: &FloatMask) -> Result<()> {
        self.ensure_same_size(other)?;
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    /// Cell-wise product with another mask of the same size.
    pub fn multiply(&mut self, other: &FloatMask) -> Result<()> {
        self.ensure_same_size(other)?;
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a *= b;
        }
        Ok(())
    }

    /// Smallest and largest value, or `None` for an empty mask.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut iter = self.data.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Rescale values linearly into `[0, 1]`. A flat mask becomes all zeros.
    pub fn normalize(&mut self) {
        let Some((lo, hi)) = self.min_max() else {
            return;
        };
        let range = hi - lo;
        if range <= f32::EPSILON {
            self.data.iter_mut().for_each(|v| *v = 0.0);
            return;
        }
        self.data.iter_mut().for_each(|v| *v = (*v - lo) / range);
    }

    /// Box blur with the given radius in cells, using a summed-area table.
    pub fn blur(&mut self, radius: usize) {
        if radius == 0 || self.data.is_empty() {
            return;
        }
        let (w, h) = (self.width, self.height);
        let stride = w + 1;
        let mut sums = vec![0.0f64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0.0f64;
            for x in 0..w {
                row += self.data[y * w + x] as f64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }

        for y in 0..h {
            let y0 = y.saturating_sub(radius);
            let y1 = (y + radius + 1).min(h);
            for x in 0..w {
                let x0 = x.saturating_sub(radius);
                let x1 = (x + radius + 1).min(w);
                let total = sums[y1 * stride + x1] - sums[y0 * stride + x1]
                    - sums[y1 * stride + x0]
                    + sums[y0 * stride + x0];
                let count = ((x1 - x0) * (y1 - y0)) as f64;
                self.data[y * w + x] = (total / count) as f32;
            }
        }
    }

    /// Gradient magnitude from central differences, with clamped edges.
    pub fn gradient_magnitude(&self) -> FloatMask {
        let mut out = FloatMask::new(self.width, self.height);
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let dx = (self.get_clamped(x + 1, y) - self.get_clamped(x - 1, y)) * 0.5;
                let dy = (self.get_clamped(x, y + 1) - self.get_clamped(x, y - 1)) * 0.5;
                out.set(x as usize, y as usize, (dx * dx + dy * dy).sqrt());
            }
        }
        out
    }

    pub(crate) fn ensure_same_size(&self, other: &FloatMask) -> Result<()> {
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

impl Mask for FloatMask {
    fn hash_content(&self, hasher: &mut blake3::Hasher) {
        hash_dimensions(hasher, self.width, self.height);
        for v in &self.data {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn get_returns_zero_outside_bounds() {
        let mask = FloatMask::filled(2, 2, 1.0);
        assert_eq!(mask.get(-1, 0), 0.0);
        assert_eq!(mask.get(2, 1), 0.0);
        assert_eq!(mask.get(1, 1), 1.0);
    }

    #[test]
    fn normalize_maps_range_to_unit_interval() {
        let mut mask = FloatMask::new(3, 1);
        mask.set(0, 0, 2.0);
        mask.set(1, 0, 4.0);
        mask.set(2, 0, 6.0);
        mask.normalize();
        assert_eq!(mask.data(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn normalize_flattens_constant_mask() {
        let mut mask = FloatMask::filled(2, 2, 3.0);
        mask.normalize();
        assert!(mask.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn blur_preserves_constant_field() {
        let mut mask = FloatMask::filled(5, 4, 0.7);
        mask.blur(2);
        for v in mask.data() {
            approx_eq(*v, 0.7);
        }
    }

    #[test]
    fn blur_spreads_a_spike() {
        let mut mask = FloatMask::new(3, 3);
        mask.set(1, 1, 9.0);
        mask.blur(1);
        approx_eq(mask.get(1, 1), 1.0);
        approx_eq(mask.get(0, 0), 9.0 / 4.0);
    }

    #[test]
    fn gradient_of_ramp_is_constant_inside() {
        let mut mask = FloatMask::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                mask.set(x, y, x as f32);
            }
        }
        let grad = mask.gradient_magnitude();
        approx_eq(grad.get(1, 1), 1.0);
        approx_eq(grad.get(2, 3), 1.0);
    }

    #[test]
    fn add_rejects_size_mismatch() {
        let mut a = FloatMask::new(2, 2);
        let b = FloatMask::new(3, 2);
        assert!(a.add(&b).is_err());
    }
}
