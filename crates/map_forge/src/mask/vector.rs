//! Four-channel grid used for normal maps and texture splat layers.
use glam::Vec4;

use crate::mask::{hash_dimensions, Mask};

/// Row-major grid of [`Vec4`] values.
#[derive(Clone, Debug, PartialEq)]
pub struct Vector4Mask {
    width: usize,
    height: usize,
    data: Vec<Vec4>,
}

impl Vector4Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![Vec4::ZERO; width * height],
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[Vec4] {
        &self.data
    }

    /// Get the value at the given cell, returning zero if out of bounds.
    pub fn get(&self, x: isize, y: isize) -> Vec4 {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return Vec4::ZERO;
        }
        self.data[(y as usize) * self.width + x as usize]
    }

    pub fn set(&mut self, x: usize, y: usize, value: Vec4) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }
}

impl Mask for Vector4Mask {
    fn hash_content(&self, hasher: &mut blake3::Hasher) {
        hash_dimensions(hasher, self.width, self.height);
        for v in &self.data {
            for c in v.to_array() {
                hasher.update(&c.to_bits().to_le_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_cells() {
        let mut mask = Vector4Mask::new(2, 2);
        mask.set(1, 0, Vec4::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(mask.get(1, 0), Vec4::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(mask.get(5, 5), Vec4::ZERO);
    }

    #[test]
    fn hash_changes_with_channel_content() {
        let a = Vector4Mask::new(2, 2);
        let mut b = a.clone();
        b.set(0, 0, Vec4::W);
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
