//! Point sampling in mask space.
//!
//! Samplers propose positions inside `[0, width) x [0, height)`, measured in cells. Scatter
//! operators turn the proposed positions into marker cells of a [`crate::mask::BooleanMask`].
use mint::Vector2;
use rand::RngCore;

pub mod jitter_grid;
pub mod poisson_disk;

pub use jitter_grid::JitterGridSampling;
pub use poisson_disk::PoissonDiskSampling;

/// Trait for point sampling over a mask-sized domain.
pub trait PointSampling: Send + Sync {
    fn generate(&self, extent: Vector2<f32>, rng: &mut dyn RngCore) -> Vec<Vector2<f32>>;
}

/// Generate a random float in the range [0, 1).
#[inline]
pub(crate) fn rand01(rng: &mut dyn RngCore) -> f32 {
    (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0)
}

/// Cell containing `point`, or `None` when it lies outside a `width` x `height` grid.
pub fn cell_of(point: Vector2<f32>, width: usize, height: usize) -> Option<(usize, usize)> {
    if !(point.x >= 0.0 && point.y >= 0.0) {
        return None;
    }
    let (x, y) = (point.x.floor() as usize, point.y.floor() as usize);
    (x < width && y < height).then_some((x, y))
}
