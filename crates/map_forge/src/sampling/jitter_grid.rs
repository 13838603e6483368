//! Jittered-grid sampling: one point per grid cell, displaced inside its cell.
use glam::Vec2;
use mint::Vector2;
use rand::RngCore;

use crate::sampling::{rand01, PointSampling};

/// Jittered grid sampling.
#[derive(Debug, Clone)]
pub struct JitterGridSampling {
    /// Jitter amount in [0, 1], where 0 is cell centers.
    pub jitter: f32,
    /// Grid spacing in mask cells.
    pub spacing: f32,
}

impl JitterGridSampling {
    pub fn new(jitter: f32, spacing: f32) -> Self {
        Self {
            jitter: jitter.clamp(0.0, 1.0),
            spacing,
        }
    }
}

impl PointSampling for JitterGridSampling {
    fn generate(&self, extent: Vector2<f32>, rng: &mut dyn RngCore) -> Vec<Vector2<f32>> {
        let extent = Vec2::from(extent);
        if extent.x <= 0.0 || extent.y <= 0.0 {
            return Vec::new();
        }
        let spacing = if self.spacing.is_finite() && self.spacing > 0.0 {
            self.spacing
        } else {
            (extent.min_element() / 10.0).max(1.0)
        };

        let cols = ((extent.x / spacing).floor() as usize).max(1);
        let rows = ((extent.y / spacing).floor() as usize).max(1);
        let cell = Vec2::new(extent.x / cols as f32, extent.y / rows as f32);
        let reach = cell * 0.5 * self.jitter;
        let upper = extent - Vec2::splat(1e-3);

        let mut points = Vec::with_capacity(cols * rows);
        for j in 0..rows {
            for i in 0..cols {
                let center = Vec2::new(i as f32 + 0.5, j as f32 + 0.5) * cell;
                let offset = if self.jitter > 0.0 {
                    Vec2::new(rand01(rng) * 2.0 - 1.0, rand01(rng) * 2.0 - 1.0) * reach
                } else {
                    Vec2::ZERO
                };
                points.push((center + offset).clamp(Vec2::ZERO, upper).into());
            }
        }
        points
    }
}
