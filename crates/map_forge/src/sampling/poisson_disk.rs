//! Poisson disk sampling: points no closer than a minimum distance.
use std::collections::VecDeque;
use std::f32::consts::TAU;

use glam::Vec2;
use mint::Vector2;
use rand::RngCore;

use crate::sampling::{rand01, PointSampling};

/// Candidates tried around an active point before it retires.
const MAX_ATTEMPTS: usize = 30;

/// Poisson disk sampling strategy.
#[derive(Debug, Clone)]
pub struct PoissonDiskSampling {
    /// Minimum distance between samples in cells.
    pub radius: f32,
}

impl PoissonDiskSampling {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }
}

impl PointSampling for PoissonDiskSampling {
    fn generate(&self, extent: Vector2<f32>, rng: &mut dyn RngCore) -> Vec<Vector2<f32>> {
        let extent = Vec2::from(extent);
        if !self.radius.is_finite() || self.radius <= 0.0 || extent.x <= 0.0 || extent.y <= 0.0 {
            return Vec::new();
        }
        BackgroundGrid::new(self.radius, extent)
            .fill(rng)
            .into_iter()
            .map(Into::into)
            .collect()
    }
}

/// Acceleration grid with at most one accepted point per cell.
struct BackgroundGrid {
    radius_squared: f32,
    radius: f32,
    cell: f32,
    cols: usize,
    rows: usize,
    slots: Vec<Option<Vec2>>,
    extent: Vec2,
}

impl BackgroundGrid {
    fn new(radius: f32, extent: Vec2) -> Self {
        let cell = radius / std::f32::consts::SQRT_2;
        let cols = (extent.x / cell).ceil() as usize + 1;
        let rows = (extent.y / cell).ceil() as usize + 1;
        Self {
            radius_squared: radius * radius,
            radius,
            cell,
            cols,
            rows,
            slots: vec![None; cols * rows],
            extent,
        }
    }

    fn slot_of(&self, p: Vec2) -> (usize, usize) {
        let x = ((p.x / self.cell) as usize).min(self.cols - 1);
        let y = ((p.y / self.cell) as usize).min(self.rows - 1);
        (x, y)
    }

    fn accepts(&self, p: Vec2) -> bool {
        if p.x < 0.0 || p.y < 0.0 || p.x >= self.extent.x || p.y >= self.extent.y {
            return false;
        }
        let (sx, sy) = self.slot_of(p);
        for y in sy.saturating_sub(2)..(sy + 3).min(self.rows) {
            for x in sx.saturating_sub(2)..(sx + 3).min(self.cols) {
                if let Some(q) = self.slots[y * self.cols + x] {
                    if p.distance_squared(q) < self.radius_squared {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn insert(&mut self, p: Vec2) {
        let (x, y) = self.slot_of(p);
        self.slots[y * self.cols + x] = Some(p);
    }

    fn fill(mut self, rng: &mut dyn RngCore) -> Vec<Vec2> {
        let first = Vec2::new(rand01(rng) * self.extent.x, rand01(rng) * self.extent.y);
        self.insert(first);
        let mut points = vec![first];
        let mut active = VecDeque::from([first]);

        while let Some(center) = active.pop_front() {
            let mut spawned = false;
            for _ in 0..MAX_ATTEMPTS {
                let angle = rand01(rng) * TAU;
                let distance = self.radius * (1.0 + rand01(rng));
                let candidate = center + Vec2::from_angle(angle) * distance;
                if self.accepts(candidate) {
                    self.insert(candidate);
                    points.push(candidate);
                    active.push_back(candidate);
                    spawned = true;
                }
            }
            if spawned {
                active.push_back(center);
            }
        }
        points
    }
}
