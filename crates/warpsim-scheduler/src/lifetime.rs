//! Client lifetime sampling.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{SchedulerError, SchedulerResult};

/// Draws client lifetimes (in ticks) from a Gaussian, truncated toward
/// zero and floored at 1.
#[derive(Debug, Clone, Copy)]
pub struct LifetimeSampler {
    dist: Normal<f64>,
}

impl LifetimeSampler {
    pub fn new(mean: f64, stddev: f64) -> SchedulerResult<Self> {
        let dist = Normal::new(mean, stddev).map_err(|e| SchedulerError::Lifetime(e.to_string()))?;
        Ok(Self { dist })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let ticks = self.dist.sample(rng) as i64;
        ticks.clamp(1, u32::MAX as i64) as u32
    }
}
