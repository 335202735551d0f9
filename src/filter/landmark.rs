use super::kalman::{ConstantVelocityFilter, NoiseParams};
use crate::types::{Landmarks, NUM_LANDMARKS};

pub const LANDMARK_NOISE: NoiseParams = NoiseParams::new(0.005, 0.05);

/// Independent constant-velocity filter per keypoint.
pub struct LandmarkSmoother {
    filters: [ConstantVelocityFilter; NUM_LANDMARKS],
}

impl LandmarkSmoother {
    pub fn new() -> Self {
        Self::with_noise(LANDMARK_NOISE)
    }

    pub fn with_noise(noise: NoiseParams) -> Self {
        Self {
            filters: std::array::from_fn(|_| ConstantVelocityFilter::new(noise)),
        }
    }

    pub fn update(&mut self, raw: &Landmarks) -> Landmarks {
        let mut smoothed = raw.0;
        for ((filter, out), &(x, y)) in self
            .filters
            .iter_mut()
            .zip(smoothed.iter_mut())
            .zip(raw.0.iter())
        {
            *out = filter.update(x, y);
        }
        Landmarks(smoothed)
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }
}

impl Default for LandmarkSmoother {
    fn default() -> Self {
        Self::new()
    }
}
