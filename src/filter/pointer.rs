use std::{collections::VecDeque, time::Instant};

use super::{
    kalman::{ConstantVelocityFilter, NoiseParams},
    one_euro::{OneEuroFilter, OneEuroParams},
};

pub const POINTER_NOISE: NoiseParams = NoiseParams::new(0.02, 0.08);

const SPEED_WINDOW: usize = 2;

/// (average speed lower bound, measurement noise multiplier), checked in order.
const SPEED_GAINS: &[(f32, f32)] = &[(0.04, 0.05), (0.02, 0.1), (0.008, 0.3), (0.002, 0.6)];
const STILL_GAIN: f32 = 1.0;

/// Two-stage cursor smoother: adaptive Kalman, then per-axis One Euro.
pub struct PointerSmoother {
    kalman: ConstantVelocityFilter,
    base_measurement_noise: f32,
    euro_x: OneEuroFilter,
    euro_y: OneEuroFilter,
    last_raw: Option<(f32, f32)>,
    speeds: VecDeque<f32>,
}

impl PointerSmoother {
    pub fn new() -> Self {
        Self::with_params(POINTER_NOISE, OneEuroParams::POINTER)
    }

    pub fn with_params(noise: NoiseParams, euro: OneEuroParams) -> Self {
        Self {
            kalman: ConstantVelocityFilter::new(noise),
            base_measurement_noise: noise.measurement,
            euro_x: OneEuroFilter::new(euro),
            euro_y: OneEuroFilter::new(euro),
            last_raw: None,
            speeds: VecDeque::with_capacity(SPEED_WINDOW),
        }
    }

    pub fn update(&mut self, x: f32, y: f32) -> (f32, f32) {
        self.update_at(x, y, Instant::now())
    }

    pub fn update_at(&mut self, x: f32, y: f32, now: Instant) -> (f32, f32) {
        if let Some((px, py)) = self.last_raw {
            if self.speeds.len() == SPEED_WINDOW {
                self.speeds.pop_front();
            }
            self.speeds.push_back((x - px).hypot(y - py));

            let avg = self.speeds.iter().sum::<f32>() / self.speeds.len() as f32;
            self.kalman
                .set_measurement_noise(self.base_measurement_noise * speed_gain(avg));
        }
        self.last_raw = Some((x, y));

        let (kx, ky) = self.kalman.update(x, y);
        (self.euro_x.filter(kx, now), self.euro_y.filter(ky, now))
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.kalman.velocity()
    }

    pub fn reset(&mut self) {
        self.kalman.reset();
        self.kalman.set_measurement_noise(self.base_measurement_noise);
        self.euro_x.reset();
        self.euro_y.reset();
        self.last_raw = None;
        self.speeds.clear();
    }
}

impl Default for PointerSmoother {
    fn default() -> Self {
        Self::new()
    }
}

fn speed_gain(avg_speed: f32) -> f32 {
    SPEED_GAINS
        .iter()
        .find(|(floor, _)| avg_speed > *floor)
        .map(|(_, gain)| *gain)
        .unwrap_or(STILL_GAIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn speed_regimes_pick_expected_gain() {
        assert_eq!(speed_gain(0.05), 0.05);
        assert_eq!(speed_gain(0.03), 0.1);
        assert_eq!(speed_gain(0.01), 0.3);
        assert_eq!(speed_gain(0.005), 0.6);
        assert_eq!(speed_gain(0.002), 1.0);
        assert_eq!(speed_gain(0.0), 1.0);
    }

    #[test]
    fn constant_input_converges() {
        let mut smoother = PointerSmoother::new();
        let t0 = Instant::now();
        let mut out = (0.0, 0.0);
        for i in 0..12 {
            out = smoother.update_at(0.61, 0.27, t0 + Duration::from_millis(33 * i));
        }
        assert!((out.0 - 0.61).abs() < 1e-4, "x = {}", out.0);
        assert!((out.1 - 0.27).abs() < 1e-4, "y = {}", out.1);
    }

    #[test]
    fn converges_after_a_jump() {
        let mut smoother = PointerSmoother::new();
        let t0 = Instant::now();
        smoother.update_at(0.2, 0.2, t0);
        let mut out = (0.0, 0.0);
        for i in 1..=40 {
            out = smoother.update_at(0.5, 0.6, t0 + Duration::from_millis(33 * i));
        }
        assert!((out.0 - 0.5).abs() < 0.02, "x = {}", out.0);
        assert!((out.1 - 0.6).abs() < 0.02, "y = {}", out.1);
    }

    #[test]
    fn fast_motion_tightens_measurement_noise() {
        let mut smoother = PointerSmoother::new();
        let t0 = Instant::now();
        smoother.update_at(0.1, 0.5, t0);
        smoother.update_at(0.2, 0.5, t0 + Duration::from_millis(33));
        assert!((smoother.kalman.measurement_noise() - 0.08 * 0.05).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_both_stages() {
        let mut smoother = PointerSmoother::new();
        let t0 = Instant::now();
        for i in 0..8 {
            smoother.update_at(0.1 + i as f32 * 0.05, 0.5, t0 + Duration::from_millis(33 * i));
        }
        assert!(smoother.velocity().0 > 0.0);

        smoother.reset();
        assert_eq!(smoother.velocity(), (0.0, 0.0));
        let out = smoother.update_at(0.9, 0.1, t0 + Duration::from_secs(2));
        assert_eq!(out, (0.9, 0.1));
    }
}
