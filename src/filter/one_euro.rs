//! One Euro filter: adaptive low-pass whose cutoff rises with speed.

use std::{f32::consts::PI, time::Instant};

/// Fallback interval when timestamps do not advance.
const DEFAULT_DT: f32 = 1.0 / 60.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OneEuroParams {
    /// Cutoff (Hz) when still; lower is smoother.
    pub min_cutoff: f32,
    /// Speed coefficient; higher lets fast motion through.
    pub beta: f32,
    /// Cutoff (Hz) for the derivative estimate.
    pub d_cutoff: f32,
}

impl OneEuroParams {
    /// Tuned for cursor control: fast motion is passed almost unfiltered.
    pub const POINTER: OneEuroParams = OneEuroParams {
        min_cutoff: 4.0,
        beta: 1.2,
        d_cutoff: 1.0,
    };
}

#[derive(Clone, Debug)]
pub struct OneEuroFilter {
    params: OneEuroParams,
    x_prev: Option<f32>,
    dx_prev: f32,
    t_prev: Option<Instant>,
}

impl OneEuroFilter {
    pub fn new(params: OneEuroParams) -> Self {
        Self {
            params,
            x_prev: None,
            dx_prev: 0.0,
            t_prev: None,
        }
    }

    fn smoothing_factor(cutoff: f32, dt: f32) -> f32 {
        let tau = 1.0 / (2.0 * PI * cutoff);
        1.0 / (1.0 + tau / dt)
    }

    pub fn filter(&mut self, x: f32, t: Instant) -> f32 {
        let (Some(x_prev), Some(t_prev)) = (self.x_prev, self.t_prev) else {
            self.x_prev = Some(x);
            self.t_prev = Some(t);
            return x;
        };

        let mut dt = t.saturating_duration_since(t_prev).as_secs_f32();
        if dt <= 0.0 {
            dt = DEFAULT_DT;
        }

        let dx = (x - x_prev) / dt;
        let a_d = Self::smoothing_factor(self.params.d_cutoff, dt);
        let dx_hat = a_d * dx + (1.0 - a_d) * self.dx_prev;

        let cutoff = self.params.min_cutoff + self.params.beta * dx_hat.abs();
        let a = Self::smoothing_factor(cutoff, dt);
        let x_hat = a * x + (1.0 - a) * x_prev;

        self.x_prev = Some(x_hat);
        self.dx_prev = dx_hat;
        self.t_prev = Some(t);

        x_hat
    }

    pub fn reset(&mut self) {
        self.x_prev = None;
        self.dx_prev = 0.0;
        self.t_prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_sample_is_returned_unchanged() {
        let mut filter = OneEuroFilter::new(OneEuroParams::POINTER);
        assert_eq!(filter.filter(0.37, Instant::now()), 0.37);
    }

    #[test]
    fn step_is_attenuated_then_converges() {
        let mut filter = OneEuroFilter::new(OneEuroParams::POINTER);
        let t0 = Instant::now();
        filter.filter(0.0, t0);
        let first = filter.filter(1.0, t0 + Duration::from_millis(16));
        assert!(first > 0.0 && first < 1.0, "first = {first}");

        let mut last = first;
        for i in 2..40 {
            last = filter.filter(1.0, t0 + Duration::from_millis(16 * i));
        }
        assert!((last - 1.0).abs() < 1e-3, "last = {last}");
    }

    #[test]
    fn stalled_clock_uses_default_interval() {
        let mut filter = OneEuroFilter::new(OneEuroParams::POINTER);
        let t0 = Instant::now();
        filter.filter(0.0, t0);
        let out = filter.filter(1.0, t0);
        assert!(out.is_finite());
        assert!(out > 0.0 && out < 1.0);
    }

    #[test]
    fn faster_motion_is_filtered_less() {
        let t0 = Instant::now();
        let step = Duration::from_millis(33);

        let mut slow = OneEuroFilter::new(OneEuroParams::POINTER);
        let mut fast = OneEuroFilter::new(OneEuroParams::POINTER);
        slow.filter(0.0, t0);
        fast.filter(0.0, t0);

        let slow_out = slow.filter(0.01, t0 + step);
        let fast_out = fast.filter(0.2, t0 + step);

        assert!(fast_out / 0.2 > slow_out / 0.01);
    }

    #[test]
    fn reset_reseeds_state() {
        let mut filter = OneEuroFilter::new(OneEuroParams::POINTER);
        let t0 = Instant::now();
        filter.filter(0.1, t0);
        filter.filter(0.2, t0 + Duration::from_millis(10));
        filter.reset();
        assert_eq!(filter.filter(0.8, t0 + Duration::from_millis(20)), 0.8);
    }
}
