//! Constant-velocity Kalman filter for a single 2D point.
//!
//! State vector: [x, y, vx, vy]ᵀ. Only position is observed. The same type
//! backs every landmark and the pointer; call sites differ only in noise.

use nalgebra::{SMatrix, SVector};

type State = SVector<f32, 4>;
type Matrix4 = SMatrix<f32, 4, 4>;
type Matrix2x4 = SMatrix<f32, 2, 4>;
type Matrix4x2 = SMatrix<f32, 4, 2>;
type Matrix2 = SMatrix<f32, 2, 2>;
type Vector2 = SVector<f32, 2>;

/// Nominal frame interval used by the motion model.
pub const DEFAULT_DT: f32 = 1.0 / 30.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseParams {
    /// Process noise on position; velocity terms get twice this.
    pub process: f32,
    /// Measurement noise on the observed position.
    pub measurement: f32,
}

impl NoiseParams {
    pub const fn new(process: f32, measurement: f32) -> Self {
        Self {
            process,
            measurement,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConstantVelocityFilter {
    state: State,
    covariance: Matrix4,
    transition: Matrix4,
    process_noise: Matrix4,
    measurement_noise: Matrix2,
    initialized: bool,
}

impl ConstantVelocityFilter {
    pub fn new(noise: NoiseParams) -> Self {
        Self::with_dt(noise, DEFAULT_DT)
    }

    pub fn with_dt(noise: NoiseParams, dt: f32) -> Self {
        let mut process_noise = Matrix4::identity() * noise.process;
        process_noise[(2, 2)] = noise.process * 2.0;
        process_noise[(3, 3)] = noise.process * 2.0;

        Self {
            state: State::zeros(),
            covariance: Matrix4::identity(),
            transition: transition_matrix(dt),
            process_noise,
            measurement_noise: Matrix2::identity() * noise.measurement,
            initialized: false,
        }
    }

    pub fn set_measurement_noise(&mut self, measurement: f32) {
        self.measurement_noise = Matrix2::identity() * measurement;
    }

    pub fn measurement_noise(&self) -> f32 {
        self.measurement_noise[(0, 0)]
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn reset(&mut self) {
        self.state = State::zeros();
        self.covariance = Matrix4::identity();
        self.initialized = false;
    }

    /// Predict-then-correct against one measurement; returns the corrected position.
    ///
    /// The first measurement seeds position directly with zero velocity.
    pub fn update(&mut self, x: f32, y: f32) -> (f32, f32) {
        if !self.initialized {
            self.state = State::new(x, y, 0.0, 0.0);
            self.initialized = true;
            return (x, y);
        }

        self.predict();

        let h = observation_matrix();
        let innovation = Vector2::new(x, y) - h * self.state;
        let s = h * self.covariance * h.transpose() + self.measurement_noise;

        // A singular innovation covariance keeps the prediction.
        let Some(s_inv) = s.try_inverse() else {
            return self.position();
        };
        let gain: Matrix4x2 = self.covariance * h.transpose() * s_inv;

        self.state += gain * innovation;
        self.covariance = (Matrix4::identity() - gain * h) * self.covariance;

        self.position()
    }

    fn predict(&mut self) {
        self.state = self.transition * self.state;
        self.covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process_noise;
    }

    pub fn position(&self) -> (f32, f32) {
        (self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> (f32, f32) {
        if self.initialized {
            (self.state[2], self.state[3])
        } else {
            (0.0, 0.0)
        }
    }
}

/// ```text
/// | 1  0  dt 0  |
/// | 0  1  0  dt |
/// | 0  0  1  0  |
/// | 0  0  0  1  |
/// ```
fn transition_matrix(dt: f32) -> Matrix4 {
    Matrix4::new(
        1.0, 0.0, dt, 0.0, //
        0.0, 1.0, 0.0, dt, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

fn observation_matrix() -> Matrix2x4 {
    Matrix2x4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOISE: NoiseParams = NoiseParams::new(0.005, 0.05);

    #[test]
    fn first_measurement_passes_through() {
        let mut filter = ConstantVelocityFilter::new(NOISE);
        assert_eq!(filter.update(0.42, 0.17), (0.42, 0.17));
        assert_eq!(filter.velocity(), (0.0, 0.0));
    }

    #[test]
    fn correction_lands_between_prediction_and_measurement() {
        let mut filter = ConstantVelocityFilter::new(NOISE);
        filter.update(0.5, 0.5);
        let (x, y) = filter.update(0.6, 0.5);
        assert!(x > 0.5 && x < 0.6, "x = {x}");
        assert!((y - 0.5).abs() < 1e-6);
        assert!(filter.velocity().0 > 0.0);
    }

    #[test]
    fn tracks_constant_motion() {
        let mut filter = ConstantVelocityFilter::new(NOISE);
        let mut out = (0.0, 0.0);
        for i in 0..60 {
            out = filter.update(0.1 + i as f32 * 0.01, 0.3);
        }
        assert!((out.0 - 0.69).abs() < 0.01, "x = {}", out.0);
        let (vx, _) = filter.velocity();
        assert!((vx - 0.3).abs() < 0.05, "vx = {vx}");
    }

    #[test]
    fn reset_forgets_velocity() {
        let mut filter = ConstantVelocityFilter::new(NOISE);
        for i in 0..10 {
            filter.update(i as f32 * 0.05, 0.0);
        }
        filter.reset();
        assert!(!filter.is_initialized());
        assert_eq!(filter.update(0.9, 0.9), (0.9, 0.9));
        assert_eq!(filter.velocity(), (0.0, 0.0));
    }

    #[test]
    fn smaller_measurement_noise_follows_measurement_closer() {
        let mut loose = ConstantVelocityFilter::new(NOISE);
        let mut tight = ConstantVelocityFilter::new(NOISE);
        tight.set_measurement_noise(0.0025);
        loose.update(0.0, 0.0);
        tight.update(0.0, 0.0);
        let (lx, _) = loose.update(0.2, 0.0);
        let (tx, _) = tight.update(0.2, 0.0);
        assert!(tx > lx);
    }
}
