//! Horizontal swipe detection over a short centroid trajectory.
//!
//! Cheap rejections run first (velocity, distance, vertical spread); the
//! least-squares line fit only runs on trajectories that survive them.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::{
    config::SwipeConfig,
    types::{GestureLabel, Point},
};

const MIN_SAMPLES: usize = 5;

#[derive(Clone, Copy, Debug)]
struct Sample {
    x: f32,
    y: f32,
    t: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rejection {
    TooShort { duration: Duration },
    TooSlow { velocity: f32 },
    TooNear { distance: f32 },
    VerticalSpread { std_dev: f32 },
    DegenerateFit,
    TooSteep { slope: f32 },
    TooWavy { mse: f32 },
}

pub struct SwipeDetector {
    history: VecDeque<Sample>,
    config: SwipeConfig,
    last_swipe: Option<Instant>,
}

impl SwipeDetector {
    pub fn new(config: SwipeConfig) -> Self {
        let capacity = config.history_length.max(MIN_SAMPLES);
        Self {
            history: VecDeque::with_capacity(capacity),
            config,
            last_swipe: None,
        }
    }

    fn capacity(&self) -> usize {
        self.config.history_length.max(MIN_SAMPLES)
    }

    pub fn process(&mut self, centroid: Point, timestamp: Instant) -> GestureLabel {
        if self.history.len() == self.capacity() {
            self.history.pop_front();
        }
        self.history.push_back(Sample {
            x: centroid.0,
            y: centroid.1,
            t: timestamp,
        });

        if self.history.len() < MIN_SAMPLES || self.cooling_down(timestamp) {
            return GestureLabel::Unknown;
        }

        match self.evaluate() {
            Ok(dx) => {
                log::debug!("swipe accepted: dx {dx:.3}");
                self.history.clear();
                self.last_swipe = Some(timestamp);
                if dx > 0.0 {
                    GestureLabel::SwipeRight
                } else {
                    GestureLabel::SwipeLeft
                }
            }
            Err(rejection) => {
                log::trace!("swipe rejected: {rejection:?}");
                GestureLabel::Unknown
            }
        }
    }

    fn cooling_down(&self, now: Instant) -> bool {
        self.last_swipe
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.cooldown())
    }

    /// Net horizontal displacement when the trajectory qualifies.
    fn evaluate(&self) -> Result<f32, Rejection> {
        let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
            return Err(Rejection::DegenerateFit);
        };

        let dx = last.x - first.x;
        let distance = dx.abs();

        let duration = last.t.saturating_duration_since(first.t);
        if duration.is_zero() || duration < self.config.min_duration() {
            return Err(Rejection::TooShort { duration });
        }
        let velocity = distance / duration.as_secs_f32();
        if velocity < self.config.min_velocity {
            return Err(Rejection::TooSlow { velocity });
        }

        let min_distance = if dx > 0.0 {
            self.config.min_distance_right
        } else {
            self.config.min_distance_left
        };
        if distance < min_distance {
            return Err(Rejection::TooNear { distance });
        }

        let std_dev = population_std(self.history.iter().map(|s| s.y));
        if std_dev > self.config.max_y_std {
            return Err(Rejection::VerticalSpread { std_dev });
        }

        let fit = LineFit::least_squares(self.history.iter().map(|s| (s.x, s.y)))
            .ok_or(Rejection::DegenerateFit)?;
        if fit.slope.abs() > self.config.max_slope {
            return Err(Rejection::TooSteep { slope: fit.slope });
        }
        if fit.mse > self.config.max_mse {
            return Err(Rejection::TooWavy { mse: fit.mse });
        }

        Ok(dx)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

fn population_std(values: impl Iterator<Item = f32> + Clone) -> f32 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f32>() / n as f32;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f32>() / n as f32;
    var.sqrt()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineFit {
    pub slope: f32,
    pub intercept: f32,
    /// Mean squared residual of y against the fitted line.
    pub mse: f32,
}

impl LineFit {
    /// Ordinary least squares for `y = slope * x + intercept`.
    /// `None` when x has no spread or the result is not finite.
    pub fn least_squares(points: impl Iterator<Item = (f32, f32)> + Clone) -> Option<Self> {
        let n = points.clone().count();
        if n < 2 {
            return None;
        }
        let nf = n as f32;
        let (sum_x, sum_y) = points
            .clone()
            .fold((0.0f32, 0.0f32), |(sx, sy), (x, y)| (sx + x, sy + y));
        let (mean_x, mean_y) = (sum_x / nf, sum_y / nf);

        let (sxx, sxy) = points.clone().fold((0.0f32, 0.0f32), |(sxx, sxy), (x, y)| {
            let dx = x - mean_x;
            (sxx + dx * dx, sxy + dx * (y - mean_y))
        });
        if sxx <= f32::EPSILON {
            return None;
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let mse = points
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum::<f32>()
            / nf;

        (slope.is_finite() && intercept.is_finite() && mse.is_finite()).then_some(Self {
            slope,
            intercept,
            mse,
        })
    }
}
