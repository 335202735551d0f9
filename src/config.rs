//! Runtime configuration, loaded from TOML.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    dispatch::{AppRule, ProfileTable, default_app_rules},
    error::{Error, Result},
    types::{GestureLabel, Point},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON file holding recorded custom gestures.
    pub templates_path: Option<PathBuf>,
    pub detection: DetectionConfig,
    pub signs: SignConfig,
    pub roi: RoiConfig,
    pub swipe: SwipeConfig,
    pub tracking: TrackingConfig,
    pub pointer: PointerConfig,
    pub scheduler: SchedulerConfig,
    pub dispatch: DispatchConfig,
    pub profiles: ProfileTable,
    pub app_rules: Vec<AppRule>,
}

/// Passed through to the landmark detector untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignConfig {
    /// Votes a label needs inside the buffer before it is emitted.
    pub confirmation_frames: usize,
    pub vote_buffer_size: usize,
    /// Built-in labels allowed to leave the voter.
    pub enabled: Vec<GestureLabel>,
    /// Let recorded template names through without listing them in `enabled`.
    pub allow_custom: bool,
    /// Thumb-to-index tip distance that counts as a pinch for OK_SIGN.
    pub pinch_threshold: f32,
    /// Maximum mean squared error for a custom template match.
    pub template_threshold: f32,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            confirmation_frames: 2,
            vote_buffer_size: 5,
            enabled: GestureLabel::STATIC_SIGNS.to_vec(),
            allow_custom: true,
            pinch_threshold: 0.08,
            template_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    pub enabled: bool,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl RoiConfig {
    pub fn rect(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            enabled: true,
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Bounds are inclusive; a disabled region contains everything.
    pub fn contains(&self, (x, y): Point) -> bool {
        !self.enabled
            || ((self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y))
    }
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self::rect(0.35, 0.7, 0.65, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwipeConfig {
    pub history_length: usize,
    /// Net horizontal displacement per second.
    pub min_velocity: f32,
    pub min_distance_left: f32,
    pub min_distance_right: f32,
    pub max_slope: f32,
    pub max_mse: f32,
    pub max_y_std: f32,
    pub min_duration_secs: f32,
    pub cooldown_secs: f32,
}

impl SwipeConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f32(self.cooldown_secs)
    }

    pub fn min_duration(&self) -> Duration {
        Duration::from_secs_f32(self.min_duration_secs)
    }
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            history_length: 10,
            min_velocity: 0.4,
            min_distance_left: 0.02,
            min_distance_right: 0.02,
            max_slope: 1.0,
            max_mse: 0.02,
            max_y_std: 0.1,
            min_duration_secs: 0.05,
            cooldown_secs: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Consecutive frames without a hand before filters and buffers reset.
    pub max_missed_frames: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_missed_frames: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    pub enabled: bool,
    /// Thumb-to-index tip distance that counts as a click.
    pub click_threshold: f32,
    /// Smoothed movement below this is not reported as a move.
    pub dead_zone: f32,
    /// Inward camera margin mapped to the screen edges.
    pub screen_margin: f32,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            click_threshold: 0.06,
            dead_zone: 0.002,
            screen_margin: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sources faster than this have every other frame skipped.
    pub skip_above_fps: f32,
    pub latency_budget_ms: u64,
    pub latency_window: usize,
    pub downscale_factor: f32,
    /// Frames between luminance samples.
    pub luminance_interval: u64,
    pub low_light_on: f32,
    pub low_light_off: f32,
    pub low_light_initial: bool,
    pub channel_depth: usize,
    pub stop_timeout_ms: u64,
}

impl SchedulerConfig {
    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            skip_above_fps: 31.0,
            latency_budget_ms: 35,
            latency_window: 30,
            downscale_factor: 0.75,
            luminance_interval: 30,
            low_light_on: 80.0,
            low_light_off: 100.0,
            low_light_initial: true,
            channel_depth: 2,
            stop_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub cooldown_secs: f32,
}

impl DispatchConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f32(self.cooldown_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { cooldown_secs: 0.3 }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            (
                "detection.min_detection_confidence",
                self.detection.min_detection_confidence,
            ),
            (
                "detection.min_tracking_confidence",
                self.detection.min_tracking_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }

        if self.signs.vote_buffer_size == 0 {
            return Err(Error::Config("signs.vote_buffer_size must be > 0".into()));
        }
        if self.signs.confirmation_frames == 0
            || self.signs.confirmation_frames > self.signs.vote_buffer_size
        {
            return Err(Error::Config(format!(
                "signs.confirmation_frames must be in [1, {}], got {}",
                self.signs.vote_buffer_size, self.signs.confirmation_frames
            )));
        }

        let roi = &self.roi;
        if roi.enabled && (roi.x_min >= roi.x_max || roi.y_min >= roi.y_max) {
            return Err(Error::Config(format!(
                "roi must have x_min < x_max and y_min < y_max, got ({}, {})-({}, {})",
                roi.x_min, roi.y_min, roi.x_max, roi.y_max
            )));
        }

        if !(5..=15).contains(&self.swipe.history_length) {
            return Err(Error::Config(format!(
                "swipe.history_length must be in [5, 15], got {}",
                self.swipe.history_length
            )));
        }
        for (name, value) in [
            ("swipe.min_velocity", self.swipe.min_velocity),
            ("swipe.min_distance_left", self.swipe.min_distance_left),
            ("swipe.min_distance_right", self.swipe.min_distance_right),
            ("swipe.max_slope", self.swipe.max_slope),
            ("swipe.max_mse", self.swipe.max_mse),
            ("swipe.max_y_std", self.swipe.max_y_std),
            ("swipe.min_duration_secs", self.swipe.min_duration_secs),
            ("swipe.cooldown_secs", self.swipe.cooldown_secs),
            ("dispatch.cooldown_secs", self.dispatch.cooldown_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if self.swipe.min_duration_secs <= 0.0 {
            return Err(Error::Config(format!(
                "swipe.min_duration_secs must be > 0, got {}",
                self.swipe.min_duration_secs
            )));
        }

        if self.scheduler.low_light_on >= self.scheduler.low_light_off {
            return Err(Error::Config(format!(
                "scheduler.low_light_on ({}) must be below low_light_off ({})",
                self.scheduler.low_light_on, self.scheduler.low_light_off
            )));
        }
        if !(0.1..=1.0).contains(&self.scheduler.downscale_factor) {
            return Err(Error::Config(format!(
                "scheduler.downscale_factor must be in [0.1, 1], got {}",
                self.scheduler.downscale_factor
            )));
        }
        if self.scheduler.channel_depth == 0
            || self.scheduler.latency_window == 0
            || self.scheduler.luminance_interval == 0
        {
            return Err(Error::Config(
                "scheduler.channel_depth, latency_window and luminance_interval must be > 0"
                    .into(),
            ));
        }
        if !(0.0..0.5).contains(&self.pointer.screen_margin) {
            return Err(Error::Config(format!(
                "pointer.screen_margin must be in [0, 0.5), got {}",
                self.pointer.screen_margin
            )));
        }

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.app_rules.is_empty() {
            config.app_rules = default_app_rules();
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise returns defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                log::info!("config {} not found, using defaults", path.display());
                Ok(Self::with_default_rules())
            }
            None => Ok(Self::with_default_rules()),
        }
    }

    pub fn with_default_rules() -> Self {
        Self {
            app_rules: default_app_rules(),
            ..Self::default()
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
