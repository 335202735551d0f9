//! Per-frame gesture analysis: smoothing, pointer, swipes and static signs.

pub mod shape;
pub mod swipe;
pub mod templates;
pub mod vote;

use std::{collections::BTreeSet, time::Instant};

use crate::{
    config::{Config, RoiConfig, SignConfig},
    filter::{LandmarkSmoother, PointerSmoother},
    types::{GestureLabel, INDEX_TIP, Landmarks, Point, PointerInfo, THUMB_TIP, distance},
};

pub use shape::{FingerFlags, match_shape};
pub use swipe::SwipeDetector;
pub use templates::TemplateStore;
pub use vote::VoteBuffer;

/// Shape rules, template fallback, region gate and temporal vote.
pub struct SignRecognizer {
    templates: TemplateStore,
    votes: VoteBuffer,
    roi: RoiConfig,
    enabled: BTreeSet<GestureLabel>,
    allow_custom: bool,
    confirmation_frames: usize,
    pinch_threshold: f32,
    template_threshold: f32,
}

impl SignRecognizer {
    pub fn new(config: &SignConfig, roi: RoiConfig, templates: TemplateStore) -> Self {
        Self {
            templates,
            votes: VoteBuffer::new(config.vote_buffer_size),
            roi,
            enabled: config.enabled.iter().cloned().collect(),
            allow_custom: config.allow_custom,
            confirmation_frames: config.confirmation_frames,
            pinch_threshold: config.pinch_threshold,
            template_threshold: config.template_threshold,
        }
    }

    /// Single-frame label before voting.
    pub fn raw_label(&self, landmarks: &Landmarks) -> GestureLabel {
        if let Some(label) = match_shape(landmarks, self.pinch_threshold) {
            return label;
        }
        match self.templates.find_match(landmarks, self.template_threshold) {
            Some((name, error)) => {
                log::trace!("template '{name}' matched with error {error:.4}");
                GestureLabel::Custom(name.to_string())
            }
            None => GestureLabel::Unknown,
        }
    }

    pub fn in_region(&self, centroid: Point) -> bool {
        self.roi.contains(centroid)
    }

    pub fn classify(&mut self, landmarks: &Landmarks, centroid: Point) -> GestureLabel {
        if !self.in_region(centroid) {
            self.votes.clear();
            return GestureLabel::Unknown;
        }

        self.votes.push(self.raw_label(landmarks));
        match self.votes.majority() {
            Some((label, count)) if count >= self.confirmation_frames && self.is_allowed(label) => {
                label.clone()
            }
            _ => GestureLabel::Unknown,
        }
    }

    fn is_allowed(&self, label: &GestureLabel) -> bool {
        match label {
            GestureLabel::Custom(_) if self.allow_custom => true,
            label => self.enabled.contains(label),
        }
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }

    pub fn pending_votes(&self) -> usize {
        self.votes.len()
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }
}

/// What the engine concluded about one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameAnalysis {
    pub gesture: GestureLabel,
    pub pointer: Option<PointerInfo>,
    pub landmarks: Option<Landmarks>,
    pub smoothed: Option<Landmarks>,
    pub centroid: Option<Point>,
    pub in_roi: bool,
}

/// Owns every piece of per-hand state; driven once per processed frame.
pub struct GestureEngine {
    landmark_smoother: LandmarkSmoother,
    pointer_smoother: PointerSmoother,
    swipe: SwipeDetector,
    signs: SignRecognizer,
    click_threshold: f32,
    dead_zone: f32,
    max_missed_frames: u32,
    missed_frames: u32,
    last_pointer: Option<Point>,
}

impl GestureEngine {
    pub fn new(config: &Config, templates: TemplateStore) -> Self {
        Self {
            landmark_smoother: LandmarkSmoother::new(),
            pointer_smoother: PointerSmoother::new(),
            swipe: SwipeDetector::new(config.swipe.clone()),
            signs: SignRecognizer::new(&config.signs, config.roi, templates),
            click_threshold: config.pointer.click_threshold,
            dead_zone: config.pointer.dead_zone,
            max_missed_frames: config.tracking.max_missed_frames,
            missed_frames: 0,
            last_pointer: None,
        }
    }

    pub fn process(&mut self, landmarks: Option<&Landmarks>, now: Instant) -> FrameAnalysis {
        let Some(raw) = landmarks else {
            self.on_missed_frame();
            return FrameAnalysis::default();
        };
        self.missed_frames = 0;

        let smoothed = self.landmark_smoother.update(raw);

        // The pointer cascade does its own smoothing, so it takes the raw tip.
        let (tip_x, tip_y) = raw.point(INDEX_TIP);
        let (x, y) = self.pointer_smoother.update_at(tip_x, tip_y, now);
        let click =
            distance(smoothed.point(THUMB_TIP), smoothed.point(INDEX_TIP)) < self.click_threshold;
        let moving = self
            .last_pointer
            .is_some_and(|last| distance(last, (x, y)) > self.dead_zone);
        self.last_pointer = Some((x, y));

        let centroid = smoothed.centroid();
        let in_roi = self.signs.in_region(centroid);
        let swipe = self.swipe.process(centroid, now);
        let gesture = if swipe.is_unknown() {
            self.signs.classify(&smoothed, centroid)
        } else {
            self.signs.clear();
            swipe
        };

        FrameAnalysis {
            gesture,
            pointer: Some(PointerInfo { x, y, click, moving }),
            landmarks: Some(*raw),
            smoothed: Some(smoothed),
            centroid: Some(centroid),
            in_roi,
        }
    }

    fn on_missed_frame(&mut self) {
        self.missed_frames = self.missed_frames.saturating_add(1);
        if self.missed_frames <= self.max_missed_frames {
            return;
        }
        if self.missed_frames == self.max_missed_frames + 1 {
            log::debug!(
                "hand lost for {} frames, resetting tracking state",
                self.missed_frames
            );
        }
        self.reset();
    }

    pub fn reset(&mut self) {
        self.landmark_smoother.reset();
        self.pointer_smoother.reset();
        self.swipe.reset();
        self.signs.clear();
        self.last_pointer = None;
    }

    pub fn missed_frames(&self) -> u32 {
        self.missed_frames
    }

    pub fn signs(&self) -> &SignRecognizer {
        &self.signs
    }
}
