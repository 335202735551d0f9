//! Recorded landmark traces played back as a frame source plus detector.
//!
//! One JSON object per line: `{"t": 0.033, "landmarks": [[x, y], ...]}` with
//! exactly 21 points, or `"landmarks": null` for a frame without a hand.

use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use super::{FrameSource, LandmarkDetector};
use crate::types::{Frame, Landmarks, Point};

const DEFAULT_FRAME_SIZE: (u32, u32) = (320, 240);
const FALLBACK_FPS: f32 = 30.0;
const BACKGROUND: [u8; 4] = [24, 24, 27, 255];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TraceLine {
    t: f64,
    landmarks: Option<Vec<Point>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub offset: Duration,
    pub landmarks: Option<Landmarks>,
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    frames: Vec<TraceFrame>,
}

impl Trace {
    pub fn new(frames: Vec<TraceFrame>) -> Self {
        Self { frames }
    }

    /// Evenly spaced frames at `fps`.
    pub fn from_landmarks(fps: f32, landmarks: impl IntoIterator<Item = Option<Landmarks>>) -> Self {
        let step = 1.0 / fps.max(1.0) as f64;
        let frames = landmarks
            .into_iter()
            .enumerate()
            .map(|(i, landmarks)| TraceFrame {
                offset: Duration::from_secs_f64(step * i as f64),
                landmarks,
            })
            .collect();
        Self { frames }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open trace {}", path.display()))?;
        Self::parse(BufReader::new(file))
            .with_context(|| format!("failed to read trace {}", path.display()))
    }

    pub fn parse(reader: impl BufRead) -> Result<Self> {
        let mut frames = Vec::new();
        let mut last_t = f64::NEG_INFINITY;
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TraceLine =
                serde_json::from_str(&line).with_context(|| format!("line {}", n + 1))?;
            if !entry.t.is_finite() || entry.t < 0.0 || entry.t < last_t {
                return Err(anyhow!(
                    "line {}: timestamps must be non-negative and non-decreasing",
                    n + 1
                ));
            }
            last_t = entry.t;

            let landmarks = entry
                .landmarks
                .map(|points| {
                    Landmarks::from_slice(&points).ok_or_else(|| {
                        anyhow!("line {}: expected 21 points, found {}", n + 1, points.len())
                    })
                })
                .transpose()?;
            frames.push(TraceFrame {
                offset: Duration::from_secs_f64(entry.t),
                landmarks,
            });
        }
        Ok(Self { frames })
    }

    pub fn write(&self, mut writer: impl Write) -> Result<()> {
        for frame in &self.frames {
            let line = TraceLine {
                t: frame.offset.as_secs_f64(),
                landmarks: frame.landmarks.map(|l| l.0.to_vec()),
            };
            serde_json::to_writer(&mut writer, &line)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[TraceFrame] {
        &self.frames
    }

    /// Average rate over the whole trace.
    pub fn frame_rate(&self) -> f32 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) if self.frames.len() > 1 => {
                let span = last.offset.saturating_sub(first.offset).as_secs_f32();
                if span > 0.0 {
                    (self.frames.len() - 1) as f32 / span
                } else {
                    FALLBACK_FPS
                }
            }
            _ => FALLBACK_FPS,
        }
    }

    /// Source and detector sharing this trace.
    pub fn into_parts(self) -> (TraceSource, TraceDetector) {
        let shared = Arc::new(self);
        (TraceSource::new(shared.clone()), TraceDetector::new(shared))
    }
}

/// Emits one blank frame per trace entry, stamped with the trace time.
pub struct TraceSource {
    trace: Arc<Trace>,
    next: usize,
    size: (u32, u32),
    realtime: bool,
    started: Option<Instant>,
}

impl TraceSource {
    pub fn new(trace: Arc<Trace>) -> Self {
        Self {
            trace,
            next: 0,
            size: DEFAULT_FRAME_SIZE,
            realtime: false,
            started: None,
        }
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width.max(1), height.max(1));
        self
    }

    /// Sleep until each frame is due instead of reading as fast as possible.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl FrameSource for TraceSource {
    fn read(&mut self) -> Result<Option<Frame>> {
        let Some(entry) = self.trace.frames.get(self.next) else {
            return Ok(None);
        };
        let started = *self.started.get_or_insert_with(Instant::now);
        let timestamp = started + entry.offset;
        if self.realtime {
            let now = Instant::now();
            if timestamp > now {
                thread::sleep(timestamp - now);
            }
        }

        let index = self.next as u64;
        self.next += 1;
        let (width, height) = self.size;
        Ok(Some(Frame::filled(width, height, BACKGROUND, index, timestamp)))
    }

    fn frame_rate(&self) -> f32 {
        self.trace.frame_rate()
    }
}

/// Answers with the landmarks recorded for the frame's index.
pub struct TraceDetector {
    trace: Arc<Trace>,
}

impl TraceDetector {
    pub fn new(trace: Arc<Trace>) -> Self {
        Self { trace }
    }
}

impl LandmarkDetector for TraceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>> {
        let entry = usize::try_from(frame.index)
            .ok()
            .and_then(|i| self.trace.frames.get(i))
            .ok_or_else(|| anyhow!("frame {} is past the end of the trace", frame.index))?;
        Ok(entry.landmarks)
    }
}
