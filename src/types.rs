use std::{fmt, time::Instant};

use serde::{Deserialize, Serialize};

pub const NUM_LANDMARKS: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

pub type Point = (f32, f32);

/// One hand's keypoints in image-normalized coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmarks(pub [Point; NUM_LANDMARKS]);

impl Landmarks {
    pub fn from_slice(points: &[Point]) -> Option<Self> {
        let points: [Point; NUM_LANDMARKS] = points.try_into().ok()?;
        Some(Self(points))
    }

    pub fn point(&self, idx: usize) -> Point {
        self.0[idx]
    }

    pub fn points(&self) -> &[Point; NUM_LANDMARKS] {
        &self.0
    }

    /// Mean of wrist, index MCP and pinky MCP; the tracked point for swipes.
    pub fn centroid(&self) -> Point {
        let (wx, wy) = self.0[WRIST];
        let (ix, iy) = self.0[INDEX_MCP];
        let (px, py) = self.0[PINKY_MCP];
        ((wx + ix + px) / 3.0, (wy + iy + py) / 3.0)
    }
}

pub fn distance(a: Point, b: Point) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Sequence number assigned by the frame source.
    pub index: u64,
    pub timestamp: Instant,
}

impl Frame {
    pub fn filled(width: u32, height: u32, rgba: [u8; 4], index: u64, timestamp: Instant) -> Self {
        let len = width as usize * height as usize;
        let mut buffer = Vec::with_capacity(len * 4);
        for _ in 0..len {
            buffer.extend_from_slice(&rgba);
        }
        Self {
            rgba: buffer,
            width,
            height,
            index,
            timestamp,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GestureLabel {
    #[default]
    Unknown,
    OpenPalm,
    Fist,
    IndexPointingUp,
    VSign,
    Spiderman,
    OkSign,
    ThumbsUp,
    ThumbsDown,
    SwipeLeft,
    SwipeRight,
    /// A user-recorded template name.
    Custom(String),
}

impl GestureLabel {
    pub const STATIC_SIGNS: [GestureLabel; 8] = [
        GestureLabel::OpenPalm,
        GestureLabel::Fist,
        GestureLabel::IndexPointingUp,
        GestureLabel::VSign,
        GestureLabel::Spiderman,
        GestureLabel::OkSign,
        GestureLabel::ThumbsUp,
        GestureLabel::ThumbsDown,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            GestureLabel::Unknown => "UNKNOWN",
            GestureLabel::OpenPalm => "OPEN_PALM",
            GestureLabel::Fist => "FIST",
            GestureLabel::IndexPointingUp => "INDEX_POINTING_UP",
            GestureLabel::VSign => "V_SIGN",
            GestureLabel::Spiderman => "SPIDERMAN",
            GestureLabel::OkSign => "OK_SIGN",
            GestureLabel::ThumbsUp => "THUMBS_UP",
            GestureLabel::ThumbsDown => "THUMBS_DOWN",
            GestureLabel::SwipeLeft => "SWIPE_LEFT",
            GestureLabel::SwipeRight => "SWIPE_RIGHT",
            GestureLabel::Custom(name) => name,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, GestureLabel::Unknown)
    }

    pub fn is_swipe(&self) -> bool {
        matches!(self, GestureLabel::SwipeLeft | GestureLabel::SwipeRight)
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            GestureLabel::OpenPalm => "🖐 ",
            GestureLabel::Fist => "✊ ",
            GestureLabel::IndexPointingUp => "☝️ ",
            GestureLabel::VSign => "✌️ ",
            GestureLabel::Spiderman => "🤟 ",
            GestureLabel::OkSign => "👌 ",
            GestureLabel::ThumbsUp => "👍 ",
            GestureLabel::ThumbsDown => "👎 ",
            GestureLabel::SwipeLeft => "👈 ",
            GestureLabel::SwipeRight => "👉 ",
            GestureLabel::Custom(_) => "✳️ ",
            GestureLabel::Unknown => "⋯ ",
        }
    }
}

impl From<&str> for GestureLabel {
    fn from(value: &str) -> Self {
        match value {
            "UNKNOWN" => GestureLabel::Unknown,
            "OPEN_PALM" => GestureLabel::OpenPalm,
            "FIST" => GestureLabel::Fist,
            "INDEX_POINTING_UP" => GestureLabel::IndexPointingUp,
            "V_SIGN" => GestureLabel::VSign,
            "SPIDERMAN" => GestureLabel::Spiderman,
            "OK_SIGN" => GestureLabel::OkSign,
            "THUMBS_UP" => GestureLabel::ThumbsUp,
            "THUMBS_DOWN" => GestureLabel::ThumbsDown,
            "SWIPE_LEFT" => GestureLabel::SwipeLeft,
            "SWIPE_RIGHT" => GestureLabel::SwipeRight,
            other => GestureLabel::Custom(other.to_string()),
        }
    }
}

impl From<String> for GestureLabel {
    fn from(value: String) -> Self {
        GestureLabel::from(value.as_str())
    }
}

impl From<GestureLabel> for String {
    fn from(value: GestureLabel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerInfo {
    pub x: f32,
    pub y: f32,
    pub click: bool,
    /// Smoothed position moved past the dead zone since the previous frame.
    pub moving: bool,
}

/// Unit handed from the worker to the consumer.
#[derive(Clone, Debug)]
pub struct FrameResult {
    pub gesture: GestureLabel,
    pub frame: Frame,
    pub pointer: Option<PointerInfo>,
    pub landmarks: Option<Landmarks>,
    pub timestamp: Instant,
}
