//! Static hand-shape rules.
//!
//! Finger extension is judged by distance to the wrist, which holds under
//! in-plane rotation. The rules are tried in table order; the first match
//! names the shape.

use crate::types::{
    GestureLabel, INDEX_PIP, INDEX_TIP, Landmarks, MIDDLE_PIP, MIDDLE_TIP, PINKY_MCP, PINKY_PIP,
    PINKY_TIP, RING_PIP, RING_TIP, THUMB_IP, THUMB_TIP, WRIST, distance,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FingerFlags {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerFlags {
    pub fn from_landmarks(points: &Landmarks) -> Self {
        // Thumb folds across the palm rather than towards the wrist, so it is
        // measured against the pinky knuckle.
        let pinky_mcp = points.point(PINKY_MCP);
        let thumb = distance(points.point(THUMB_TIP), pinky_mcp)
            > distance(points.point(THUMB_IP), pinky_mcp);

        Self {
            thumb,
            index: finger_extended(points, INDEX_TIP, INDEX_PIP),
            middle: finger_extended(points, MIDDLE_TIP, MIDDLE_PIP),
            ring: finger_extended(points, RING_TIP, RING_PIP),
            pinky: finger_extended(points, PINKY_TIP, PINKY_PIP),
        }
    }

    /// Flags in thumb, index, middle, ring, pinky order.
    pub fn as_array(&self) -> [bool; 5] {
        [self.thumb, self.index, self.middle, self.ring, self.pinky]
    }

    fn exactly(&self, pattern: [bool; 5]) -> bool {
        self.as_array() == pattern
    }
}

fn finger_extended(points: &Landmarks, tip: usize, pip: usize) -> bool {
    let wrist = points.point(WRIST);
    distance(points.point(tip), wrist) > distance(points.point(pip), wrist)
}

/// Screen-space check: tip above its PIP joint.
fn tip_above_pip(points: &Landmarks, tip: usize, pip: usize) -> bool {
    points.point(tip).1 < points.point(pip).1
}

pub struct ShapeContext<'a> {
    pub points: &'a Landmarks,
    pub flags: FingerFlags,
    pub pinch_threshold: f32,
}

pub struct ShapeRule {
    pub label: GestureLabel,
    pub matches: fn(&ShapeContext<'_>) -> bool,
}

pub const SHAPE_RULES: &[ShapeRule] = &[
    ShapeRule {
        label: GestureLabel::OpenPalm,
        matches: |ctx| ctx.flags.exactly([true; 5]),
    },
    ShapeRule {
        label: GestureLabel::Fist,
        matches: |ctx| ctx.flags.exactly([false; 5]),
    },
    ShapeRule {
        label: GestureLabel::IndexPointingUp,
        matches: |ctx| ctx.flags.exactly([false, true, false, false, false]),
    },
    ShapeRule {
        label: GestureLabel::VSign,
        matches: |ctx| ctx.flags.exactly([false, true, true, false, false]),
    },
    ShapeRule {
        label: GestureLabel::Spiderman,
        matches: |ctx| ctx.flags.exactly([true, true, false, false, true]),
    },
    ShapeRule {
        label: GestureLabel::OkSign,
        matches: is_ok_sign,
    },
    ShapeRule {
        label: GestureLabel::ThumbsUp,
        matches: |ctx| thumb_only(ctx) && thumb_points_up(ctx.points),
    },
    ShapeRule {
        label: GestureLabel::ThumbsDown,
        matches: |ctx| thumb_only(ctx) && !thumb_points_up(ctx.points),
    },
];

// Pinch is rotation invariant but the other three fingers use screen
// vertical, so this shape only fires with the hand roughly upright.
fn is_ok_sign(ctx: &ShapeContext<'_>) -> bool {
    let points = ctx.points;
    distance(points.point(INDEX_TIP), points.point(THUMB_TIP)) < ctx.pinch_threshold
        && tip_above_pip(points, MIDDLE_TIP, MIDDLE_PIP)
        && tip_above_pip(points, RING_TIP, RING_PIP)
        && tip_above_pip(points, PINKY_TIP, PINKY_PIP)
}

fn thumb_only(ctx: &ShapeContext<'_>) -> bool {
    ctx.flags.exactly([true, false, false, false, false])
}

fn thumb_points_up(points: &Landmarks) -> bool {
    points.point(THUMB_TIP).1 < points.point(THUMB_IP).1
}

/// First matching rule, or `None` when the shape is not in the table.
pub fn match_shape(points: &Landmarks, pinch_threshold: f32) -> Option<GestureLabel> {
    let ctx = ShapeContext {
        points,
        flags: FingerFlags::from_landmarks(points),
        pinch_threshold,
    };
    SHAPE_RULES
        .iter()
        .find(|rule| (rule.matches)(&ctx))
        .map(|rule| rule.label.clone())
}
