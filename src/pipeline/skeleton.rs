//! Overlay drawing straight into RGBA frames.

use crate::{
    config::RoiConfig,
    types::{Frame, GestureLabel, Landmarks, Point},
};

pub const CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

const LINE_COLOR: [u8; 4] = [56, 189, 248, 255];
const POINT_COLOR: [u8; 4] = [248, 113, 113, 255];
const ROI_INSIDE: [u8; 4] = [0, 255, 0, 255];
const ROI_OUTSIDE: [u8; 4] = [255, 255, 0, 255];
const SWIPE_BADGE: [u8; 4] = [168, 85, 247, 255];
const SIGN_BADGE: [u8; 4] = [16, 185, 129, 255];

/// Line thickness proportional to frame width, 4 px at 1280.
fn thickness_for(width: u32) -> i32 {
    (width as i32 / 320).max(1)
}

struct Canvas<'a> {
    buffer: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    fn new(frame: &'a mut Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            buffer: &mut frame.rgba,
        }
    }

    fn to_pixels(&self, (x, y): Point) -> (i32, i32) {
        (
            (x * self.width as f32) as i32,
            (y * self.height as f32) as i32,
        )
    }

    fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 {
            return;
        }
        let (ux, uy) = (x as u32, y as u32);
        if ux >= self.width || uy >= self.height {
            return;
        }
        let idx = ((uy * self.width + ux) as usize) * 4;
        if idx + 3 < self.buffer.len() {
            self.buffer[idx..idx + 4].copy_from_slice(&color);
        }
    }

    fn line(&mut self, p0: (i32, i32), p1: (i32, i32), color: [u8; 4], thickness: i32) {
        let (mut x0, mut y0) = p0;
        let (x1, y1) = p1;
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (thickness.max(1) - 1) / 2;

        loop {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox.abs() + oy.abs() <= radius {
                        self.put_pixel(x0 + ox, y0 + oy, color);
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn circle(&mut self, (cx, cy): (i32, i32), radius: i32, color: [u8; 4]) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn rect(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: [u8; 4], thickness: i32) {
        let (x1, y1) = top_left;
        let (x2, y2) = bottom_right;
        self.line((x1, y1), (x2, y1), color, thickness);
        self.line((x2, y1), (x2, y2), color, thickness);
        self.line((x2, y2), (x1, y2), color, thickness);
        self.line((x1, y2), (x1, y1), color, thickness);
    }

    fn fill(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: [u8; 4]) {
        for y in top_left.1..bottom_right.1 {
            for x in top_left.0..bottom_right.0 {
                self.put_pixel(x, y, color);
            }
        }
    }
}

pub fn draw_skeleton(frame: &mut Frame, landmarks: &Landmarks) {
    let thickness = thickness_for(frame.width);
    let mut canvas = Canvas::new(frame);
    let points = landmarks.points();

    for &(a, b) in CONNECTIONS {
        let (pa, pb) = (canvas.to_pixels(points[a]), canvas.to_pixels(points[b]));
        canvas.line(pa, pb, LINE_COLOR, thickness);
    }
    let radius = thickness + 2;
    for &point in points {
        let center = canvas.to_pixels(point);
        canvas.circle(center, radius, POINT_COLOR);
    }
}

/// Sign zone outline: green with the hand inside, yellow otherwise.
pub fn draw_roi(frame: &mut Frame, roi: &RoiConfig, hand_inside: bool) {
    if !roi.enabled {
        return;
    }
    let thickness = thickness_for(frame.width);
    let mut canvas = Canvas::new(frame);
    let color = if hand_inside { ROI_INSIDE } else { ROI_OUTSIDE };
    let top_left = canvas.to_pixels((roi.x_min, roi.y_min));
    let bottom_right = canvas.to_pixels((roi.x_max, roi.y_max));
    // Keep the far edges on-canvas when the zone touches the border.
    let bottom_right = (
        bottom_right.0.min(canvas.width as i32 - 1),
        bottom_right.1.min(canvas.height as i32 - 1),
    );
    canvas.rect(top_left, bottom_right, color, thickness);
}

/// Corner badge for the emitted label; no badge for `UNKNOWN`.
pub fn draw_label(frame: &mut Frame, label: &GestureLabel) {
    if label.is_unknown() {
        return;
    }
    let side = (thickness_for(frame.width) * 6).min(frame.height as i32);
    let color = if label.is_swipe() { SWIPE_BADGE } else { SIGN_BADGE };
    let mut canvas = Canvas::new(frame);
    let margin = side / 2;
    canvas.fill((margin, margin), (margin + side, margin + side), color);
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * frame.width + x) * 4) as usize;
        frame.rgba[idx..idx + 4].try_into().unwrap()
    }

    #[test]
    fn roi_colour_tracks_hand_position() {
        let roi = RoiConfig::rect(0.25, 0.25, 0.75, 0.75);
        let mut frame = Frame::filled(100, 100, [0; 4], 0, Instant::now());
        draw_roi(&mut frame, &roi, true);
        assert_eq!(pixel(&frame, 50, 25), ROI_INSIDE);
        assert_eq!(pixel(&frame, 50, 50), [0; 4]);

        draw_roi(&mut frame, &roi, false);
        assert_eq!(pixel(&frame, 25, 50), ROI_OUTSIDE);

        let mut blank = Frame::filled(10, 10, [0; 4], 0, Instant::now());
        draw_roi(&mut blank, &RoiConfig::disabled(), true);
        assert!(blank.rgba.iter().all(|&b| b == 0));
    }

    #[test]
    fn skeleton_stays_inside_buffer() {
        let mut frame = Frame::filled(32, 24, [0; 4], 0, Instant::now());
        let landmarks = Landmarks([(1.2, -0.3); 21]);
        draw_skeleton(&mut frame, &landmarks);
        assert_eq!(frame.rgba.len(), 32 * 24 * 4);

        let centered = Landmarks([(0.5, 0.5); 21]);
        draw_skeleton(&mut frame, &centered);
        assert_eq!(pixel(&frame, 16, 12), POINT_COLOR);
    }

    #[test]
    fn badge_only_for_known_labels() {
        let mut frame = Frame::filled(640, 480, [0; 4], 0, Instant::now());
        draw_label(&mut frame, &GestureLabel::Unknown);
        assert!(frame.rgba.iter().all(|&b| b == 0));
        draw_label(&mut frame, &GestureLabel::SwipeLeft);
        assert_eq!(pixel(&frame, 8, 8), SWIPE_BADGE);
    }
}
