//! Mouse-style output from the per-frame pointer record.

use crate::types::PointerInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEvent {
    Move { x: i32, y: i32 },
    Press,
    Release,
}

/// Camera-space to screen-space mapping with an inward margin.
#[derive(Clone, Copy, Debug)]
pub struct PointerMapper {
    margin: f32,
    screen: (u32, u32),
}

impl PointerMapper {
    pub fn new(margin: f32, screen: (u32, u32)) -> Self {
        Self {
            margin: margin.clamp(0.0, 0.49),
            screen,
        }
    }

    /// `[margin, 1 - margin]` stretches over the whole screen; outside it clamps.
    pub fn map(&self, x: f32, y: f32) -> (i32, i32) {
        let span = 1.0 - 2.0 * self.margin;
        let remap = |v: f32| ((v - self.margin) / span).clamp(0.0, 1.0);
        (
            (remap(x) * self.screen.0 as f32).round() as i32,
            (remap(y) * self.screen.1 as f32).round() as i32,
        )
    }
}

/// Turns the pinch flag into press/release edges.
#[derive(Debug, Default)]
pub struct PointerTracker {
    pressed: bool,
    tracking: bool,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Events for one frame. A lost hand releases a held button.
    pub fn update(&mut self, pointer: Option<&PointerInfo>, mapper: &PointerMapper) -> Vec<PointerEvent> {
        let mut events = Vec::new();
        let Some(pointer) = pointer else {
            if self.pressed {
                self.pressed = false;
                events.push(PointerEvent::Release);
            }
            self.tracking = false;
            return events;
        };

        if pointer.moving || !self.tracking {
            let (x, y) = mapper.map(pointer.x, pointer.y);
            events.push(PointerEvent::Move { x, y });
        }
        self.tracking = true;

        match (pointer.click, self.pressed) {
            (true, false) => events.push(PointerEvent::Press),
            (false, true) => events.push(PointerEvent::Release),
            _ => {}
        }
        self.pressed = pointer.click;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(x: f32, y: f32, click: bool, moving: bool) -> PointerInfo {
        PointerInfo { x, y, click, moving }
    }

    #[test]
    fn margin_is_stretched_and_clamped() {
        let mapper = PointerMapper::new(0.2, (1000, 500));
        assert_eq!(mapper.map(0.5, 0.5), (500, 250));
        assert_eq!(mapper.map(0.2, 0.8), (0, 500));
        assert_eq!(mapper.map(0.05, 0.95), (0, 500));
    }

    #[test]
    fn click_produces_single_press_and_release() {
        let mapper = PointerMapper::new(0.2, (100, 100));
        let mut tracker = PointerTracker::new();

        let events = tracker.update(Some(&info(0.5, 0.5, true, false)), &mapper);
        assert_eq!(
            events,
            vec![PointerEvent::Move { x: 50, y: 50 }, PointerEvent::Press]
        );
        assert!(tracker.update(Some(&info(0.5, 0.5, true, false)), &mapper).is_empty());

        let events = tracker.update(Some(&info(0.6, 0.5, false, true)), &mapper);
        assert_eq!(events.last(), Some(&PointerEvent::Release));
        assert!(!tracker.is_pressed());
    }

    #[test]
    fn losing_the_hand_releases_the_button() {
        let mapper = PointerMapper::new(0.0, (10, 10));
        let mut tracker = PointerTracker::new();
        tracker.update(Some(&info(0.1, 0.1, true, false)), &mapper);
        assert_eq!(tracker.update(None, &mapper), vec![PointerEvent::Release]);
        assert!(tracker.update(None, &mapper).is_empty());
    }
}
