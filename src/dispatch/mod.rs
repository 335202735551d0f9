//! Consumer side: gesture labels to key chords, pointer records to mouse events.

pub mod pointer;
pub mod profiles;

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::{
    config::Config,
    pipeline::ResultReceiver,
    types::{FrameResult, GestureLabel},
};

pub use pointer::{PointerEvent, PointerMapper, PointerTracker};
pub use profiles::{
    AppRule, DEFAULT_PROFILE, ProfileSelector, ProfileTable, WindowInfo, default_app_rules,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub gesture: GestureLabel,
    pub profile: String,
    pub keys: Vec<String>,
}

/// Edge-triggered, cooldown-gated mapping from labels to actions.
///
/// A label fires once on entry and stays locked while it repeats; only an
/// `UNKNOWN` frame re-arms it. One cooldown covers every label.
pub struct GestureDispatcher {
    profiles: ProfileTable,
    cooldown: Duration,
    last_label: Option<GestureLabel>,
    last_fired: Option<Instant>,
}

impl GestureDispatcher {
    pub fn new(profiles: ProfileTable, cooldown: Duration) -> Self {
        Self {
            profiles,
            cooldown,
            last_label: None,
            last_fired: None,
        }
    }

    pub fn dispatch(&mut self, label: &GestureLabel, profile: &str, now: Instant) -> Option<Action> {
        if label.is_unknown() {
            self.last_label = None;
            return None;
        }
        let keys = self.profiles.keys_for(profile, label)?;
        if self.last_label.as_ref() == Some(label) {
            return None;
        }
        let cooled = self
            .last_fired
            .is_none_or(|last| now.saturating_duration_since(last) > self.cooldown);
        if !cooled {
            return None;
        }

        let action = Action {
            gesture: label.clone(),
            profile: profile.to_string(),
            keys: keys.to_vec(),
        };
        self.last_label = Some(label.clone());
        self.last_fired = Some(now);
        Some(action)
    }

    pub fn last_label(&self) -> Option<&GestureLabel> {
        self.last_label.as_ref()
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }
}

/// Key and mouse injection, supplied by the host.
pub trait ActionExecutor {
    fn execute(&mut self, action: &Action) -> Result<()>;

    fn pointer(&mut self, event: PointerEvent) -> Result<()>;
}

/// Logs every action and keeps them for inspection.
#[derive(Debug, Default)]
pub struct LogExecutor {
    actions: Vec<Action>,
    pointer_events: Vec<PointerEvent>,
}

impl LogExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn pointer_events(&self) -> &[PointerEvent] {
        &self.pointer_events
    }
}

impl ActionExecutor for LogExecutor {
    fn execute(&mut self, action: &Action) -> Result<()> {
        log::info!(
            "[{}] {} -> {}",
            action.profile,
            action.gesture,
            action.keys.join("+")
        );
        self.actions.push(action.clone());
        Ok(())
    }

    fn pointer(&mut self, event: PointerEvent) -> Result<()> {
        log::trace!("pointer {event:?}");
        self.pointer_events.push(event);
        Ok(())
    }
}

/// Consumer-thread state: active profile, dispatcher, click edges, executor.
pub struct Controller<E> {
    dispatcher: GestureDispatcher,
    selector: ProfileSelector,
    profile: String,
    pointer: Option<(PointerTracker, PointerMapper)>,
    executor: E,
}

impl<E: ActionExecutor> Controller<E> {
    /// `screen` is the pixel size pointer coordinates are mapped onto.
    pub fn new(config: &Config, executor: E, screen: (u32, u32)) -> Self {
        let pointer = config.pointer.enabled.then(|| {
            (
                PointerTracker::new(),
                PointerMapper::new(config.pointer.screen_margin, screen),
            )
        });
        Self {
            dispatcher: GestureDispatcher::new(config.profiles.clone(), config.dispatch.cooldown()),
            selector: ProfileSelector::new(config.app_rules.clone()),
            profile: DEFAULT_PROFILE.to_string(),
            pointer,
            executor,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn set_profile(&mut self, name: &str) {
        if name != self.profile {
            log::info!("switched to profile {name}");
            self.profile = name.to_string();
        }
    }

    /// Re-selects the profile from the current foreground window.
    pub fn observe_window(&mut self, window: &WindowInfo) {
        let name = self.selector.select(window).to_string();
        self.set_profile(&name);
    }

    /// Applies one result; returns the action that fired, if any.
    pub fn handle(&mut self, result: &FrameResult) -> Option<Action> {
        if let Some((tracker, mapper)) = self.pointer.as_mut() {
            for event in tracker.update(result.pointer.as_ref(), mapper) {
                if let Err(err) = self.executor.pointer(event) {
                    log::warn!("pointer event {event:?} failed: {err:#}");
                }
            }
        }

        let action = self
            .dispatcher
            .dispatch(&result.gesture, &self.profile, result.timestamp)?;
        if let Err(err) = self.executor.execute(&action) {
            log::warn!("failed to execute {}: {err:#}", action.gesture);
        }
        Some(action)
    }

    /// Non-blocking: takes the newest pending result, if any, and applies it.
    pub fn poll(&mut self, results: &ResultReceiver) -> Option<FrameResult> {
        let result = results.latest()?;
        self.handle(&result);
        Some(result)
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_millis(300);

    fn dispatcher() -> GestureDispatcher {
        GestureDispatcher::new(ProfileTable::builtin(), COOLDOWN)
    }

    #[test]
    fn repeated_label_fires_once() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        let fired: Vec<_> = (0..10)
            .filter_map(|i| {
                d.dispatch(
                    &GestureLabel::SwipeRight,
                    DEFAULT_PROFILE,
                    t0 + Duration::from_millis(100 * i),
                )
            })
            .collect();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].keys, vec!["right".to_string()]);
    }

    #[test]
    fn no_two_fires_within_the_cooldown() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        let sequence = [
            GestureLabel::SwipeRight,
            GestureLabel::SwipeLeft,
            GestureLabel::Unknown,
            GestureLabel::SwipeRight,
            GestureLabel::SwipeLeft,
            GestureLabel::SwipeRight,
            GestureLabel::Unknown,
            GestureLabel::SwipeLeft,
        ];
        let mut fire_times = Vec::new();
        for step in 0..200u64 {
            let now = t0 + Duration::from_millis(37 * step);
            let label = &sequence[(step as usize * 7) % sequence.len()];
            if d.dispatch(label, DEFAULT_PROFILE, now).is_some() {
                fire_times.push(now);
            }
        }
        assert!(fire_times.len() > 1);
        for pair in fire_times.windows(2) {
            assert!(pair[1] - pair[0] > COOLDOWN);
        }
    }

    #[test]
    fn cooldown_is_strictly_exceeded() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        assert!(d.dispatch(&GestureLabel::SwipeRight, DEFAULT_PROFILE, t0).is_some());
        assert!(d.dispatch(&GestureLabel::SwipeLeft, DEFAULT_PROFILE, t0 + COOLDOWN).is_none());
        assert!(
            d.dispatch(
                &GestureLabel::SwipeLeft,
                DEFAULT_PROFILE,
                t0 + COOLDOWN + Duration::from_millis(1)
            )
            .is_some()
        );
    }

    #[test]
    fn unknown_rearms_the_same_label() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        let second = t0 + Duration::from_secs(1);
        assert!(d.dispatch(&GestureLabel::SwipeLeft, DEFAULT_PROFILE, t0).is_some());
        assert!(d.dispatch(&GestureLabel::SwipeLeft, DEFAULT_PROFILE, second).is_none());

        assert!(d.dispatch(&GestureLabel::Unknown, DEFAULT_PROFILE, second).is_none());
        assert_eq!(d.last_label(), None);
        let third = second + Duration::from_millis(10);
        assert!(d.dispatch(&GestureLabel::SwipeLeft, DEFAULT_PROFILE, third).is_some());
    }

    #[test]
    fn rearmed_label_still_waits_for_cooldown() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        let at = |ms| t0 + Duration::from_millis(ms);
        let steps = [
            (0, GestureLabel::SwipeRight),
            (50, GestureLabel::Unknown),
            (100, GestureLabel::SwipeRight),
            (150, GestureLabel::Unknown),
            (400, GestureLabel::SwipeRight),
        ];
        let fired: Vec<_> = steps
            .iter()
            .map(|(ms, label)| d.dispatch(label, DEFAULT_PROFILE, at(*ms)).is_some())
            .collect();
        assert_eq!(fired, vec![true, false, false, false, true]);
    }

    #[test]
    fn unmapped_label_neither_fires_nor_unlocks() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        assert!(d.dispatch(&GestureLabel::SwipeLeft, DEFAULT_PROFILE, t0).is_some());
        let later = t0 + Duration::from_secs(1);
        assert!(d.dispatch(&GestureLabel::Fist, DEFAULT_PROFILE, later).is_none());
        assert_eq!(d.last_label(), Some(&GestureLabel::SwipeLeft));
        assert!(d.dispatch(&GestureLabel::SwipeLeft, DEFAULT_PROFILE, later).is_none());
    }

    #[test]
    fn profile_scopes_the_chord() {
        let mut d = dispatcher();
        let action = d
            .dispatch(&GestureLabel::ThumbsUp, "CHROME", Instant::now())
            .unwrap();
        assert_eq!(action.keys, vec!["ctrl".to_string(), "tab".to_string()]);
        assert_eq!(action.profile, "CHROME");

        let mut d = dispatcher();
        assert!(d.dispatch(&GestureLabel::ThumbsUp, "MISSING", Instant::now()).is_none());
    }

    #[test]
    fn controller_tracks_window_profile_and_clicks() {
        let mut config = Config::with_default_rules();
        config.pointer.enabled = true;
        let mut controller = Controller::new(&config, LogExecutor::new(), (1920, 1080));
        controller.observe_window(&WindowInfo::titled("Docs - Google Chrome"));
        assert_eq!(controller.profile(), "CHROME");

        let t0 = Instant::now();
        let frame = crate::types::Frame::filled(2, 2, [0; 4], 0, t0);
        let result = FrameResult {
            gesture: GestureLabel::OpenPalm,
            frame,
            pointer: Some(crate::types::PointerInfo {
                x: 0.5,
                y: 0.5,
                click: true,
                moving: false,
            }),
            landmarks: None,
            timestamp: t0,
        };
        let action = controller.handle(&result).unwrap();
        assert_eq!(action.keys, vec!["f5".to_string()]);

        let executor = controller.into_executor();
        assert_eq!(executor.actions().len(), 1);
        assert_eq!(
            executor.pointer_events(),
            &[PointerEvent::Move { x: 960, y: 540 }, PointerEvent::Press]
        );
    }
}
