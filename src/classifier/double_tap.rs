//! Double-tap detection layered over the classifier output.
//!
//! A `ShortRelease` is held back for up to the double-tap window. A second
//! `ShortRelease` of the same button inside the window replaces both with one
//! `DoubleTap`; otherwise the held event is released unchanged once the window
//! expires, or earlier when anything else about that button's next press
//! makes a double tap impossible (`PressHeld`, `LongRelease`).

use crate::models::{ButtonId, GestureEvent, GestureKind};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Collapses two quick short presses into one `DoubleTap`.
#[derive(Debug, Clone)]
pub struct DoubleTapDetector {
    window: Duration,
    pending: HashMap<ButtonId, GestureEvent>,
}

impl DoubleTapDetector {
    /// Creates a detector with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Changes the window for short releases that arrive afterwards.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Passes one classifier event through the detector.
    pub fn process(&mut self, event: GestureEvent) -> Vec<GestureEvent> {
        match event.kind {
            GestureKind::ShortRelease => {
                if let Some(first) = self.pending.remove(&event.button_id) {
                    if event.at.saturating_duration_since(first.at) < self.window {
                        tracing::debug!("Double tap on {}", event.button_id);
                        return vec![GestureEvent::new(
                            event.button_id,
                            GestureKind::DoubleTap,
                            event.at,
                            event.held_duration,
                        )];
                    }
                    self.pending.insert(event.button_id.clone(), event);
                    return vec![first];
                }
                self.pending.insert(event.button_id.clone(), event);
                Vec::new()
            }
            GestureKind::PressHeld | GestureKind::LongRelease => {
                let mut events: Vec<GestureEvent> =
                    self.pending.remove(&event.button_id).into_iter().collect();
                events.push(event);
                events
            }
            GestureKind::PressStart | GestureKind::DoubleTap => vec![event],
        }
    }

    /// Releases held short presses whose window has expired by `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<GestureEvent> {
        let window = self.window;
        let expired: Vec<ButtonId> = self
            .pending
            .iter()
            .filter(|(_, event)| event.at + window <= now)
            .map(|(button, _)| button.clone())
            .collect();

        let mut events: Vec<GestureEvent> = expired
            .iter()
            .filter_map(|button| self.pending.remove(button))
            .collect();
        events.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.button_id.cmp(&b.button_id)));
        events
    }

    /// Earliest instant at which a held short press expires.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|event| event.at + self.window).min()
    }

    /// Releases every held short press immediately.
    pub fn flush(&mut self) -> Vec<GestureEvent> {
        let mut events: Vec<GestureEvent> = self.pending.drain().map(|(_, event)| event).collect();
        events.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.button_id.cmp(&b.button_id)));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    fn event(kind: GestureKind, at: Instant) -> GestureEvent {
        GestureEvent::new(
            ButtonId::default_button(),
            kind,
            at,
            Some(Duration::from_millis(80)),
        )
    }

    #[test]
    fn test_two_quick_taps_become_double_tap() {
        let mut detector = DoubleTapDetector::new(WINDOW);
        let t0 = Instant::now();
        assert!(detector.process(event(GestureKind::ShortRelease, t0)).is_empty());
        let events = detector.process(event(
            GestureKind::ShortRelease,
            t0 + Duration::from_millis(200),
        ));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GestureKind::DoubleTap);
        assert_eq!(detector.next_deadline(), None);
    }

    #[test]
    fn test_single_tap_is_released_after_window() {
        let mut detector = DoubleTapDetector::new(WINDOW);
        let t0 = Instant::now();
        detector.process(event(GestureKind::ShortRelease, t0));
        assert_eq!(detector.next_deadline(), Some(t0 + WINDOW));
        assert!(detector.poll(t0 + Duration::from_millis(299)).is_empty());

        let events = detector.poll(t0 + WINDOW);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GestureKind::ShortRelease);
    }

    #[test]
    fn test_slow_second_tap_releases_first() {
        let mut detector = DoubleTapDetector::new(WINDOW);
        let t0 = Instant::now();
        detector.process(event(GestureKind::ShortRelease, t0));
        let events = detector.process(event(
            GestureKind::ShortRelease,
            t0 + Duration::from_millis(500),
        ));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].at, t0);
        // The second tap now waits for a partner of its own
        assert_eq!(detector.flush().len(), 1);
    }

    #[test]
    fn test_long_press_releases_pending_tap_first() {
        let mut detector = DoubleTapDetector::new(WINDOW);
        let t0 = Instant::now();
        detector.process(event(GestureKind::ShortRelease, t0));
        let events = detector.process(event(
            GestureKind::PressHeld,
            t0 + Duration::from_millis(100),
        ));
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![GestureKind::ShortRelease, GestureKind::PressHeld]);
    }

    #[test]
    fn test_press_start_passes_through() {
        let mut detector = DoubleTapDetector::new(WINDOW);
        let events = detector.process(event(GestureKind::PressStart, Instant::now()));
        assert_eq!(events.len(), 1);
    }
}
