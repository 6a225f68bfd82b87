//! Gesture classification.
//!
//! [`GestureClassifier`] owns one timing state per pressed button and turns
//! canonical edges into press-start, press-held, short-release and
//! long-release events. [`DoubleTapDetector`] optionally sits on top of it.
//! [`GesturePipeline`] combines the two behind the interface the session
//! loop drives: feed edges, poll on timeouts, sleep until the next deadline.

pub mod double_tap;
pub mod timing;

pub use double_tap::DoubleTapDetector;
pub use timing::{ButtonTimingState, GestureClassifier};

use crate::models::{CanonicalEdge, GestureEvent, Settings};
use std::time::Instant;

/// Classifier plus optional double-tap detection.
#[derive(Debug, Clone)]
pub struct GesturePipeline {
    classifier: GestureClassifier,
    double_tap: Option<DoubleTapDetector>,
}

impl GesturePipeline {
    /// Builds a pipeline from engine settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let classifier = GestureClassifier::new(settings.long_press(), settings.press_start_policy);
        let double_tap = settings
            .double_tap_enabled
            .then(|| DoubleTapDetector::new(settings.double_tap()));
        Self {
            classifier,
            double_tap,
        }
    }

    /// Applies changed settings without losing live presses.
    ///
    /// Disabling double-tap detection releases any held short press.
    pub fn apply_settings(&mut self, settings: &Settings) -> Vec<GestureEvent> {
        self.classifier.set_threshold(settings.long_press());
        self.classifier.set_policy(settings.press_start_policy);

        match (&mut self.double_tap, settings.double_tap_enabled) {
            (Some(detector), true) => {
                detector.set_window(settings.double_tap());
                Vec::new()
            }
            (None, true) => {
                self.double_tap = Some(DoubleTapDetector::new(settings.double_tap()));
                Vec::new()
            }
            (Some(detector), false) => {
                let flushed = detector.flush();
                self.double_tap = None;
                flushed
            }
            (None, false) => Vec::new(),
        }
    }

    /// Read access to the timing state machine.
    #[must_use]
    pub const fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    /// Feeds one edge.
    pub fn handle_edge(&mut self, edge: &CanonicalEdge) -> Vec<GestureEvent> {
        let events = self.classifier.handle_edge(edge);
        self.decorate(events)
    }

    /// Emits everything that has become due by `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<GestureEvent> {
        let held = self.classifier.poll(now);
        let mut events = self.decorate(held);
        if let Some(detector) = &mut self.double_tap {
            events.extend(detector.poll(now));
        }
        events
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let tap = self
            .double_tap
            .as_ref()
            .and_then(DoubleTapDetector::next_deadline);
        match (self.classifier.next_deadline(), tap) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Releases held short presses and forgets every live press.
    pub fn finish(&mut self) -> Vec<GestureEvent> {
        self.classifier.reset();
        self.double_tap
            .as_mut()
            .map(DoubleTapDetector::flush)
            .unwrap_or_default()
    }

    fn decorate(&mut self, events: Vec<GestureEvent>) -> Vec<GestureEvent> {
        match &mut self.double_tap {
            Some(detector) => events
                .into_iter()
                .flat_map(|event| detector.process(event))
                .collect(),
            None => events,
        }
    }
}
