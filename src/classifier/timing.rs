//! Per-button timing state machine.
//!
//! Each button is either idle (no state) or pressing (one
//! [`ButtonTimingState`]). Edges move a button between the two; the threshold
//! crossing while pressing is detected by [`GestureClassifier::poll`], which
//! the event loop calls whenever input is quiet or a deadline has passed.

use crate::models::{ButtonId, CanonicalEdge, Edge, GestureEvent, GestureKind, PressStartPolicy};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Timing state of a button that is currently down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonTimingState {
    /// Button this state belongs to
    pub button_id: ButtonId,
    /// When the press began
    pub press_started_at: Instant,
    /// Whether `PressHeld` has been emitted for this press
    pub threshold_crossed: bool,
    /// Whether `PressStart` has been emitted for this press
    pub start_emitted: bool,
}

impl ButtonTimingState {
    fn deadline(&self, threshold: Duration) -> Instant {
        self.press_started_at + threshold
    }
}

/// Turns canonical edges into gesture events.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    threshold: Duration,
    policy: PressStartPolicy,
    states: HashMap<ButtonId, ButtonTimingState>,
    anomalies: u64,
}

impl GestureClassifier {
    /// Creates a classifier with a long-press threshold.
    #[must_use]
    pub fn new(threshold: Duration, policy: PressStartPolicy) -> Self {
        Self {
            threshold,
            policy,
            states: HashMap::new(),
            anomalies: 0,
        }
    }

    /// Long-press threshold.
    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Changes the threshold; presses already past it are unaffected.
    pub fn set_threshold(&mut self, threshold: Duration) {
        self.threshold = threshold;
    }

    /// Changes when `PressStart` is emitted for presses that begin afterwards.
    pub fn set_policy(&mut self, policy: PressStartPolicy) {
        self.policy = policy;
    }

    /// Number of duplicate presses and stray releases seen so far.
    #[must_use]
    pub const fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// Buttons currently held down.
    pub fn live_presses(&self) -> impl Iterator<Item = &ButtonTimingState> {
        self.states.values()
    }

    /// Applies one edge.
    pub fn handle_edge(&mut self, edge: &CanonicalEdge) -> Vec<GestureEvent> {
        match edge.edge {
            Edge::Pressed => self.on_pressed(edge),
            Edge::Released => self.on_released(edge),
        }
    }

    fn on_pressed(&mut self, edge: &CanonicalEdge) -> Vec<GestureEvent> {
        if let Some(state) = self.states.get(&edge.button_id) {
            self.anomalies += 1;
            tracing::warn!(
                "Duplicate press for {} ignored (pressed {}ms ago, detail: {})",
                edge.button_id,
                edge.at
                    .saturating_duration_since(state.press_started_at)
                    .as_millis(),
                edge.source_detail
            );
            return Vec::new();
        }

        self.states.insert(
            edge.button_id.clone(),
            ButtonTimingState {
                button_id: edge.button_id.clone(),
                press_started_at: edge.at,
                threshold_crossed: false,
                start_emitted: self.policy == PressStartPolicy::Immediate,
            },
        );

        match self.policy {
            PressStartPolicy::Immediate => vec![GestureEvent::new(
                edge.button_id.clone(),
                GestureKind::PressStart,
                edge.at,
                None,
            )],
            PressStartPolicy::Deferred => Vec::new(),
        }
    }

    fn on_released(&mut self, edge: &CanonicalEdge) -> Vec<GestureEvent> {
        let Some(mut state) = self.states.remove(&edge.button_id) else {
            self.anomalies += 1;
            tracing::debug!(
                "Release without press for {} ignored (detail: {})",
                edge.button_id,
                edge.source_detail
            );
            return Vec::new();
        };

        let held = edge.at.saturating_duration_since(state.press_started_at);
        let mut events = Vec::new();

        // The poll has not run since the threshold passed
        if !state.threshold_crossed && held >= self.threshold {
            let crossed_at = state.deadline(self.threshold);
            events.extend(crossing_events(&mut state, crossed_at, self.threshold));
        }

        let kind = if state.threshold_crossed {
            GestureKind::LongRelease
        } else {
            GestureKind::ShortRelease
        };
        events.push(GestureEvent::new(
            edge.button_id.clone(),
            kind,
            edge.at,
            Some(held),
        ));
        events
    }

    /// Emits `PressHeld` for every press that has reached the threshold by `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<GestureEvent> {
        let threshold = self.threshold;

        let mut due: Vec<&mut ButtonTimingState> = self
            .states
            .values_mut()
            .filter(|state| !state.threshold_crossed && state.deadline(threshold) <= now)
            .collect();
        due.sort_by(|a, b| {
            a.press_started_at
                .cmp(&b.press_started_at)
                .then_with(|| a.button_id.cmp(&b.button_id))
        });

        let mut events = Vec::new();
        for state in due {
            let held = now.saturating_duration_since(state.press_started_at);
            events.extend(crossing_events(state, now, held));
        }
        events
    }

    /// Earliest instant at which [`poll`](Self::poll) will have something to emit.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.states
            .values()
            .filter(|state| !state.threshold_crossed)
            .map(|state| state.deadline(self.threshold))
            .min()
    }

    /// Drops every live press without emitting anything.
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

/// Marks the threshold crossed; a deferred `PressStart` goes out first.
fn crossing_events(state: &mut ButtonTimingState, at: Instant, held: Duration) -> Vec<GestureEvent> {
    state.threshold_crossed = true;
    let mut events = Vec::with_capacity(2);
    if !state.start_emitted {
        state.start_emitted = true;
        events.push(GestureEvent::new(
            state.button_id.clone(),
            GestureKind::PressStart,
            at,
            None,
        ));
    }
    events.push(GestureEvent::new(
        state.button_id.clone(),
        GestureKind::PressHeld,
        at,
        Some(held),
    ));
    events
}
