//! Diagnostic text line parsing.
//!
//! Recognised line shapes:
//! - `... buttonState changed (OLD->NEW) ...` with an optional `handle=N`
//!   (button `handle-N`; without a handle the default button is used)
//! - `KEY DOWN: <code>` / `KEY UP: <code>` (button `key-<code>`)
//! - `SYSTEM KEY: <code> (DOWN|UP)` (button `syskey-<code>`)
//! - `Received input report indication ... handle=N length=M` (note only)
//!
//! Every other line yields nothing.

use crate::adapters::AdaptOutcome;
use crate::models::{ButtonId, CanonicalEdge, Edge};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Instant;

struct LinePatterns {
    state_change: Regex,
    handle: Regex,
    length: Regex,
    key_event: Regex,
    system_key: Regex,
    report_indication: Regex,
}

fn patterns() -> &'static LinePatterns {
    static PATTERNS: OnceLock<LinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| LinePatterns {
        state_change: Regex::new(r"(?i)state\s*changed\s*\(\s*(\d+)\s*->\s*(\d+)\s*\)").unwrap(),
        handle: Regex::new(r"(?i)\bhandle\s*=\s*(\d+)").unwrap(),
        length: Regex::new(r"(?i)\blength\s*=\s*(\d+)").unwrap(),
        key_event: Regex::new(r"\bKEY (DOWN|UP):\s*(\d+)").unwrap(),
        system_key: Regex::new(r"\bSYSTEM KEY:\s*(\d+)\s*\((DOWN|UP)\)").unwrap(),
        report_indication: Regex::new(r"(?i)received input report indication").unwrap(),
    })
}

/// Extracts press/release edges from diagnostic text lines.
#[derive(Debug, Clone)]
pub struct TextEventAdapter {
    /// Button used when a line carries no identity
    default_button: ButtonId,
    /// Last edge emitted per button
    last_edges: HashMap<ButtonId, Edge>,
}

impl Default for TextEventAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEventAdapter {
    /// Creates an adapter that attributes anonymous lines to the default button.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_button(ButtonId::default_button())
    }

    /// Creates an adapter that attributes anonymous lines to `button`.
    #[must_use]
    pub fn with_default_button(button: ButtonId) -> Self {
        Self {
            default_button: button,
            last_edges: HashMap::new(),
        }
    }

    /// Parses one line.
    pub fn adapt(&mut self, line: &str, at: Instant) -> AdaptOutcome {
        let line = line.trim();
        if line.is_empty() {
            return AdaptOutcome::none();
        }

        match self.parse_line(line) {
            LineMatch::Edge(button, edge) => self.emit(button, edge, line, at),
            LineMatch::Note(note) => AdaptOutcome::noted(note),
            LineMatch::Unrecognized => AdaptOutcome::none(),
        }
    }

    /// Forgets the last edge of every button.
    pub fn reset(&mut self) {
        self.last_edges.clear();
    }

    fn parse_line(&self, line: &str) -> LineMatch {
        let patterns = patterns();

        if let Some(caps) = patterns.state_change.captures(line) {
            let (Ok(old), Ok(new)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) else {
                return LineMatch::Note(format!("unparseable state values in '{line}'"));
            };
            let button = patterns
                .handle
                .captures(line)
                .map_or_else(|| self.default_button.clone(), |h| ButtonId::new(format!("handle-{}", &h[1])));
            return match new.cmp(&old) {
                std::cmp::Ordering::Greater => LineMatch::Edge(button, Edge::Pressed),
                std::cmp::Ordering::Less => LineMatch::Edge(button, Edge::Released),
                std::cmp::Ordering::Equal => {
                    LineMatch::Note(format!("state unchanged ({old}->{new}) for {button}"))
                }
            };
        }

        if let Some(caps) = patterns.system_key.captures(line) {
            let button = ButtonId::new(format!("syskey-{}", &caps[1]));
            return LineMatch::Edge(button, direction(&caps[2]));
        }

        if let Some(caps) = patterns.key_event.captures(line) {
            let button = ButtonId::new(format!("key-{}", &caps[2]));
            return LineMatch::Edge(button, direction(&caps[1]));
        }

        if patterns.report_indication.is_match(line) {
            let handle = patterns.handle.captures(line).map(|c| c[1].to_string());
            let length = patterns.length.captures(line).map(|c| c[1].to_string());
            return LineMatch::Note(format!(
                "input report indication (handle={}, length={})",
                handle.as_deref().unwrap_or("?"),
                length.as_deref().unwrap_or("?")
            ));
        }

        LineMatch::Unrecognized
    }

    fn emit(&mut self, button: ButtonId, edge: Edge, line: &str, at: Instant) -> AdaptOutcome {
        if self.last_edges.get(&button) == Some(&edge) {
            return AdaptOutcome::noted(format!("repeated {edge} for {button} suppressed"));
        }
        self.last_edges.insert(button.clone(), edge);
        AdaptOutcome::from_edges(vec![CanonicalEdge::new(button, edge, at).with_detail(line)])
    }
}

enum LineMatch {
    Edge(ButtonId, Edge),
    Note(String),
    Unrecognized,
}

fn direction(word: &str) -> Edge {
    if word == "DOWN" {
        Edge::Pressed
    } else {
        Edge::Released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(adapter: &mut TextEventAdapter, line: &str) -> Vec<(String, Edge)> {
        adapter
            .adapt(line, Instant::now())
            .edges
            .into_iter()
            .map(|e| (e.button_id.to_string(), e.edge))
            .collect()
    }

    #[test]
    fn test_state_change_directions() {
        let mut adapter = TextEventAdapter::new();
        assert_eq!(
            edges(&mut adapter, "2024-01-01 12:00:00 buttonState changed (0->1)"),
            vec![("primary".to_string(), Edge::Pressed)]
        );
        assert_eq!(
            edges(&mut adapter, "buttonState changed (1->0)"),
            vec![("primary".to_string(), Edge::Released)]
        );
    }

    #[test]
    fn test_equal_state_is_note_only() {
        let mut adapter = TextEventAdapter::new();
        let outcome = adapter.adapt("state changed (2->2)", Instant::now());
        assert!(outcome.edges.is_empty());
        assert!(outcome.note.is_some());
    }

    #[test]
    fn test_repeated_edge_is_suppressed() {
        let mut adapter = TextEventAdapter::new();
        assert_eq!(edges(&mut adapter, "state changed (0->1)").len(), 1);
        // Multi-level state still rising: same edge again
        assert!(edges(&mut adapter, "state changed (1->2)").is_empty());
        assert_eq!(edges(&mut adapter, "state changed (2->0)").len(), 1);
    }

    #[test]
    fn test_handle_gives_button_identity() {
        let mut adapter = TextEventAdapter::new();
        assert_eq!(
            edges(&mut adapter, "handle=42 buttonState changed (0->1)"),
            vec![("handle-42".to_string(), Edge::Pressed)]
        );
        // Different button, not a repeat
        assert_eq!(edges(&mut adapter, "state changed (0->1)").len(), 1);
    }

    #[test]
    fn test_key_tap_lines() {
        let mut adapter = TextEventAdapter::new();
        assert_eq!(
            edges(&mut adapter, "KEY DOWN: 36"),
            vec![("key-36".to_string(), Edge::Pressed)]
        );
        assert_eq!(
            edges(&mut adapter, "KEY UP: 36"),
            vec![("key-36".to_string(), Edge::Released)]
        );
        assert_eq!(
            edges(&mut adapter, "SYSTEM KEY: 16 (DOWN)"),
            vec![("syskey-16".to_string(), Edge::Pressed)]
        );
    }

    #[test]
    fn test_report_indication_is_note_only() {
        let mut adapter = TextEventAdapter::new();
        let outcome = adapter.adapt(
            "Received input report indication: handle=27 length=8",
            Instant::now(),
        );
        assert!(outcome.edges.is_empty());
        let note = outcome.note.unwrap();
        assert!(note.contains("handle=27"));
        assert!(note.contains("length=8"));
    }

    #[test]
    fn test_unmatched_lines_yield_nothing() {
        let mut adapter = TextEventAdapter::new();
        let outcome = adapter.adapt("connection interval updated", Instant::now());
        assert_eq!(outcome, AdaptOutcome::none());
        assert_eq!(adapter.adapt("   ", Instant::now()), AdaptOutcome::none());
    }

    #[test]
    fn test_overflowing_state_is_malformed() {
        let mut adapter = TextEventAdapter::new();
        let outcome = adapter.adapt(
            "state changed (0->99999999999999999999999)",
            Instant::now(),
        );
        assert!(outcome.edges.is_empty());
        assert!(outcome.note.is_some());
    }

    #[test]
    fn test_custom_default_button() {
        let mut adapter = TextEventAdapter::with_default_button(ButtonId::new("ring"));
        assert_eq!(
            edges(&mut adapter, "state changed (0->1)"),
            vec![("ring".to_string(), Edge::Pressed)]
        );
    }
}
