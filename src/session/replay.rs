//! Offline classification of timed capture scripts.
//!
//! A capture script has one input per line: a millisecond offset followed by
//! either a diagnostic text line or `hex:` and the bytes of a binary report.
//! Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! # short press on the text channel, long press on the report channel
//! 0    buttonState changed (0->1)
//! 300  buttonState changed (1->0)
//! 1000 hex:01 00 00 00 00 00 00 00
//! 2200 hex:00 00 00 00 00 00 00 00
//! ```
//!
//! Replay runs both adapters and the gesture pipeline against a virtual
//! clock, polling at every deadline exactly when it falls due.

use crate::adapters::binary::parse_hex_report;
use crate::adapters::{Adapter, RawInput};
use crate::classifier::GesturePipeline;
use crate::models::{GestureEvent, Settings};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};

/// Report channel name used for `hex:` entries.
pub const CAPTURE_CHANNEL: &str = "capture";

/// One timed input from a capture script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEntry {
    /// Offset from the start of the capture
    pub offset: Duration,
    /// The input observed at that offset
    pub input: RawInput,
}

/// A classified gesture with its offset from the start of the capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEvent {
    /// Offset at which the gesture was classified
    pub offset: Duration,
    /// The gesture
    pub event: GestureEvent,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    /// Gestures in emission order
    pub events: Vec<ReplayEvent>,
    /// Canonical edges seen
    pub edges: usize,
    /// Adapter notes with the line they came from
    pub notes: Vec<String>,
    /// Duplicate presses and stray releases
    pub anomalies: u64,
}

/// Parses a capture script.
pub fn parse_capture(content: &str) -> Result<Vec<CaptureEntry>> {
    let mut entries = Vec::new();
    let mut last = Duration::ZERO;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (offset, payload) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(offset, rest)| (offset, rest.trim()));
        let millis: u64 = offset
            .parse()
            .context(format!("Line {line_number}: invalid offset '{offset}'"))?;
        let offset = Duration::from_millis(millis);
        if offset < last {
            anyhow::bail!("Line {line_number}: offset {millis}ms goes back in time");
        }
        last = offset;

        let input = match payload.strip_prefix("hex:") {
            Some(hex) => RawInput::Report {
                channel: CAPTURE_CHANNEL.to_string(),
                data: parse_hex_report(hex)
                    .context(format!("Line {line_number}: invalid hex report '{hex}'"))?,
            },
            None => RawInput::Line(payload.to_string()),
        };
        entries.push(CaptureEntry { offset, input });
    }

    Ok(entries)
}

/// Runs `entries` through fresh adapters and a pipeline built from `settings`.
#[must_use]
pub fn replay(entries: &[CaptureEntry], settings: &Settings) -> ReplayOutcome {
    let base = Instant::now();
    let mut text = Adapter::text();
    let mut binary = Adapter::binary(settings);
    let mut pipeline = GesturePipeline::from_settings(settings);
    let mut outcome = ReplayOutcome::default();

    let emit = |outcome: &mut ReplayOutcome, events: Vec<GestureEvent>| {
        outcome.events.extend(events.into_iter().map(|event| ReplayEvent {
            offset: event.at.saturating_duration_since(base),
            event,
        }));
    };

    for entry in entries {
        let at = base + entry.offset;
        while let Some(deadline) = pipeline.next_deadline().filter(|d| *d <= at) {
            let due = pipeline.poll(deadline);
            emit(&mut outcome, due);
        }

        let adapter = match entry.input {
            RawInput::Report { .. } => &mut binary,
            RawInput::Line(_) => &mut text,
        };
        let adapted = adapter.adapt(&entry.input, at);
        if let Some(note) = adapted.note {
            outcome
                .notes
                .push(format!("{}ms: {note}", entry.offset.as_millis()));
        }
        for edge in adapted.edges {
            outcome.edges += 1;
            let events = pipeline.handle_edge(&edge);
            emit(&mut outcome, events);
        }
    }

    // Run out the clock: crossings for presses still held, expired taps
    while let Some(deadline) = pipeline.next_deadline() {
        let due = pipeline.poll(deadline);
        emit(&mut outcome, due);
    }

    outcome.anomalies = pipeline.classifier().anomalies();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GestureKind;

    fn kinds(outcome: &ReplayOutcome) -> Vec<(u128, GestureKind)> {
        outcome
            .events
            .iter()
            .map(|e| (e.offset.as_millis(), e.event.kind))
            .collect()
    }

    #[test]
    fn test_parse_capture() {
        let entries = parse_capture(
            "# comment\n\n0 buttonState changed (0->1)\n120 hex:01 00\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].input, RawInput::Line("buttonState changed (0->1)".into()));
        assert_eq!(entries[1].offset, Duration::from_millis(120));
        assert_eq!(
            entries[1].input,
            RawInput::Report {
                channel: CAPTURE_CHANNEL.into(),
                data: vec![1, 0]
            }
        );
    }

    #[test]
    fn test_parse_capture_errors() {
        assert!(parse_capture("abc line").is_err());
        assert!(parse_capture("100 a\n50 b").is_err());
        assert!(parse_capture("0 hex:0").is_err());
    }

    #[test]
    fn test_replay_short_press() {
        let entries =
            parse_capture("0 buttonState changed (0->1)\n300 buttonState changed (1->0)").unwrap();
        let outcome = replay(&entries, &Settings::default());
        assert_eq!(
            kinds(&outcome),
            vec![(0, GestureKind::PressStart), (300, GestureKind::ShortRelease)]
        );
    }

    #[test]
    fn test_replay_long_press_polls_at_threshold() {
        let entries =
            parse_capture("0 buttonState changed (0->1)\n1200 buttonState changed (1->0)").unwrap();
        let outcome = replay(&entries, &Settings::default());
        assert_eq!(
            kinds(&outcome),
            vec![
                (0, GestureKind::PressStart),
                (800, GestureKind::PressHeld),
                (1200, GestureKind::LongRelease)
            ]
        );
    }

    #[test]
    fn test_replay_press_left_held() {
        let entries = parse_capture("0 hex:01 00 00 00 00 00 00 00").unwrap();
        let outcome = replay(&entries, &Settings::default());
        assert_eq!(
            kinds(&outcome),
            vec![(0, GestureKind::PressStart), (800, GestureKind::PressHeld)]
        );
    }

    #[test]
    fn test_replay_both_channels_one_press() {
        let entries = parse_capture(
            "0 buttonState changed (0->1)\n\
             3 hex:01 00 00 00 00 00 00 00\n\
             300 buttonState changed (1->0)\n\
             302 hex:00 00 00 00 00 00 00 00",
        )
        .unwrap();
        let outcome = replay(&entries, &Settings::default());
        assert_eq!(outcome.edges, 4);
        assert_eq!(outcome.anomalies, 2);
        assert_eq!(
            kinds(&outcome),
            vec![(0, GestureKind::PressStart), (300, GestureKind::ShortRelease)]
        );
    }

    #[test]
    fn test_replay_double_tap() {
        let settings = Settings {
            double_tap_enabled: true,
            ..Settings::default()
        };
        let entries = parse_capture(
            "0 buttonState changed (0->1)\n\
             100 buttonState changed (1->0)\n\
             200 buttonState changed (0->1)\n\
             280 buttonState changed (1->0)\n\
             1000 buttonState changed (0->1)\n\
             1100 buttonState changed (1->0)",
        )
        .unwrap();
        let outcome = replay(&entries, &settings);
        let releases: Vec<_> = kinds(&outcome)
            .into_iter()
            .filter(|(_, kind)| *kind != GestureKind::PressStart)
            .collect();
        assert_eq!(
            releases,
            vec![(280, GestureKind::DoubleTap), (1100, GestureKind::ShortRelease)]
        );
    }

    #[test]
    fn test_replay_notes_malformed_lines() {
        let entries = parse_capture("0 buttonState changed (0->x)\n5 hex:01").unwrap();
        let outcome = replay(&entries, &Settings::default());
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.notes[0].starts_with("5ms:"));
    }
}
