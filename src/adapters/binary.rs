//! Binary input report decoding.
//!
//! Each tracked bit of a fixed-length report belongs to one button. A report
//! is compared against the previous report seen on the same channel; a bit
//! going 0→1 presses its button, 1→0 releases it. Simultaneous transitions are
//! emitted in ascending bit-index order.

use crate::adapters::AdaptOutcome;
use crate::models::mapping::default_report_bits;
use crate::models::{BitBinding, ButtonId, CanonicalEdge, Edge, Settings};
use crate::constants::DEFAULT_REPORT_LENGTH;
use std::collections::HashMap;
use std::time::Instant;

/// Decodes fixed-length binary reports into press/release edges.
#[derive(Debug, Clone)]
pub struct BinaryReportAdapter {
    /// Expected report length in bytes
    report_length: usize,
    /// Bit table sorted by ascending bit index
    bits: Vec<BitBinding>,
    /// Last report seen per channel
    last_reports: HashMap<String, Vec<u8>>,
}

impl Default for BinaryReportAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_LENGTH, default_report_bits())
    }
}

impl BinaryReportAdapter {
    /// Creates an adapter for reports of `report_length` bytes.
    #[must_use]
    pub fn new(report_length: usize, mut bits: Vec<BitBinding>) -> Self {
        bits.sort_by_key(BitBinding::index);
        Self {
            report_length,
            bits,
            last_reports: HashMap::new(),
        }
    }

    /// Creates an adapter from the report settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.report_length, settings.report_bits.clone())
    }

    /// Expected report length in bytes.
    #[must_use]
    pub const fn report_length(&self) -> usize {
        self.report_length
    }

    /// Compares `report` with the previous report on `channel` and returns the edges.
    ///
    /// The first report on a channel is compared against an all-zero report.
    pub fn adapt(&mut self, channel: &str, report: &[u8], at: Instant) -> AdaptOutcome {
        if report.len() != self.report_length {
            return AdaptOutcome::noted(format!(
                "expected {}-byte report on '{}', got {} bytes: {}",
                self.report_length,
                channel,
                report.len(),
                format_report(report)
            ));
        }

        let zeros;
        let previous: &[u8] = match self.last_reports.get(channel) {
            Some(previous) => previous,
            None => {
                zeros = vec![0u8; self.report_length];
                &zeros
            }
        };

        if previous == report {
            return AdaptOutcome::none();
        }

        let edges = self
            .button_transitions(previous, report)
            .into_iter()
            .map(|(button, edge, detail)| CanonicalEdge::new(button, edge, at).with_detail(detail))
            .collect();

        self.last_reports
            .insert(channel.to_string(), report.to_vec());

        AdaptOutcome::from_edges(edges)
    }

    /// Forgets the last report of every channel.
    pub fn reset(&mut self) {
        self.last_reports.clear();
    }

    /// Per-button transitions between two reports, ordered by each button's lowest bit.
    ///
    /// A button mapped to several bits counts as pressed while any of them is set.
    fn button_transitions(&self, previous: &[u8], current: &[u8]) -> Vec<(ButtonId, Edge, String)> {
        let mut order: Vec<&ButtonId> = Vec::new();
        let mut states: HashMap<&ButtonId, (bool, bool, String)> = HashMap::new();

        for binding in &self.bits {
            let was = bit_is_set(previous, binding);
            let is = bit_is_set(current, binding);
            let entry = states.entry(&binding.button).or_insert_with(|| {
                order.push(&binding.button);
                (false, false, String::new())
            });
            entry.0 |= was;
            entry.1 |= is;
            if was != is && entry.2.is_empty() {
                entry.2 = format!(
                    "byte[{}] 0x{:02X}->0x{:02X} bit{}: {}->{}",
                    binding.byte,
                    previous[binding.byte],
                    current[binding.byte],
                    binding.bit,
                    u8::from(was),
                    u8::from(is)
                );
            }
        }

        order
            .into_iter()
            .filter_map(|button| {
                let (was, is, detail) = states.remove(button)?;
                match (was, is) {
                    (false, true) => Some((button.clone(), Edge::Pressed, detail)),
                    (true, false) => Some((button.clone(), Edge::Released, detail)),
                    _ => None,
                }
            })
            .collect()
    }
}

fn bit_is_set(report: &[u8], binding: &BitBinding) -> bool {
    report
        .get(binding.byte)
        .zip(1u8.checked_shl(u32::from(binding.bit)))
        .is_some_and(|(byte, mask)| byte & mask != 0)
}

/// Formats report bytes as space-separated hex.
#[must_use]
pub fn format_report(report: &[u8]) -> String {
    report
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses space-separated (or contiguous) hex bytes.
#[must_use]
pub fn parse_hex_report(text: &str) -> Option<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}
