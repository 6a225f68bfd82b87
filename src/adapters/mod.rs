//! Signal adapters: raw device input to canonical edges.
//!
//! Two structurally different sources describe the same buttons:
//! fixed-width binary reports and semi-structured diagnostic text lines.
//! Each adapter turns its raw input into zero or more [`CanonicalEdge`]s.
//!
//! Adapters never fail. Malformed input yields no edges and a diagnostic
//! note the caller may log or discard. The only state an adapter keeps is the
//! last observed raw state, used to suppress repeats from the same channel.
//! Duplicates across different sources are left for the classifier.

pub mod binary;
pub mod text;

pub use binary::BinaryReportAdapter;
pub use text::TextEventAdapter;

use crate::models::{CanonicalEdge, Settings};
use std::time::Instant;

/// One unit of raw input pulled from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    /// A binary input report
    Report {
        /// Channel the report arrived on (reports are compared per channel)
        channel: String,
        /// Report bytes
        data: Vec<u8>,
    },
    /// A diagnostic text line
    Line(String),
}

/// Result of adapting one raw input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptOutcome {
    /// Edges found, in emission order
    pub edges: Vec<CanonicalEdge>,
    /// Diagnostic note for malformed or ignored input
    pub note: Option<String>,
}

impl AdaptOutcome {
    /// No edges and nothing to report.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// No edges, with a diagnostic note.
    pub fn noted(note: impl Into<String>) -> Self {
        Self {
            edges: Vec::new(),
            note: Some(note.into()),
        }
    }

    /// Edges without a note.
    #[must_use]
    pub fn from_edges(edges: Vec<CanonicalEdge>) -> Self {
        Self { edges, note: None }
    }
}

/// The adapter attached to a raw source.
#[derive(Debug)]
pub enum Adapter {
    /// Decodes binary reports
    Binary(BinaryReportAdapter),
    /// Parses text lines
    Text(TextEventAdapter),
}

impl Adapter {
    /// Binary adapter configured from settings.
    #[must_use]
    pub fn binary(settings: &Settings) -> Self {
        Self::Binary(BinaryReportAdapter::from_settings(settings))
    }

    /// Text adapter with the default button sentinel.
    #[must_use]
    pub fn text() -> Self {
        Self::Text(TextEventAdapter::new())
    }

    /// Adapts one raw input; input of the wrong shape is reported as malformed.
    pub fn adapt(&mut self, input: &RawInput, at: Instant) -> AdaptOutcome {
        match (self, input) {
            (Self::Binary(adapter), RawInput::Report { channel, data }) => {
                adapter.adapt(channel, data, at)
            }
            (Self::Text(adapter), RawInput::Line(line)) => adapter.adapt(line, at),
            (Self::Binary(_), RawInput::Line(_)) => {
                AdaptOutcome::noted("text line delivered to binary report adapter")
            }
            (Self::Text(_), RawInput::Report { .. }) => {
                AdaptOutcome::noted("binary report delivered to text adapter")
            }
        }
    }
}
