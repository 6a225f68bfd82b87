//! Canonical edge events shared by every signal adapter.

use crate::constants::DEFAULT_BUTTON_ID;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Logical identity of a physical button as reported by an adapter.
///
/// Adapters that cannot tell buttons apart use [`ButtonId::default_button`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ButtonId(String);

impl ButtonId {
    /// Creates a button id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The sentinel id for sources that carry no button identity.
    #[must_use]
    pub fn default_button() -> Self {
        Self(DEFAULT_BUTTON_ID.to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ButtonId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Direction of a button transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Button went down
    Pressed,
    /// Button came back up
    Released,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pressed => write!(f, "pressed"),
            Self::Released => write!(f, "released"),
        }
    }
}

/// A genuine press or release transition for one logical button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEdge {
    /// Which button changed
    pub button_id: ButtonId,
    /// Direction of the change
    pub edge: Edge,
    /// When the raw input carrying this edge was observed
    pub at: Instant,
    /// Opaque diagnostic payload (raw line, changed byte, ...)
    pub source_detail: String,
}

impl CanonicalEdge {
    /// Creates an edge with an empty diagnostic payload.
    pub fn new(button_id: impl Into<ButtonId>, edge: Edge, at: Instant) -> Self {
        Self {
            button_id: button_id.into(),
            edge,
            at,
            source_detail: String::new(),
        }
    }

    /// Attaches a diagnostic payload.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.source_detail = detail.into();
        self
    }
}

impl fmt::Display for CanonicalEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source_detail.is_empty() {
            write!(f, "{} {}", self.button_id, self.edge)
        } else {
            write!(f, "{} {} [{}]", self.button_id, self.edge, self.source_detail)
        }
    }
}
