//! Classified gesture events produced by the classifier.

use crate::models::edge::ButtonId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Kind of classified gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    /// Button went down (start of a press)
    PressStart,
    /// Button has been held past the long-press threshold
    PressHeld,
    /// Released before the long-press threshold
    ShortRelease,
    /// Released after the long-press threshold
    LongRelease,
    /// Two short releases within the double-tap window
    DoubleTap,
}

impl GestureKind {
    /// Every gesture kind, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::PressStart,
        Self::PressHeld,
        Self::ShortRelease,
        Self::LongRelease,
        Self::DoubleTap,
    ];

    /// Stable identifier used in configuration keys and CLI arguments.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::PressStart => "press_start",
            Self::PressHeld => "press_held",
            Self::ShortRelease => "short_release",
            Self::LongRelease => "long_release",
            Self::DoubleTap => "double_tap",
        }
    }

    /// Parses a gesture identifier.
    ///
    /// Accepts the binding slot names (`short_press`, `long_press`, `held`)
    /// as well as the event names.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "press_start" | "start" => Some(Self::PressStart),
            "press_held" | "held" | "hold" => Some(Self::PressHeld),
            "short_release" | "short_press" | "short" => Some(Self::ShortRelease),
            "long_release" | "long_press" | "long" => Some(Self::LongRelease),
            "double_tap" | "double" => Some(Self::DoubleTap),
            _ => None,
        }
    }

    /// Returns true for gestures emitted when a press ends.
    #[must_use]
    pub const fn is_release(self) -> bool {
        matches!(
            self,
            Self::ShortRelease | Self::LongRelease | Self::DoubleTap
        )
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A classified gesture for one button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureEvent {
    /// Button the gesture belongs to
    pub button_id: ButtonId,
    /// Classification
    pub kind: GestureKind,
    /// When the gesture was classified
    pub at: Instant,
    /// How long the button had been held (absent for `PressStart`)
    pub held_duration: Option<Duration>,
}

impl GestureEvent {
    /// Creates a gesture event.
    pub fn new(
        button_id: ButtonId,
        kind: GestureKind,
        at: Instant,
        held_duration: Option<Duration>,
    ) -> Self {
        Self {
            button_id,
            kind,
            at,
            held_duration,
        }
    }
}

impl fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.held_duration {
            Some(held) => write!(
                f,
                "{} {} ({}ms)",
                self.button_id,
                self.kind,
                held.as_millis()
            ),
            None => write!(f, "{} {}", self.button_id, self.kind),
        }
    }
}
