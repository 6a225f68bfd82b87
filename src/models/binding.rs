//! Action bindings: what to run for a gesture.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of an action; selects the argument shape the executor expects.
///
/// Older configuration files used display names ("Keyboard Shortcuts",
/// "WisprFlow Actions", ...); those are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionCategory {
    /// Send a keystroke combination
    #[serde(
        rename = "keyboard_shortcut",
        alias = "keyboard-shortcut",
        alias = "Keyboard Shortcuts"
    )]
    KeyboardShortcut,
    /// Control the foreground application (tabs, scrolling, focus)
    #[serde(
        rename = "application_control",
        alias = "application-control",
        alias = "Application Control"
    )]
    ApplicationControl,
    /// System-level controls (mission control, screenshots, lock)
    #[serde(
        rename = "system_control",
        alias = "system-control",
        alias = "System Control"
    )]
    SystemControl,
    /// User-defined command (`shell:`, `open-app:`, `open-url:`, `type:`, `notify:`)
    #[serde(
        rename = "custom_command",
        alias = "custom-command",
        alias = "Custom Commands"
    )]
    CustomCommand,
    /// Dictation recording control (start/stop/toggle/cancel/confirm)
    #[serde(
        rename = "dictation_control",
        alias = "dictation-control",
        alias = "WisprFlow Actions"
    )]
    DictationControl,
    /// Built-in binding that does nothing
    #[serde(rename = "none", alias = "noop")]
    Noop,
}

impl ActionCategory {
    /// Categories an executor can run, in display order.
    pub const EXECUTABLE: [Self; 5] = [
        Self::KeyboardShortcut,
        Self::ApplicationControl,
        Self::SystemControl,
        Self::CustomCommand,
        Self::DictationControl,
    ];

    /// Stable identifier used in configuration files and CLI arguments.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::KeyboardShortcut => "keyboard_shortcut",
            Self::ApplicationControl => "application_control",
            Self::SystemControl => "system_control",
            Self::CustomCommand => "custom_command",
            Self::DictationControl => "dictation_control",
            Self::Noop => "none",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::KeyboardShortcut => "Keyboard Shortcuts",
            Self::ApplicationControl => "Application Control",
            Self::SystemControl => "System Control",
            Self::CustomCommand => "Custom Commands",
            Self::DictationControl => "Dictation Control",
            Self::Noop => "None",
        }
    }

    /// Parses a category from its id or display name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "keyboard_shortcut" | "keyboard_shortcuts" | "shortcut" => Some(Self::KeyboardShortcut),
            "application_control" | "app_control" | "app" => Some(Self::ApplicationControl),
            "system_control" | "system" => Some(Self::SystemControl),
            "custom_command" | "custom_commands" | "custom" => Some(Self::CustomCommand),
            "dictation_control" | "dictation" | "wisprflow_actions" => Some(Self::DictationControl),
            "none" | "noop" => Some(Self::Noop),
            _ => None,
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// The configured action for a (button, gesture) pair.
///
/// In configuration files a binding is either an object
/// `{"category": ..., "action": ..., "description": ...}` or a bare action
/// name. Loading fills in missing categories from the action catalog before
/// deserializing; a binding that still has none is an application control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BindingRepr")]
pub struct ActionBinding {
    /// Action category
    pub category: ActionCategory,
    /// Action identifier understood by the executor
    pub action: String,
    /// Free-form description shown to the user
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ActionBinding {
    /// Creates a binding without a description.
    pub fn new(category: ActionCategory, action: impl Into<String>) -> Self {
        Self {
            category,
            action: action.into(),
            description: String::new(),
        }
    }

    /// The built-in binding that does nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(ActionCategory::Noop, "")
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns true if dispatching this binding should do nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.category == ActionCategory::Noop || self.action.trim().is_empty()
    }
}

impl Default for ActionBinding {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Display for ActionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            write!(f, "(none)")
        } else {
            write!(f, "{} [{}]", self.action, self.category)
        }
    }
}

/// Accepted on-disk forms of a binding.
#[derive(Deserialize)]
#[serde(untagged)]
enum BindingRepr {
    Full {
        #[serde(default)]
        category: Option<ActionCategory>,
        #[serde(default)]
        action: String,
        #[serde(default)]
        description: String,
    },
    Name(String),
}

impl From<BindingRepr> for ActionBinding {
    fn from(repr: BindingRepr) -> Self {
        match repr {
            BindingRepr::Full {
                category,
                action,
                description,
            } => Self {
                category: category.unwrap_or(ActionCategory::ApplicationControl),
                action,
                description,
            },
            BindingRepr::Name(action) => Self::new(ActionCategory::ApplicationControl, action),
        }
    }
}
