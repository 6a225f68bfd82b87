//! Mapping configuration: gesture to action bindings, per-application
//! overrides and engine settings.
//!
//! # Resolution
//!
//! [`MappingConfig::resolve`] looks a binding up in three steps:
//! 1. `applications[app]["<role>:<gesture>"]`, then `applications[app][role]`
//!    for release gestures (short, long, double tap)
//! 2. the global `buttons[role]` slot for the gesture (double taps fall back
//!    to `gestures["double_tap"]`)
//! 3. the built-in no-op binding

use crate::constants::{
    CONFIG_VERSION, DEFAULT_BUTTON_ID, DEFAULT_DOUBLE_TAP_MS, DEFAULT_LONG_PRESS_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REPORT_LENGTH,
};
use crate::models::binding::{ActionBinding, ActionCategory};
use crate::models::edge::ButtonId;
use crate::models::gesture::GestureKind;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Bindings for one button role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ButtonBindings {
    /// Released before the long-press threshold
    #[serde(default)]
    pub short_press: ActionBinding,
    /// Released after the long-press threshold
    #[serde(default)]
    pub long_press: ActionBinding,
    /// Fired when the press starts (sustain-while-held actions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub press_start: Option<ActionBinding>,
    /// Fired once when the long-press threshold is crossed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held: Option<ActionBinding>,
    /// Fired for a double tap (only with double-tap detection enabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_tap: Option<ActionBinding>,
}

impl ButtonBindings {
    /// Creates bindings with short and long press actions.
    pub fn new(short_press: ActionBinding, long_press: ActionBinding) -> Self {
        Self {
            short_press,
            long_press,
            ..Self::default()
        }
    }

    /// Returns the configured binding slot for a gesture, if any.
    #[must_use]
    pub fn binding_for(&self, kind: GestureKind) -> Option<&ActionBinding> {
        match kind {
            GestureKind::ShortRelease => Some(&self.short_press),
            GestureKind::LongRelease => Some(&self.long_press),
            GestureKind::PressStart => self.press_start.as_ref(),
            GestureKind::PressHeld => self.held.as_ref(),
            GestureKind::DoubleTap => self.double_tap.as_ref(),
        }
    }

    /// Replaces the binding slot for a gesture.
    pub fn set_binding(&mut self, kind: GestureKind, binding: ActionBinding) {
        match kind {
            GestureKind::ShortRelease => self.short_press = binding,
            GestureKind::LongRelease => self.long_press = binding,
            GestureKind::PressStart => self.press_start = Some(binding),
            GestureKind::PressHeld => self.held = Some(binding),
            GestureKind::DoubleTap => self.double_tap = Some(binding),
        }
    }

    /// Clears the binding slot for a gesture.
    pub fn clear_binding(&mut self, kind: GestureKind) {
        match kind {
            GestureKind::ShortRelease => self.short_press = ActionBinding::noop(),
            GestureKind::LongRelease => self.long_press = ActionBinding::noop(),
            GestureKind::PressStart => self.press_start = None,
            GestureKind::PressHeld => self.held = None,
            GestureKind::DoubleTap => self.double_tap = None,
        }
    }
}

/// When the classifier emits `PressStart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PressStartPolicy {
    /// Emit at press-down; short and long presses differ only at release
    #[default]
    Immediate,
    /// Emit only once the long-press threshold is crossed, right before `PressHeld`
    Deferred,
}

/// Maps one bit of a binary input report to a button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitBinding {
    /// Byte offset within the report
    pub byte: usize,
    /// Bit within the byte (0 = least significant)
    pub bit: u8,
    /// Button the bit belongs to
    pub button: ButtonId,
}

impl BitBinding {
    /// Creates a bit binding.
    pub fn new(byte: usize, bit: u8, button: impl Into<ButtonId>) -> Self {
        Self {
            byte,
            bit,
            button: button.into(),
        }
    }

    /// Absolute bit index used to order simultaneous transitions.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.byte * 8 + self.bit as usize
    }
}

/// Default report bit table: the first three bits of byte 0.
#[must_use]
pub fn default_report_bits() -> Vec<BitBinding> {
    vec![
        BitBinding::new(0, 0, DEFAULT_BUTTON_ID),
        BitBinding::new(0, 1, "secondary"),
        BitBinding::new(0, 2, "tertiary"),
    ]
}

fn default_button_roles() -> BTreeMap<String, String> {
    BTreeMap::from([
        (DEFAULT_BUTTON_ID.to_string(), "bottom".to_string()),
        ("secondary".to_string(), "middle".to_string()),
        ("tertiary".to_string(), "top".to_string()),
    ])
}

const fn default_long_press_threshold() -> u64 {
    DEFAULT_LONG_PRESS_MS
}

const fn default_double_tap_threshold() -> u64 {
    DEFAULT_DOUBLE_TAP_MS
}

const fn default_true() -> bool {
    true
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_dispatch_workers() -> usize {
    2
}

const fn default_dispatch_queue_capacity() -> usize {
    32
}

const fn default_report_length() -> usize {
    DEFAULT_REPORT_LENGTH
}

const fn default_version() -> u32 {
    CONFIG_VERSION
}

/// Engine settings.
///
/// Keys this version does not know are kept in `extra` and written back
/// unchanged on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Long-press threshold in milliseconds (a press of exactly this length is long)
    #[serde(default = "default_long_press_threshold")]
    pub long_press_threshold: u64,
    /// Maximum gap between two short releases forming a double tap, in milliseconds
    #[serde(default = "default_double_tap_threshold")]
    pub double_tap_threshold: u64,
    /// Collapse two quick short presses into a double tap
    #[serde(default)]
    pub double_tap_enabled: bool,
    /// Show a notification after each successful action
    #[serde(default = "default_true")]
    pub feedback_enabled: bool,
    /// When `PressStart` is emitted
    #[serde(default)]
    pub press_start_policy: PressStartPolicy,
    /// Event loop poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Number of dispatch worker lanes
    #[serde(default = "default_dispatch_workers")]
    pub dispatch_workers: usize,
    /// Queued dispatches per lane before new ones are dropped
    #[serde(default = "default_dispatch_queue_capacity")]
    pub dispatch_queue_capacity: usize,
    /// Expected length of a binary input report in bytes
    #[serde(default = "default_report_length")]
    pub report_length: usize,
    /// Report bit to button table
    #[serde(default = "default_report_bits")]
    pub report_bits: Vec<BitBinding>,
    /// Adapter button id to configuration role
    #[serde(default = "default_button_roles")]
    pub button_roles: BTreeMap<String, String>,
    /// Settings not understood by this version
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            long_press_threshold: default_long_press_threshold(),
            double_tap_threshold: default_double_tap_threshold(),
            double_tap_enabled: false,
            feedback_enabled: true,
            press_start_policy: PressStartPolicy::default(),
            poll_interval_ms: default_poll_interval(),
            dispatch_workers: default_dispatch_workers(),
            dispatch_queue_capacity: default_dispatch_queue_capacity(),
            report_length: default_report_length(),
            report_bits: default_report_bits(),
            button_roles: default_button_roles(),
            extra: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Long-press threshold as a duration.
    #[must_use]
    pub const fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_threshold)
    }

    /// Double-tap window as a duration.
    #[must_use]
    pub const fn double_tap(&self) -> Duration {
        Duration::from_millis(self.double_tap_threshold)
    }

    /// Poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validates setting values.
    ///
    /// Checks:
    /// - thresholds and poll interval are non-zero
    /// - at least one dispatch lane with room for one job
    /// - every report bit lies inside the report and inside its byte
    pub fn validate(&self) -> Result<()> {
        if self.long_press_threshold == 0 {
            anyhow::bail!("long_press_threshold must be greater than 0");
        }
        if self.double_tap_threshold == 0 {
            anyhow::bail!("double_tap_threshold must be greater than 0");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }
        if self.dispatch_workers == 0 || self.dispatch_queue_capacity == 0 {
            anyhow::bail!("dispatch_workers and dispatch_queue_capacity must be at least 1");
        }
        if self.report_length == 0 {
            anyhow::bail!("report_length must be greater than 0");
        }
        for binding in &self.report_bits {
            if binding.bit > 7 {
                anyhow::bail!(
                    "report bit {} for button '{}' is out of range (0-7)",
                    binding.bit,
                    binding.button
                );
            }
            if binding.byte >= self.report_length {
                anyhow::bail!(
                    "report byte {} for button '{}' is outside the {}-byte report",
                    binding.byte,
                    binding.button,
                    self.report_length
                );
            }
        }
        Ok(())
    }
}

/// Complete button mapping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Global bindings per button role
    #[serde(default)]
    pub buttons: BTreeMap<String, ButtonBindings>,
    /// Bindings for named gestures (`double_tap`, `diagonal_swipe`, ...)
    #[serde(default)]
    pub gestures: BTreeMap<String, ActionBinding>,
    /// Per-application overrides: app name → (role or `role:gesture`) → binding
    #[serde(default)]
    pub applications: BTreeMap<String, BTreeMap<String, ActionBinding>>,
    /// Engine settings
    #[serde(default)]
    pub settings: Settings,
}

impl Default for MappingConfig {
    fn default() -> Self {
        use ActionCategory::{ApplicationControl, DictationControl, KeyboardShortcut};

        let buttons = BTreeMap::from([
            (
                "bottom".to_string(),
                ButtonBindings::new(
                    ActionBinding::new(DictationControl, "Start Recording"),
                    ActionBinding::new(DictationControl, "Dictation Hotkey (Ctrl+Up)"),
                ),
            ),
            (
                "middle".to_string(),
                ButtonBindings::new(
                    ActionBinding::new(ApplicationControl, "Next Tab (Cmd+Shift+])"),
                    ActionBinding::new(ApplicationControl, "Previous Tab (Cmd+Shift+[)"),
                ),
            ),
            (
                "top".to_string(),
                ButtonBindings::new(
                    ActionBinding::new(DictationControl, "Stop Recording"),
                    ActionBinding::noop(),
                ),
            ),
        ]);

        let gestures = BTreeMap::from([
            (
                "double_tap".to_string(),
                ActionBinding::new(KeyboardShortcut, "Escape"),
            ),
            (
                "diagonal_swipe".to_string(),
                ActionBinding::new(KeyboardShortcut, "Return (Enter)"),
            ),
        ]);

        let middle_override = |action: &str| {
            BTreeMap::from([(
                "middle".to_string(),
                ActionBinding::new(ApplicationControl, action),
            )])
        };
        let applications = BTreeMap::from([
            ("Termius".to_string(), middle_override("Termius Next Tab")),
            ("Safari".to_string(), middle_override("New Tab (Cmd+T)")),
            ("Google Chrome".to_string(), middle_override("New Tab (Cmd+T)")),
        ]);

        Self {
            version: CONFIG_VERSION,
            buttons,
            gestures,
            applications,
            settings: Settings::default(),
        }
    }
}

impl MappingConfig {
    /// Configuration role for an adapter button id.
    #[must_use]
    pub fn role_for(&self, button_id: &ButtonId) -> String {
        self.settings
            .button_roles
            .get(button_id.as_str())
            .cloned()
            .unwrap_or_else(|| button_id.as_str().to_string())
    }

    /// Resolves the binding for a gesture on a button role.
    ///
    /// Always returns a binding; the no-op binding when nothing is configured.
    #[must_use]
    pub fn resolve(
        &self,
        button_role: &str,
        gesture: GestureKind,
        active_app: Option<&str>,
    ) -> ActionBinding {
        if let Some(binding) = active_app.and_then(|app| self.app_override(app, button_role, gesture)) {
            return binding.clone();
        }

        if let Some(binding) = self
            .buttons
            .get(button_role)
            .and_then(|bindings| bindings.binding_for(gesture))
        {
            return binding.clone();
        }

        if gesture == GestureKind::DoubleTap {
            if let Some(binding) = self.gestures.get(GestureKind::DoubleTap.id()) {
                return binding.clone();
            }
        }

        ActionBinding::noop()
    }

    /// Looks up an application override for a role and gesture.
    fn app_override(&self, app: &str, role: &str, gesture: GestureKind) -> Option<&ActionBinding> {
        let overrides = self.applications.get(app)?;

        // Gesture-qualified keys win over the plain role key
        let qualified = overrides.iter().find_map(|(key, binding)| {
            let (key_role, key_gesture) = key.split_once(':')?;
            (normalize_role(key_role) == role && GestureKind::parse(key_gesture) == Some(gesture))
                .then_some(binding)
        });
        if qualified.is_some() {
            return qualified;
        }

        if !gesture.is_release() {
            return None;
        }
        overrides
            .iter()
            .find(|(key, _)| !key.contains(':') && normalize_role(key) == role)
            .map(|(_, binding)| binding)
    }

    /// Lists every configured binding with a human-readable location.
    #[must_use]
    pub fn all_bindings(&self) -> Vec<(String, &ActionBinding)> {
        let mut bindings = Vec::new();
        for (role, slots) in &self.buttons {
            for kind in GestureKind::ALL {
                if let Some(binding) = slots.binding_for(kind) {
                    bindings.push((format!("buttons.{role}.{kind}"), binding));
                }
            }
        }
        for (gesture, binding) in &self.gestures {
            bindings.push((format!("gestures.{gesture}"), binding));
        }
        for (app, overrides) in &self.applications {
            for (key, binding) in overrides {
                bindings.push((format!("applications.{app}.{key}"), binding));
            }
        }
        bindings
    }
}

/// Strips the legacy `_button` suffix from an override key.
fn normalize_role(key: &str) -> &str {
    key.strip_suffix("_button").unwrap_or(key)
}
