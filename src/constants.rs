//! Application-wide constants.
//!
//! This module defines constants used throughout the application,
//! including the application name, configuration locations and the
//! default timing values for gesture classification.

/// The display name of the application (human-readable, with proper capitalization).
pub const APP_NAME: &str = "ButtonFlow";

/// The binary name of the application (used in command examples, lowercase with hyphens).
pub const APP_BINARY_NAME: &str = "buttonflow";

/// Directory name created under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "ButtonFlow";

/// File name of the mapping configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable that overrides the config directory (used by tests and scripts).
pub const CONFIG_DIR_ENV: &str = "BUTTONFLOW_CONFIG_DIR";

/// Current schema version written into saved configuration files.
pub const CONFIG_VERSION: u32 = 1;

/// Default long-press threshold in milliseconds.
pub const DEFAULT_LONG_PRESS_MS: u64 = 800;

/// Default double-tap window in milliseconds.
pub const DEFAULT_DOUBLE_TAP_MS: u64 = 300;

/// Default event loop poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

/// Default expected length of a binary input report.
pub const DEFAULT_REPORT_LENGTH: usize = 8;

/// Sentinel button id used when a source cannot tell buttons apart.
pub const DEFAULT_BUTTON_ID: &str = "primary";
