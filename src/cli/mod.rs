//! CLI command handlers for ButtonFlow.
//!
//! This module provides headless, scriptable access to the mapping store,
//! the action catalog, offline classification and live sessions.

pub mod actions;
pub mod classify;
pub mod common;
pub mod config;
pub mod run;

// Re-export types used by main.rs and tests
pub use actions::ActionsArgs;
pub use classify::ClassifyArgs;
pub use common::{CliError, CliResult, ExitCode};
pub use config::ConfigArgs;
pub use run::RunArgs;
