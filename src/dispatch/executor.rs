//! Action executors.
//!
//! [`ActionExecutor`] is the seam between dispatch and the host: it receives
//! `(category, action)` and reports success or a typed failure. The host
//! implementation runs catalog scripts; the dry-run implementation only
//! validates and logs.

use crate::constants::APP_NAME;
use crate::dispatch::catalog::{ActionCatalog, CustomCommand};
use crate::dispatch::script::{quote_applescript, run_command, ScriptRunner};
use crate::models::ActionCategory;
use std::process::Command;
use thiserror::Error;

/// Why an action could not be executed.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// No catalog entry (or custom command form) matches the action
    #[error("unknown {category} action '{action}'")]
    UnknownAction {
        /// Requested category
        category: ActionCategory,
        /// Requested action
        action: String,
    },
    /// The host command could not be started
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
    /// The host command ran and failed
    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed {
        /// Program that failed
        program: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },
}

/// Executes actions on the host.
pub trait ActionExecutor: Send + Sync {
    /// Runs one action.
    fn execute(&self, category: ActionCategory, action: &str) -> Result<(), ExecutorError>;
}

/// Runs catalog scripts and custom commands on the host.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    catalog: &'static ActionCatalog,
    runner: ScriptRunner,
    /// Shell used for `shell:` commands
    shell: String,
    /// Opener used for `open-app:` and `open-url:`
    opener: String,
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self::new(ScriptRunner::default())
    }
}

impl ScriptExecutor {
    /// Creates an executor using the built-in catalog.
    #[must_use]
    pub fn new(runner: ScriptRunner) -> Self {
        Self {
            catalog: ActionCatalog::builtin(),
            runner,
            shell: "sh".to_string(),
            opener: "open".to_string(),
        }
    }

    /// Overrides the shell and opener programs.
    #[must_use]
    pub fn with_programs(mut self, shell: impl Into<String>, opener: impl Into<String>) -> Self {
        self.shell = shell.into();
        self.opener = opener.into();
        self
    }

    fn run_custom(&self, command: &CustomCommand) -> Result<(), ExecutorError> {
        match command {
            CustomCommand::Shell(line) => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(line);
                run_command(&self.shell, &mut cmd).map(drop)
            }
            CustomCommand::OpenApp(app) => {
                let mut cmd = Command::new(&self.opener);
                cmd.arg("-a").arg(app);
                run_command(&self.opener, &mut cmd).map(drop)
            }
            CustomCommand::OpenUrl(url) => {
                let mut cmd = Command::new(&self.opener);
                cmd.arg(url);
                run_command(&self.opener, &mut cmd).map(drop)
            }
            CustomCommand::Type(text) => self
                .runner
                .run(&format!(
                    "tell application \"System Events\" to keystroke {}",
                    quote_applescript(text)
                ))
                .map(drop),
            CustomCommand::Notify(message) => self
                .runner
                .run(&notification_script(APP_NAME, message))
                .map(drop),
        }
    }
}

impl ActionExecutor for ScriptExecutor {
    fn execute(&self, category: ActionCategory, action: &str) -> Result<(), ExecutorError> {
        let unknown = || ExecutorError::UnknownAction {
            category,
            action: action.to_string(),
        };

        match category {
            ActionCategory::Noop => Ok(()),
            ActionCategory::CustomCommand => {
                let command = CustomCommand::parse(action).ok_or_else(unknown)?;
                tracing::debug!("Running custom command {command}");
                self.run_custom(&command)
            }
            _ => {
                let entry = self.catalog.lookup(category, action).ok_or_else(unknown)?;
                tracing::debug!("Running script for '{}'", entry.id);
                self.runner.run(&entry.script).map(drop)
            }
        }
    }
}

/// Validates actions against the catalog and logs instead of running them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl ActionExecutor for DryRunExecutor {
    fn execute(&self, category: ActionCategory, action: &str) -> Result<(), ExecutorError> {
        let known = match category {
            ActionCategory::Noop => true,
            ActionCategory::CustomCommand => CustomCommand::parse(action).is_some(),
            _ => ActionCatalog::builtin().lookup(category, action).is_some(),
        };
        if !known {
            return Err(ExecutorError::UnknownAction {
                category,
                action: action.to_string(),
            });
        }
        tracing::info!("[dry-run] {action} ({category})");
        Ok(())
    }
}

/// AppleScript that shows a notification.
#[must_use]
pub fn notification_script(title: &str, message: &str) -> String {
    format!(
        "display notification {} with title {}",
        quote_applescript(message),
        quote_applescript(title)
    )
}
