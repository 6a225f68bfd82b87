//! Host script runner shared by the executor, feedback and app lookup.

use crate::dispatch::executor::ExecutorError;
use std::process::{Command, Stdio};

/// Runs host automation scripts through an interpreter (`osascript -e` by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRunner {
    /// Interpreter program
    pub program: String,
    /// Arguments placed before the script text
    pub args: Vec<String>,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new("osascript", ["-e"])
    }
}

impl ScriptRunner {
    /// Creates a runner for `program`, passing `args` before each script.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Runs a script and returns its trimmed standard output.
    pub fn run(&self, script: &str) -> Result<String, ExecutorError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(script);
        run_command(&self.program, &mut cmd)
    }
}

/// Runs a prepared command to completion, mapping failures to [`ExecutorError`].
pub fn run_command(program: &str, cmd: &mut Command) -> Result<String, ExecutorError> {
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| ExecutorError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(ExecutorError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Escapes text for use inside a double-quoted AppleScript string.
#[must_use]
pub fn quote_applescript(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
