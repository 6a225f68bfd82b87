//! Offline classification of capture scripts.

use crate::cli::common::{print_json, CliError, CliResult};
use crate::cli::config::open_store;
use crate::models::{ActionBinding, PressStartPolicy};
use crate::session::replay::{parse_capture, replay, ReplayEvent};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

/// Classify a timed capture script without a device
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Capture script (`<ms> <text line>` or `<ms> hex:<bytes>` per line), `-` for stdin
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Long-press threshold in milliseconds (overrides the configuration)
    #[arg(long, value_name = "MS")]
    threshold: Option<u64>,

    /// Enable double-tap detection
    #[arg(long)]
    double_tap: bool,

    /// Emit PressStart only once the threshold is crossed
    #[arg(long)]
    deferred_start: bool,

    /// Show the binding each gesture resolves to
    #[arg(long)]
    resolve: bool,

    /// Foreground application used with --resolve
    #[arg(long, value_name = "NAME", requires = "resolve")]
    app: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize, Debug)]
struct EventOutput {
    at_ms: u128,
    button_id: String,
    gesture: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    held_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    binding: Option<ActionBinding>,
}

#[derive(Serialize, Debug)]
struct ClassifyOutput {
    events: Vec<EventOutput>,
    edges: usize,
    anomalies: u64,
    notes: Vec<String>,
}

impl ClassifyArgs {
    /// Execute classify command
    pub fn execute(&self) -> CliResult<()> {
        let content = self.read_script()?;
        let entries =
            parse_capture(&content).map_err(|e| CliError::validation(format!("{e:#}")))?;

        let store = open_store()?;
        let config = store.snapshot();
        let mut settings = config.settings.clone();
        if let Some(threshold) = self.threshold {
            settings.long_press_threshold = threshold;
        }
        if self.double_tap {
            settings.double_tap_enabled = true;
        }
        if self.deferred_start {
            settings.press_start_policy = PressStartPolicy::Deferred;
        }
        settings
            .validate()
            .map_err(|e| CliError::validation(format!("{e:#}")))?;

        let outcome = replay(&entries, &settings);
        let describe = |replayed: &ReplayEvent| {
            let event = &replayed.event;
            let (role, binding) = if self.resolve {
                let role = config.role_for(&event.button_id);
                let binding = config.resolve(&role, event.kind, self.app.as_deref());
                (Some(role), Some(binding))
            } else {
                (None, None)
            };
            EventOutput {
                at_ms: replayed.offset.as_millis(),
                button_id: event.button_id.to_string(),
                gesture: event.kind.id().to_string(),
                held_ms: event.held_duration.map(|held| held.as_millis()),
                role,
                binding,
            }
        };
        let events: Vec<EventOutput> = outcome.events.iter().map(describe).collect();

        if self.json {
            return print_json(&ClassifyOutput {
                events,
                edges: outcome.edges,
                anomalies: outcome.anomalies,
                notes: outcome.notes,
            });
        }

        for event in &events {
            let mut line = format!("{:>6}ms  {:<12} {:<14}", event.at_ms, event.button_id, event.gesture);
            if let Some(held) = event.held_ms {
                line.push_str(&format!(" held {held}ms"));
            }
            if let (Some(role), Some(binding)) = (&event.role, &event.binding) {
                line.push_str(&format!("  [{role}] -> {binding}"));
            }
            println!("{}", line.trim_end());
        }
        for note in &outcome.notes {
            eprintln!("note: {note}");
        }
        eprintln!(
            "{} edge(s), {} gesture(s), {} anomaly(ies)",
            outcome.edges,
            events.len(),
            outcome.anomalies
        );
        Ok(())
    }

    fn read_script(&self) -> CliResult<String> {
        if self.file.as_os_str() == "-" {
            return std::io::read_to_string(std::io::stdin())
                .map_err(|e| CliError::io(format!("Failed to read stdin: {e}")));
        }
        std::fs::read_to_string(&self.file).map_err(|e| {
            CliError::io(format!("Failed to read {}: {e}", self.file.display()))
        })
    }
}
