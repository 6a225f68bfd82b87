//! Live session command.

use crate::adapters::Adapter;
use crate::cli::common::{CliError, CliResult};
use crate::cli::config::open_store;
use crate::dispatch::{
    ActionExecutor, ActiveAppLookup, Dispatcher, DryRunExecutor, Feedback, FixedAppLookup,
    NoAppLookup, NoFeedback, NotificationFeedback, ScriptAppLookup, ScriptExecutor,
};
use crate::session::{LineSource, ReportSource, SessionController, StopReason};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How often `--watch-config` looks at the configuration file.
const CONFIG_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Run a live session until interrupted or every source is gone
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Read binary input reports from a device node or capture file (repeatable)
    #[arg(long, value_name = "PATH")]
    hid: Vec<PathBuf>,

    /// Read diagnostic text lines from a shell command's output (repeatable)
    #[arg(long, value_name = "COMMAND")]
    text_command: Vec<String>,

    /// Read diagnostic text lines from standard input
    #[arg(long)]
    text_stdin: bool,

    /// Check actions against the catalog and log them instead of running them
    #[arg(long)]
    dry_run: bool,

    /// Treat this application as always in the foreground
    #[arg(long, value_name = "NAME")]
    app: Option<String>,

    /// Do not show notifications after actions
    #[arg(long)]
    no_feedback: bool,

    /// Reload the configuration file when it changes
    #[arg(long)]
    watch_config: bool,

    /// Print each dispatch result as a JSON line
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    /// Execute run command
    pub fn execute(&self) -> CliResult<()> {
        if self.hid.is_empty() && self.text_command.is_empty() && !self.text_stdin {
            return Err(CliError::validation(
                "At least one input source must be specified: --hid, --text-command, or --text-stdin",
            ));
        }

        let store = Arc::new(open_store()?);
        let settings = store.snapshot().settings.clone();

        let executor: Arc<dyn ActionExecutor> = if self.dry_run {
            Arc::new(DryRunExecutor)
        } else {
            Arc::new(ScriptExecutor::default())
        };
        let feedback: Arc<dyn Feedback> = if self.dry_run || self.no_feedback {
            Arc::new(NoFeedback)
        } else {
            Arc::new(NotificationFeedback::default())
        };
        let app_lookup: Arc<dyn ActiveAppLookup> = match (&self.app, self.dry_run) {
            (Some(app), _) => Arc::new(FixedAppLookup::new(app.clone())),
            (None, true) => Arc::new(NoAppLookup),
            (None, false) => Arc::new(ScriptAppLookup::default()),
        };
        let dispatcher = Dispatcher::new(store, executor, feedback).with_app_lookup(app_lookup);
        let mut session = SessionController::new(Arc::new(dispatcher));

        for path in &self.hid {
            let source = ReportSource::open(path, settings.report_length)
                .map_err(|e| CliError::io(format!("{e:#}")))?;
            session.add_source(Box::new(source), Adapter::binary(&settings));
        }
        for command in &self.text_command {
            let source =
                LineSource::spawn_command(command).map_err(|e| CliError::io(format!("{e:#}")))?;
            session.add_source(Box::new(source), Adapter::text());
        }
        if self.text_stdin {
            session.add_source(Box::new(LineSource::stdin()), Adapter::text());
        }

        if self.watch_config {
            session.watch_config(CONFIG_WATCH_INTERVAL);
        }

        let json = self.json;
        session.on_result(move |result| {
            if json {
                match serde_json::to_string(result) {
                    Ok(line) => println!("{line}"),
                    Err(err) => tracing::warn!("Failed to serialize result: {err}"),
                }
            } else if !result.binding.is_noop() {
                println!("{result}");
            }
        });

        let stop = session.stop_handle();
        ctrlc::set_handler(move || {
            tracing::info!("Received shutdown signal...");
            stop.stop();
        })
        .map_err(|e| CliError::io(format!("Failed to install Ctrl+C handler: {e}")))?;

        let reason = session
            .run()
            .map_err(|e| CliError::validation(format!("{e:#}")))?;

        match &reason {
            StopReason::Stopped => eprintln!("Session stopped."),
            StopReason::SourceLost { .. } => eprintln!("Session {reason}."),
        }
        eprintln!("{}", session.stats());
        Ok(())
    }
}
