//! ButtonFlow - gesture classification and action dispatch for input-device buttons
//!
//! Reads raw button signals, classifies presses into gestures and runs the
//! actions bound to them in the mapping configuration.

use buttonflow::cli::{ActionsArgs, ClassifyArgs, CliResult, ConfigArgs, RunArgs};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// ButtonFlow - gesture classification and action dispatch for input-device buttons
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a live session
    Run(RunArgs),
    /// Manage the mapping configuration
    Config(ConfigArgs),
    /// List known actions
    Actions(ActionsArgs),
    /// Classify a capture script offline
    Classify(ClassifyArgs),
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = execute(cli.command) {
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
}

fn execute(command: Command) -> CliResult<()> {
    match command {
        Command::Run(args) => args.execute(),
        Command::Config(args) => args.execute(),
        Command::Actions(args) => args.execute(),
        Command::Classify(args) => args.execute(),
    }
}
