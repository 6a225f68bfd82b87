//! Configuration management CLI commands.

use crate::cli::common::{print_json, CliError, CliResult};
use crate::config::MappingStore;
use crate::constants::APP_BINARY_NAME;
use crate::dispatch::ActionCatalog;
use crate::models::{ActionBinding, ActionCategory, GestureKind, MappingConfig, Settings};
use clap::{Args, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// Configuration management commands
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Display the effective configuration
    Show(ConfigShowArgs),
    /// Print the configuration file path
    Path,
    /// Change an engine setting
    Set(ConfigSetArgs),
    /// Bind an action to a button gesture
    Bind(ConfigBindArgs),
    /// Remove a binding
    Unbind(ConfigUnbindArgs),
    /// Overwrite the configuration with the defaults
    Reset,
    /// Import a configuration file (current or legacy layout)
    Import(ConfigImportArgs),
    /// Check every binding against the action catalog
    Check(ConfigCheckArgs),
}

/// Display the effective configuration
#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Change an engine setting
#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Setting name (e.g. long_press_threshold)
    key: String,

    /// New value (JSON literal or plain string)
    value: String,
}

/// Bind an action to a button gesture
#[derive(Args, Debug)]
pub struct ConfigBindArgs {
    /// Button role (bottom, middle, top, ...)
    role: String,

    /// Gesture (short_press, long_press, press_start, held, double_tap)
    gesture: String,

    /// Action category (keyboard_shortcut, dictation_control, custom_command, ...)
    category: String,

    /// Action name from `buttonflow actions`, or a custom command
    action: String,

    /// Only while this application is in the foreground
    #[arg(long, value_name = "NAME")]
    app: Option<String>,

    /// Description stored with the binding
    #[arg(long)]
    description: Option<String>,

    /// Accept actions missing from the catalog
    #[arg(long)]
    force: bool,
}

/// Remove a binding
#[derive(Args, Debug)]
pub struct ConfigUnbindArgs {
    /// Button role
    role: String,

    /// Gesture
    gesture: String,

    /// Remove the override for this application instead
    #[arg(long, value_name = "NAME")]
    app: Option<String>,
}

/// Import a configuration file
#[derive(Args, Debug)]
pub struct ConfigImportArgs {
    /// File to import
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

/// Check every binding against the action catalog
#[derive(Args, Debug)]
pub struct ConfigCheckArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl ConfigArgs {
    /// Execute config subcommand
    pub fn execute(&self) -> CliResult<()> {
        match &self.command {
            ConfigCommand::Show(args) => args.execute(),
            ConfigCommand::Path => {
                println!("{}", config_path()?.display());
                Ok(())
            }
            ConfigCommand::Set(args) => args.execute(),
            ConfigCommand::Bind(args) => args.execute(),
            ConfigCommand::Unbind(args) => args.execute(),
            ConfigCommand::Reset => {
                let store = open_store()?;
                store
                    .reset()
                    .map_err(|e| CliError::io(format!("Failed to reset configuration: {e:#}")))?;
                println!("Configuration reset to defaults.");
                Ok(())
            }
            ConfigCommand::Import(args) => args.execute(),
            ConfigCommand::Check(args) => args.execute(),
        }
    }
}

fn config_path() -> CliResult<PathBuf> {
    MappingStore::config_file_path()
        .map_err(|e| CliError::io(format!("Failed to resolve config path: {e:#}")))
}

/// Opens the store at the default location.
pub fn open_store() -> CliResult<MappingStore> {
    Ok(MappingStore::open(config_path()?))
}

fn parse_gesture(value: &str) -> CliResult<GestureKind> {
    GestureKind::parse(value).ok_or_else(|| {
        CliError::validation(format!(
            "Unknown gesture '{value}'. Expected one of: short_press, long_press, press_start, held, double_tap"
        ))
    })
}

/// Application override key for a role and gesture.
fn override_key(role: &str, gesture: GestureKind) -> String {
    format!("{role}:{}", gesture.id())
}

impl ConfigShowArgs {
    /// Execute show command
    pub fn execute(&self) -> CliResult<()> {
        let store = open_store()?;
        let config = store.snapshot();

        if self.json {
            print_json(&*config)
        } else {
            output_human_readable(store.path(), &config);
            Ok(())
        }
    }
}

/// Output configuration in human-readable format
fn output_human_readable(path: &std::path::Path, config: &MappingConfig) {
    println!("ButtonFlow Configuration");
    println!("========================");
    println!("File: {}", path.display());
    println!();

    println!("Buttons:");
    for (role, slots) in &config.buttons {
        println!("  {role}:");
        for kind in GestureKind::ALL {
            if let Some(binding) = slots.binding_for(kind) {
                println!("    {:<14} {binding}", kind.id());
            }
        }
    }
    println!();

    if !config.gestures.is_empty() {
        println!("Gestures:");
        for (name, binding) in &config.gestures {
            println!("  {name:<16} {binding}");
        }
        println!();
    }

    if !config.applications.is_empty() {
        println!("Application overrides:");
        for (app, overrides) in &config.applications {
            println!("  {app}:");
            for (key, binding) in overrides {
                println!("    {key:<22} {binding}");
            }
        }
        println!();
    }

    let settings = &config.settings;
    println!("Settings:");
    println!("  Long press threshold: {}ms", settings.long_press_threshold);
    println!(
        "  Double tap: {} ({}ms)",
        if settings.double_tap_enabled { "enabled" } else { "disabled" },
        settings.double_tap_threshold
    );
    println!("  Press start policy: {:?}", settings.press_start_policy);
    println!("  Feedback: {}", settings.feedback_enabled);
    println!("  Poll interval: {}ms", settings.poll_interval_ms);
    println!(
        "  Dispatch: {} lane(s) x {} job(s)",
        settings.dispatch_workers, settings.dispatch_queue_capacity
    );
    println!("  Report length: {} bytes", settings.report_length);
    for bit in &settings.report_bits {
        println!("    byte {} bit {} -> {}", bit.byte, bit.bit, bit.button);
    }
    for (button, role) in &settings.button_roles {
        println!("  Button {button} -> role {role}");
    }
}

impl ConfigSetArgs {
    /// Execute set command
    pub fn execute(&self) -> CliResult<()> {
        let store = open_store()?;
        let mut config = (*store.snapshot()).clone();
        config.settings = apply_setting(&config.settings, &self.key, &self.value)?;

        store
            .save(&config)
            .map_err(|e| CliError::validation(format!("Failed to save configuration: {e:#}")))?;
        println!("Set {} = {}", self.key, self.value);
        Ok(())
    }
}

/// Returns `settings` with one key replaced.
///
/// The value is parsed as JSON when possible and as a plain string otherwise.
pub fn apply_setting(settings: &Settings, key: &str, raw: &str) -> CliResult<Settings> {
    let mut document = serde_json::to_value(Settings::default())
        .map_err(|e| CliError::io(format!("Failed to serialize settings: {e}")))?;
    let known = document
        .as_object()
        .is_some_and(|fields| fields.contains_key(key));
    if !known {
        return Err(CliError::validation(format!("Unknown setting '{key}'")));
    }

    document = serde_json::to_value(settings)
        .map_err(|e| CliError::io(format!("Failed to serialize settings: {e}")))?;
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    if let Some(fields) = document.as_object_mut() {
        fields.insert(key.to_string(), value);
    }

    let updated: Settings = serde_json::from_value(document)
        .map_err(|e| CliError::validation(format!("Invalid value for '{key}': {e}")))?;
    updated
        .validate()
        .map_err(|e| CliError::validation(format!("{e:#}")))?;
    Ok(updated)
}

impl ConfigBindArgs {
    /// Execute bind command
    pub fn execute(&self) -> CliResult<()> {
        let gesture = parse_gesture(&self.gesture)?;
        let category = ActionCategory::parse(&self.category).ok_or_else(|| {
            CliError::validation(format!("Unknown category '{}'", self.category))
        })?;

        let mut binding = ActionBinding::new(category, self.action.trim());
        if let Some(description) = &self.description {
            binding = binding.with_description(description);
        }
        if let Err(problem) = ActionCatalog::builtin().check_binding(&binding) {
            if !self.force {
                return Err(CliError::validation(format!(
                    "{problem} (see `{APP_BINARY_NAME} actions`, or use --force to bind it anyway)"
                )));
            }
            eprintln!("Warning: {problem}");
        }

        let store = open_store()?;
        let mut config = (*store.snapshot()).clone();
        match &self.app {
            Some(app) => {
                config
                    .applications
                    .entry(app.clone())
                    .or_default()
                    .insert(override_key(&self.role, gesture), binding.clone());
            }
            None => {
                config
                    .buttons
                    .entry(self.role.clone())
                    .or_default()
                    .set_binding(gesture, binding.clone());
            }
        }

        store
            .save(&config)
            .map_err(|e| CliError::io(format!("Failed to save configuration: {e:#}")))?;

        match &self.app {
            Some(app) => println!("Bound {} {} -> {binding} in {app}", self.role, gesture),
            None => println!("Bound {} {} -> {binding}", self.role, gesture),
        }
        Ok(())
    }
}

impl ConfigUnbindArgs {
    /// Execute unbind command
    pub fn execute(&self) -> CliResult<()> {
        let gesture = parse_gesture(&self.gesture)?;
        let store = open_store()?;
        let mut config = (*store.snapshot()).clone();

        match &self.app {
            Some(app) => {
                let overrides = config.applications.get_mut(app).ok_or_else(|| {
                    CliError::validation(format!("No overrides for application '{app}'"))
                })?;
                let qualified = override_key(&self.role, gesture);
                let removed = overrides.remove(&qualified).is_some()
                    || (gesture.is_release() && overrides.remove(&self.role).is_some());
                if !removed {
                    return Err(CliError::validation(format!(
                        "No {} {} override for '{app}'",
                        self.role, gesture
                    )));
                }
                if overrides.is_empty() {
                    config.applications.remove(app);
                }
            }
            None => {
                let slots = config.buttons.get_mut(&self.role).ok_or_else(|| {
                    CliError::validation(format!("Unknown button role '{}'", self.role))
                })?;
                slots.clear_binding(gesture);
            }
        }

        store
            .save(&config)
            .map_err(|e| CliError::io(format!("Failed to save configuration: {e:#}")))?;
        println!("Removed {} {}", self.role, gesture);
        Ok(())
    }
}

impl ConfigImportArgs {
    /// Execute import command
    pub fn execute(&self) -> CliResult<()> {
        if !self.file.exists() {
            return Err(CliError::io(format!(
                "File not found: {}",
                self.file.display()
            )));
        }
        let store = open_store()?;
        let config = store
            .import(&self.file)
            .map_err(|e| CliError::validation(format!("Failed to import: {e:#}")))?;

        println!(
            "Imported {} button role(s) and {} application override set(s) into {}",
            config.buttons.len(),
            config.applications.len(),
            store.path().display()
        );
        for warning in ActionCatalog::builtin().validate(&config) {
            eprintln!("Warning: {warning}");
        }
        Ok(())
    }
}

impl ConfigCheckArgs {
    /// Execute check command
    pub fn execute(&self) -> CliResult<()> {
        let store = open_store()?;
        let config = store.snapshot();
        let mut problems = ActionCatalog::builtin().validate(&config);
        if let Err(err) = config.settings.validate() {
            problems.push(format!("settings: {err:#}"));
        }

        if self.json {
            print_json(&serde_json::json!({
                "path": store.path(),
                "valid": problems.is_empty(),
                "problems": problems,
            }))?;
        } else if problems.is_empty() {
            println!("✓ Configuration OK ({})", store.path().display());
        } else {
            for problem in &problems {
                println!("✗ {problem}");
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CliError::validation(format!(
                "{} problem(s) found",
                problems.len()
            )))
        }
    }
}
