//! Built-in action catalog and binding validation.
//!
//! The catalog is embedded in the binary and loaded lazily on first access.
//! Each entry carries the host script the default executor runs for it.
//! Custom commands are not listed; they use a `kind:argument` form parsed by
//! [`CustomCommand::parse`].

use crate::models::{ActionBinding, ActionCategory, MappingConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// One known action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    /// Action identifier used in bindings
    pub id: String,
    /// Category the action belongs to
    pub category: ActionCategory,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Host script that performs the action
    pub script: String,
    /// Older names accepted for this action
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Catalog schema from actions.json.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[allow(dead_code)]
    version: String,
    actions: Vec<ActionEntry>,
}

/// Known actions with case-insensitive lookup by id or alias.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    entries: Vec<ActionEntry>,
    /// Lowercased id or alias → entry index
    lookup: HashMap<String, usize>,
}

impl ActionCatalog {
    /// Parses the embedded catalog.
    pub fn load() -> Result<Self> {
        let json_data = include_str!("actions.json");
        let file: CatalogFile =
            serde_json::from_str(json_data).context("Failed to parse embedded actions.json")?;
        Ok(Self::from_entries(file.actions))
    }

    /// Builds a catalog from entries; the first entry wins on duplicate names.
    #[must_use]
    pub fn from_entries(entries: Vec<ActionEntry>) -> Self {
        let mut lookup = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            for name in std::iter::once(&entry.id).chain(&entry.aliases) {
                lookup.entry(name.to_lowercase()).or_insert(idx);
            }
        }
        Self { entries, lookup }
    }

    /// The shared built-in catalog.
    pub fn builtin() -> &'static Self {
        static CATALOG: OnceLock<ActionCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| {
            Self::load().unwrap_or_else(|err| {
                tracing::error!("Action catalog unavailable: {err:#}");
                Self::default()
            })
        })
    }

    /// All entries in catalog order.
    #[must_use]
    pub fn entries(&self) -> &[ActionEntry] {
        &self.entries
    }

    /// Entries of one category.
    pub fn in_category(&self, category: ActionCategory) -> impl Iterator<Item = &ActionEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Finds an entry by id or alias in any category.
    #[must_use]
    pub fn find(&self, action: &str) -> Option<&ActionEntry> {
        let idx = self.lookup.get(&action.trim().to_lowercase())?;
        self.entries.get(*idx)
    }

    /// Finds an entry by id or alias within a category.
    #[must_use]
    pub fn lookup(&self, category: ActionCategory, action: &str) -> Option<&ActionEntry> {
        let wanted = action.trim();
        self.find(wanted)
            .filter(|entry| entry.category == category)
            .or_else(|| {
                // Same name listed under several categories
                self.in_category(category).find(|entry| {
                    entry.id.eq_ignore_ascii_case(wanted)
                        || entry.aliases.iter().any(|a| a.eq_ignore_ascii_case(wanted))
                })
            })
    }

    /// Category implied by an action name, if it is known.
    #[must_use]
    pub fn category_of(&self, action: &str) -> Option<ActionCategory> {
        if let Some(entry) = self.find(action) {
            return Some(entry.category);
        }
        CustomCommand::parse(action).map(|_| ActionCategory::CustomCommand)
    }

    /// Checks that a binding names something an executor can run.
    pub fn check_binding(&self, binding: &ActionBinding) -> Result<(), String> {
        if binding.is_noop() {
            return Ok(());
        }
        match binding.category {
            ActionCategory::Noop => Ok(()),
            ActionCategory::CustomCommand => CustomCommand::parse(&binding.action)
                .map(|_| ())
                .ok_or_else(|| {
                    format!(
                        "custom command '{}' must start with one of: {}",
                        binding.action,
                        CustomCommand::PREFIXES.join(", ")
                    )
                }),
            category => {
                if self.lookup(category, &binding.action).is_some() {
                    return Ok(());
                }
                match self.find(&binding.action) {
                    Some(entry) => Err(format!(
                        "action '{}' belongs to {}, not {}",
                        binding.action, entry.category, category
                    )),
                    None => Err(format!("unknown {} action '{}'", category, binding.action)),
                }
            }
        }
    }

    /// Warnings for every binding in `config` that cannot be executed.
    #[must_use]
    pub fn validate(&self, config: &MappingConfig) -> Vec<String> {
        config
            .all_bindings()
            .into_iter()
            .filter_map(|(location, binding)| {
                self.check_binding(binding)
                    .err()
                    .map(|problem| format!("{location}: {problem}"))
            })
            .collect()
    }
}

/// A user-defined command in `kind:argument` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomCommand {
    /// `shell:<command line>` runs through `sh -c`
    Shell(String),
    /// `open-app:<name>` launches or focuses an application
    OpenApp(String),
    /// `open-url:<url>` opens a URL in the default handler
    OpenUrl(String),
    /// `type:<text>` types text into the focused field
    Type(String),
    /// `notify:<message>` shows a notification
    Notify(String),
}

impl CustomCommand {
    /// Accepted prefixes.
    pub const PREFIXES: [&'static str; 5] = ["shell:", "open-app:", "open-url:", "type:", "notify:"];

    /// Parses `kind:argument`; the argument must not be blank.
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        let (kind, argument) = action.trim().split_once(':')?;
        let argument = argument.trim();
        if argument.is_empty() {
            return None;
        }
        let argument = argument.to_string();
        match kind.trim().to_lowercase().as_str() {
            "shell" => Some(Self::Shell(argument)),
            "open-app" | "open_app" => Some(Self::OpenApp(argument)),
            "open-url" | "open_url" => Some(Self::OpenUrl(argument)),
            "type" => Some(Self::Type(argument)),
            "notify" => Some(Self::Notify(argument)),
            _ => None,
        }
    }
}

impl fmt::Display for CustomCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(cmd) => write!(f, "shell:{cmd}"),
            Self::OpenApp(app) => write!(f, "open-app:{app}"),
            Self::OpenUrl(url) => write!(f, "open-url:{url}"),
            Self::Type(text) => write!(f, "type:{text}"),
            Self::Notify(message) => write!(f, "notify:{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ActionCatalog::load().unwrap();
        assert!(!catalog.entries().is_empty());
        for category in ActionCategory::EXECUTABLE {
            if category != ActionCategory::CustomCommand {
                assert!(
                    catalog.in_category(category).next().is_some(),
                    "no actions for {category}"
                );
            }
        }
    }

    #[test]
    fn test_lookup_by_alias_is_case_insensitive() {
        let catalog = ActionCatalog::builtin();
        let entry = catalog.find("wisprflow control (up chevron)").unwrap();
        assert_eq!(entry.id, "Dictation Hotkey (Ctrl+Up)");
        assert_eq!(
            catalog.category_of("Backspace"),
            Some(ActionCategory::KeyboardShortcut)
        );
    }

    #[test]
    fn test_category_of_custom_command() {
        let catalog = ActionCatalog::builtin();
        assert_eq!(
            catalog.category_of("shell: say hello"),
            Some(ActionCategory::CustomCommand)
        );
        assert_eq!(catalog.category_of("Teleport"), None);
    }

    #[test]
    fn test_check_binding() {
        let catalog = ActionCatalog::builtin();
        assert!(catalog
            .check_binding(&ActionBinding::new(ActionCategory::SystemControl, "Lock Screen"))
            .is_ok());
        assert!(catalog
            .check_binding(&ActionBinding::new(ActionCategory::SystemControl, "Escape"))
            .unwrap_err()
            .contains("belongs to keyboard_shortcut"));
        assert!(catalog
            .check_binding(&ActionBinding::new(ActionCategory::CustomCommand, "run stuff"))
            .is_err());
        assert!(catalog.check_binding(&ActionBinding::noop()).is_ok());
    }

    #[test]
    fn test_default_config_is_valid() {
        let warnings = ActionCatalog::builtin().validate(&MappingConfig::default());
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn test_validate_reports_location() {
        let mut config = MappingConfig::default();
        config.gestures.insert(
            "triple_tap".to_string(),
            ActionBinding::new(ActionCategory::KeyboardShortcut, "Cmd+Q (Quit Everything)"),
        );
        let warnings = ActionCatalog::builtin().validate(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("gestures.triple_tap"));
    }

    #[test]
    fn test_custom_command_parse() {
        assert_eq!(
            CustomCommand::parse("open-app: Safari"),
            Some(CustomCommand::OpenApp("Safari".to_string()))
        );
        assert_eq!(
            CustomCommand::parse("shell:echo a:b"),
            Some(CustomCommand::Shell("echo a:b".to_string()))
        );
        assert_eq!(CustomCommand::parse("notify:"), None);
        assert_eq!(CustomCommand::parse("Lock Screen"), None);
        assert_eq!(
            CustomCommand::Type("hi".to_string()).to_string(),
            "type:hi"
        );
    }
}
