//! Mapping configuration persistence.
//!
//! This module loads, migrates, merges and saves the [`MappingConfig`] in
//! JSON format with platform-specific directory resolution. Loading never
//! fails: a missing or unreadable file yields the built-in defaults.
//!
//! [`MappingStore`] holds the current configuration behind an `Arc` swap so
//! readers always see either the old or the new document, never a mix.

use crate::constants::{CONFIG_DIR_ENV, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use crate::dispatch::ActionCatalog;
use crate::models::{ActionBinding, ActionCategory, GestureKind, MappingConfig};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// Sections merged one level deep over the defaults.
const SECTIONS: [&str; 4] = ["buttons", "gestures", "applications", "settings"];

/// Legacy setting names and their replacements.
const RENAMED_SETTINGS: [(&str, &str); 2] = [
    ("enable_visual_feedback", "feedback_enabled"),
    ("long_press_threshold_ms", "long_press_threshold"),
];

/// Shared, atomically swappable mapping configuration backed by a file.
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    current: RwLock<Arc<MappingConfig>>,
}

impl MappingStore {
    /// Gets the platform-specific config directory path.
    ///
    /// - Linux: `~/.config/ButtonFlow/`
    /// - macOS: `~/Library/Application Support/ButtonFlow/`
    /// - Windows: `%APPDATA%\ButtonFlow\`
    ///
    /// `BUTTONFLOW_CONFIG_DIR` overrides the location.
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|dir| !dir.is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join(CONFIG_DIR_NAME);

        Ok(config_dir)
    }

    /// Gets the full path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Opens the store at the default location.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(Self::config_file_path()?))
    }

    /// Opens the store backed by `path`, loading it immediately.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = Self::load_from(&path);
        Self {
            path,
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Store that is never read from disk (tests, dry runs).
    pub fn in_memory(path: impl Into<PathBuf>, config: MappingConfig) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads a configuration file, falling back to defaults.
    ///
    /// Legacy layouts are migrated and every section is merged over the
    /// defaults before deserializing. Problems are logged, never returned.
    #[must_use]
    pub fn load_from(path: &Path) -> MappingConfig {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return MappingConfig::default();
        }

        match Self::try_load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Using default mapping: {err:#}");
                MappingConfig::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<MappingConfig> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        let config = parse_config(&content)
            .context(format!("Failed to parse config file: {}", path.display()))?;
        config
            .settings
            .validate()
            .context(format!("Invalid settings in config file: {}", path.display()))?;
        Ok(config)
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<MappingConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn replace(&self, config: MappingConfig) -> Arc<MappingConfig> {
        let config = Arc::new(config);
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&config),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&config),
        }
        config
    }

    /// Re-reads the backing file and swaps it in.
    pub fn reload(&self) -> Arc<MappingConfig> {
        let config = Self::load_from(&self.path);
        tracing::info!("Reloaded mapping from {}", self.path.display());
        self.replace(config)
    }

    /// Modification time of the backing file, if it exists.
    #[must_use]
    pub fn file_modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    /// Resolves a binding against the current snapshot.
    #[must_use]
    pub fn resolve(&self, role: &str, gesture: GestureKind, active_app: Option<&str>) -> ActionBinding {
        self.snapshot().resolve(role, gesture, active_app)
    }

    /// Saves configuration using atomic write and makes it current.
    ///
    /// Uses temp file + rename pattern for atomic writes.
    pub fn save(&self, config: &MappingConfig) -> Result<()> {
        config.settings.validate()?;

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .context(format!("Failed to create config directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        let temp_path = self.path.with_extension("json.tmp");

        // Write to temp file
        fs::write(&temp_path, content).context(format!(
            "Failed to write temp config file: {}",
            temp_path.display()
        ))?;

        // Atomic rename
        fs::rename(&temp_path, &self.path).context(format!(
            "Failed to rename temp config file to: {}",
            self.path.display()
        ))?;

        self.replace(config.clone());
        tracing::debug!("Saved mapping to {}", self.path.display());
        Ok(())
    }

    /// Applies `change` to a copy of the current configuration and saves it.
    pub fn update<F>(&self, change: F) -> Result<Arc<MappingConfig>>
    where
        F: FnOnce(&mut MappingConfig) -> Result<()>,
    {
        let mut config = (*self.snapshot()).clone();
        change(&mut config)?;
        self.save(&config)?;
        Ok(self.snapshot())
    }

    /// Overwrites the file with the built-in defaults.
    pub fn reset(&self) -> Result<()> {
        self.save(&MappingConfig::default())
    }

    /// Reads another configuration file (any supported layout) and saves it here.
    pub fn import(&self, source: &Path) -> Result<MappingConfig> {
        let content = fs::read_to_string(source)
            .context(format!("Failed to read {}", source.display()))?;
        let config =
            parse_config(&content).context(format!("Failed to parse {}", source.display()))?;
        self.save(&config)?;
        Ok(config)
    }
}

/// Parses a configuration document, migrating and merging it over the defaults.
pub fn parse_config(content: &str) -> Result<MappingConfig> {
    // Hand-edited files may carry comments or trailing commas
    let mut document: Value = match serde_json::from_str(content) {
        Ok(document) => document,
        Err(_) => json5::from_str(content).context("Invalid JSON")?,
    };
    if !document.is_object() {
        anyhow::bail!("Top-level value must be an object");
    }

    migrate_legacy(&mut document);

    let defaults =
        serde_json::to_value(MappingConfig::default()).context("Failed to serialize defaults")?;
    let mut merged = merge_sections(defaults, document);
    infer_categories(&mut merged, ActionCatalog::builtin());

    serde_json::from_value(merged).context("Invalid mapping configuration")
}

/// Gives bindings written without a category the one their action implies.
///
/// Unknown action names become application controls.
fn infer_categories(document: &mut Value, catalog: &ActionCatalog) {
    let Some(root) = document.as_object_mut() else {
        return;
    };

    let mut bindings: Vec<&mut Value> = Vec::new();
    for (section, value) in root.iter_mut() {
        match (section.as_str(), value) {
            ("buttons" | "applications", Value::Object(groups)) => {
                for group in groups.values_mut().filter_map(Value::as_object_mut) {
                    bindings.extend(group.values_mut());
                }
            }
            ("gestures", Value::Object(gestures)) => bindings.extend(gestures.values_mut()),
            _ => {}
        }
    }

    for binding in bindings {
        let action = match &*binding {
            Value::String(action) => action.clone(),
            Value::Object(fields) if !fields.contains_key("category") => fields
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => continue,
        };
        let category = catalog
            .category_of(&action)
            .unwrap_or(ActionCategory::ApplicationControl);
        let category = Value::String(category.id().to_string());
        match binding {
            Value::Object(fields) => {
                fields.insert("category".to_string(), category);
            }
            other => {
                let mut fields = Map::new();
                fields.insert("category".to_string(), category);
                fields.insert("action".to_string(), Value::String(action));
                *other = Value::Object(fields);
            }
        }
    }
}

/// Rewrites older flat layouts into the current one.
///
/// - `<role>_short` / `<role>_long` become `buttons.<role>.short_press` / `long_press`
/// - a flat `<role>` entry with an `action` becomes `buttons.<role>.short_press`
/// - renamed settings move to their new key unless it is already present
pub fn migrate_legacy(document: &mut Value) {
    let Some(root) = document.as_object_mut() else {
        return;
    };

    let legacy_keys: Vec<String> = root
        .keys()
        .filter(|key| !SECTIONS.contains(&key.as_str()) && key.as_str() != "version")
        .cloned()
        .collect();

    let mut migrated = Map::new();
    for key in legacy_keys {
        let (role, slot) = if let Some(role) = key.strip_suffix("_short") {
            (role.to_string(), "short_press")
        } else if let Some(role) = key.strip_suffix("_long") {
            (role.to_string(), "long_press")
        } else if root.get(&key).is_some_and(|v| v.get("action").is_some()) {
            (key.clone(), "short_press")
        } else {
            continue;
        };

        if let Some(binding) = root.remove(&key) {
            tracing::debug!("Migrating legacy entry '{key}' to buttons.{role}.{slot}");
            if let Some(slots) = migrated
                .entry(role)
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
            {
                slots.insert(slot.to_string(), binding);
            }
        }
    }

    if !migrated.is_empty() {
        let buttons = root
            .entry("buttons")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(buttons) = buttons.as_object_mut() {
            for (role, slots) in migrated {
                let entry = buttons
                    .entry(role)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let (Some(entry), Value::Object(slots)) = (entry.as_object_mut(), slots) {
                    for (slot, binding) in slots {
                        entry.entry(slot).or_insert(binding);
                    }
                }
            }
        }
    }

    if let Some(settings) = root.get_mut("settings").and_then(Value::as_object_mut) {
        for (old, new) in RENAMED_SETTINGS {
            if let Some(value) = settings.remove(old) {
                settings.entry(new).or_insert(value);
            }
        }
    }
}

/// Merges each section of `file` one level deep over `defaults`.
///
/// Within a section, entries present in the file replace the default entry
/// of the same key whole; entries only in the defaults are kept.
fn merge_sections(mut defaults: Value, file: Value) -> Value {
    let (Some(base), Value::Object(file)) = (defaults.as_object_mut(), file) else {
        return defaults;
    };

    for (key, value) in file {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(section)), Value::Object(entries))
                if SECTIONS.contains(&key.as_str()) =>
            {
                for (entry_key, entry) in entries {
                    section.insert(entry_key, entry);
                }
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
    defaults
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = MappingStore::load_from(&temp_dir.path().join("absent.json"));
        assert_eq!(config, MappingConfig::default());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "{ this is not json");
        assert_eq!(MappingStore::load_from(&path), MappingConfig::default());

        let path = write(&temp_dir, "[1, 2, 3]");
        assert_eq!(MappingStore::load_from(&path), MappingConfig::default());
    }

    #[test]
    fn test_invalid_settings_give_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            &temp_dir,
            r#"{"settings": {"report_bits": [{"byte": 0, "bit": 9, "button": "primary"}]}}"#,
        );
        assert_eq!(MappingStore::load_from(&path), MappingConfig::default());

        let path = write(&temp_dir, r#"{"settings": {"poll_interval_ms": 0}}"#);
        assert_eq!(MappingStore::load_from(&path), MappingConfig::default());
    }

    #[test]
    fn test_reload_with_invalid_settings_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, r#"{"settings": {"long_press_threshold": 500}}"#);
        let store = MappingStore::open(&path);
        assert_eq!(store.snapshot().settings.long_press_threshold, 500);

        write(&temp_dir, r#"{"settings": {"long_press_threshold": 0}}"#);
        let reloaded = store.reload();
        assert_eq!(*reloaded, MappingConfig::default());
        assert_eq!(store.snapshot().settings.poll_interval_ms, 20);
    }

    #[test]
    fn test_missing_settings_are_filled_and_entries_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            &temp_dir,
            r#"{
                "buttons": {
                    "bottom": {
                        "short_press": {"category": "keyboard_shortcut", "action": "Cmd+C (Copy)"}
                    }
                },
                "applications": {
                    "Xcode": {"middle": {"category": "keyboard_shortcut", "action": "Cmd+B"}}
                }
            }"#,
        );
        let config = MappingStore::load_from(&path);

        assert_eq!(config.settings, crate::models::Settings::default());
        assert_eq!(config.buttons["bottom"].short_press.action, "Cmd+C (Copy)");
        // Default roles missing from the file are still there
        assert!(config.buttons.contains_key("middle"));
        assert_eq!(config.applications["Xcode"]["middle"].action, "Cmd+B");
        assert!(config.applications.contains_key("Safari"));
    }

    #[test]
    fn test_partial_settings_are_merged() {
        let config = parse_config(r#"{"settings": {"long_press_threshold": 500}}"#).unwrap();
        assert_eq!(config.settings.long_press_threshold, 500);
        assert!(config.settings.feedback_enabled);
        assert_eq!(config.settings.double_tap_threshold, 300);
    }

    #[test]
    fn test_bare_action_names_get_catalog_categories() {
        let config = parse_config(
            r#"{
                "buttons": {"top": {"short_press": "Cmd+C (Copy)", "long_press": {"action": "Start Recording"}}},
                "gestures": {"double_tap": "shell:say hi"},
                "applications": {"Notes": {"top": "Frobnicate"}}
            }"#,
        )
        .unwrap();

        let top = &config.buttons["top"];
        assert_eq!(top.short_press.category, ActionCategory::KeyboardShortcut);
        assert_eq!(top.long_press.category, ActionCategory::DictationControl);
        assert_eq!(config.gestures["double_tap"].category, ActionCategory::CustomCommand);
        assert_eq!(
            config.applications["Notes"]["top"].category,
            ActionCategory::ApplicationControl
        );
    }

    #[test]
    fn test_json5_comments_are_accepted() {
        let config = parse_config(
            r#"{
                // tuned for a stiff switch
                settings: { long_press_threshold: 650, },
            }"#,
        )
        .unwrap();
        assert_eq!(config.settings.long_press_threshold, 650);
    }

    #[test]
    fn test_legacy_layout_is_migrated() {
        let config = parse_config(
            r#"{
                "bottom_short": {"action": "Toggle Recording", "category": "WisprFlow Actions"},
                "bottom_long": {"action": "Cmd+V (Paste)", "category": "Keyboard Shortcuts"},
                "top": {"action": "Stop Recording", "category": "WisprFlow Actions"},
                "applications": {"Termius": {"middle_button": "Termius Next Tab"}},
                "settings": {
                    "enable_visual_feedback": false,
                    "long_press_threshold_ms": 900,
                    "swipe_sensitivity": 30
                }
            }"#,
        )
        .unwrap();

        let bottom = &config.buttons["bottom"];
        assert_eq!(bottom.short_press.action, "Toggle Recording");
        assert_eq!(bottom.short_press.category, ActionCategory::DictationControl);
        assert_eq!(bottom.long_press.category, ActionCategory::KeyboardShortcut);
        assert_eq!(config.buttons["top"].short_press.action, "Stop Recording");
        assert_eq!(
            config.applications["Termius"]["middle_button"].action,
            "Termius Next Tab"
        );
        assert!(!config.settings.feedback_enabled);
        assert_eq!(config.settings.long_press_threshold, 900);
        assert_eq!(config.settings.extra["swipe_sensitivity"], 30);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let store = MappingStore::open(&path);

        let snapshot = store.snapshot();
        store
            .update(|config| {
                config.settings.long_press_threshold = 1000;
                Ok(())
            })
            .unwrap();

        // Readers holding the old snapshot still see the old document
        assert_eq!(snapshot.settings.long_press_threshold, 800);
        assert_eq!(store.snapshot().settings.long_press_threshold, 1000);
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = MappingStore::open(&path);
        assert_eq!(reopened.snapshot().settings.long_press_threshold, 1000);
    }

    #[test]
    fn test_save_rejects_invalid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let store = MappingStore::open(temp_dir.path().join("config.json"));
        let mut config = MappingConfig::default();
        config.settings.poll_interval_ms = 0;
        assert!(store.save(&config).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_reload_picks_up_external_edit() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, r#"{"settings": {"double_tap_enabled": true}}"#);
        let store = MappingStore::open(&path);
        assert!(store.snapshot().settings.double_tap_enabled);

        fs::write(&path, r#"{"settings": {"double_tap_enabled": false}}"#).unwrap();
        assert!(!store.reload().settings.double_tap_enabled);
    }

    #[test]
    fn test_import_and_reset() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("old.json");
        fs::write(&source, r#"{"middle_short": "Scroll Down"}"#).unwrap();

        let store = MappingStore::open(temp_dir.path().join("config.json"));
        let imported = store.import(&source).unwrap();
        assert_eq!(imported.buttons["middle"].short_press.action, "Scroll Down");
        assert!(store.path().exists());

        store.reset().unwrap();
        assert_eq!(*store.snapshot(), MappingConfig::default());
    }
}
