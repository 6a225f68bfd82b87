//! Foreground application lookup.
//!
//! A failed lookup means "no application", which disables per-application
//! overrides for that dispatch.

use crate::dispatch::script::ScriptRunner;

/// Script asking for the name of the frontmost process.
pub const FRONTMOST_APP_SCRIPT: &str =
    "tell application \"System Events\" to get name of first application process whose frontmost is true";

/// Reports the current foreground application.
pub trait ActiveAppLookup: Send + Sync {
    /// Name of the foreground application, if known.
    fn active_app(&self) -> Option<String>;
}

/// Asks the host through the script runner.
#[derive(Debug, Clone, Default)]
pub struct ScriptAppLookup {
    runner: ScriptRunner,
}

impl ScriptAppLookup {
    /// Creates a lookup that runs [`FRONTMOST_APP_SCRIPT`] through `runner`.
    #[must_use]
    pub const fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

impl ActiveAppLookup for ScriptAppLookup {
    fn active_app(&self) -> Option<String> {
        match self.runner.run(FRONTMOST_APP_SCRIPT) {
            Ok(name) if !name.is_empty() => Some(name),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!("Active application lookup failed: {err}");
                None
            }
        }
    }
}

/// Always reports the same application.
#[derive(Debug, Clone, Default)]
pub struct FixedAppLookup(pub Option<String>);

impl FixedAppLookup {
    /// Lookup that always returns `app`.
    pub fn new(app: impl Into<String>) -> Self {
        Self(Some(app.into()))
    }
}

impl ActiveAppLookup for FixedAppLookup {
    fn active_app(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Never reports an application.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAppLookup;

impl ActiveAppLookup for NoAppLookup {
    fn active_app(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_script_lookup_trims_output() {
        // `sh -c 'echo Termius' <script>`: the script text becomes $0
        let lookup = ScriptAppLookup::new(ScriptRunner::new("sh", ["-c", "echo ' Termius '"]));
        assert_eq!(lookup.active_app().as_deref(), Some("Termius"));
    }

    #[test]
    fn test_failed_lookup_is_none() {
        let lookup = ScriptAppLookup::new(ScriptRunner::new(
            "buttonflow-no-such-interpreter",
            Vec::<String>::new(),
        ));
        assert_eq!(lookup.active_app(), None);
    }

    #[test]
    fn test_fixed_and_none() {
        assert_eq!(FixedAppLookup::new("Safari").active_app().as_deref(), Some("Safari"));
        assert_eq!(NoAppLookup.active_app(), None);
    }
}
