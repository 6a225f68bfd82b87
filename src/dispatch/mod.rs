//! Action dispatch.
//!
//! [`Dispatcher`] resolves a gesture to a binding through the mapping store,
//! runs it through an [`ActionExecutor`] and reports a [`DispatchResult`].
//! Executor failures become failed results; they never propagate.
//! [`DispatchQueue`] runs dispatches off the event loop on bounded worker lanes.

pub mod app_context;
pub mod catalog;
pub mod executor;
pub mod feedback;
pub mod queue;
pub mod script;

pub use app_context::{ActiveAppLookup, FixedAppLookup, NoAppLookup, ScriptAppLookup};
pub use catalog::{ActionCatalog, CustomCommand};
pub use executor::{ActionExecutor, DryRunExecutor, ExecutorError, ScriptExecutor};
pub use feedback::{Feedback, NoFeedback, NotificationFeedback};
pub use queue::DispatchQueue;
pub use script::ScriptRunner;

use crate::config::MappingStore;
use crate::models::{ActionBinding, ButtonId, GestureEvent, GestureKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How a dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The executor ran the action
    Executed,
    /// The resolved binding was the no-op binding
    Skipped,
    /// The executor reported an error
    Failed(String),
}

impl DispatchOutcome {
    /// Returns true for failed dispatches.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed => write!(f, "executed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

/// Record of one dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    /// Correlation id for logs
    pub id: Uuid,
    /// Button the gesture came from
    pub button_id: ButtonId,
    /// Configuration role the button resolved to
    pub role: String,
    /// Gesture that was dispatched
    pub gesture: GestureKind,
    /// Binding that was resolved
    pub binding: ActionBinding,
    /// Foreground application used for resolution
    pub active_app: Option<String>,
    /// Outcome
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
    /// When the dispatch finished
    pub dispatched_at: DateTime<Utc>,
    /// Time spent in the executor
    #[serde(skip)]
    pub elapsed: Duration,
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} ({})",
            self.role, self.gesture, self.binding, self.outcome
        )
    }
}

/// Resolves gestures and runs the bound actions.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<MappingStore>,
    executor: Arc<dyn ActionExecutor>,
    feedback: Arc<dyn Feedback>,
    app_lookup: Arc<dyn ActiveAppLookup>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher without an application lookup.
    pub fn new(
        store: Arc<MappingStore>,
        executor: Arc<dyn ActionExecutor>,
        feedback: Arc<dyn Feedback>,
    ) -> Self {
        Self {
            store,
            executor,
            feedback,
            app_lookup: Arc::new(NoAppLookup),
        }
    }

    /// Uses `lookup` to find the foreground application in [`dispatch_current`](Self::dispatch_current).
    #[must_use]
    pub fn with_app_lookup(mut self, lookup: Arc<dyn ActiveAppLookup>) -> Self {
        self.app_lookup = lookup;
        self
    }

    /// The mapping store this dispatcher reads.
    #[must_use]
    pub fn store(&self) -> &Arc<MappingStore> {
        &self.store
    }

    /// Dispatches against whatever application is in the foreground now.
    pub fn dispatch_current(&self, event: &GestureEvent) -> DispatchResult {
        let active_app = self.app_lookup.active_app();
        self.dispatch(event, active_app.as_deref())
    }

    /// Resolves and runs the binding for `event`.
    pub fn dispatch(&self, event: &GestureEvent, active_app: Option<&str>) -> DispatchResult {
        let id = Uuid::new_v4();
        let config = self.store.snapshot();
        let role = config.role_for(&event.button_id);
        let binding = config.resolve(&role, event.kind, active_app);

        let started = Instant::now();
        let outcome = if binding.is_noop() {
            tracing::debug!("[{id}] {event}: nothing bound for {role}");
            DispatchOutcome::Skipped
        } else {
            match self.executor.execute(binding.category, &binding.action) {
                Ok(()) => {
                    tracing::info!("[{id}] {role} {} -> {}", event.kind, binding.action);
                    if config.settings.feedback_enabled {
                        self.feedback.notify(&binding.action);
                    }
                    DispatchOutcome::Executed
                }
                Err(err) => {
                    tracing::warn!("[{id}] {role} {} -> {} failed: {err}", event.kind, binding.action);
                    DispatchOutcome::Failed(err.to_string())
                }
            }
        };

        DispatchResult {
            id,
            button_id: event.button_id.clone(),
            role,
            gesture: event.kind,
            binding,
            active_app: active_app.map(str::to_string),
            outcome,
            dispatched_at: Utc::now(),
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording collaborators shared by dispatch and session tests.

    use super::*;
    use crate::models::ActionCategory;
    use std::sync::Mutex;

    /// Records every call; fails for actions listed in `failing`.
    #[derive(Debug, Default)]
    pub struct RecordingExecutor {
        pub calls: Mutex<Vec<(ActionCategory, String)>>,
        pub failing: Vec<String>,
    }

    impl RecordingExecutor {
        pub fn failing_on(actions: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing: actions.iter().map(ToString::to_string).collect(),
            }
        }

        pub fn actions(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, action)| action.clone())
                .collect()
        }
    }

    impl ActionExecutor for RecordingExecutor {
        fn execute(&self, category: ActionCategory, action: &str) -> Result<(), ExecutorError> {
            self.calls
                .lock()
                .unwrap()
                .push((category, action.to_string()));
            if self.failing.iter().any(|a| a == action) {
                return Err(ExecutorError::UnknownAction {
                    category,
                    action: action.to_string(),
                });
            }
            Ok(())
        }
    }

    /// Records every message.
    #[derive(Debug, Default)]
    pub struct RecordingFeedback {
        pub messages: Mutex<Vec<String>>,
    }

    impl Feedback for RecordingFeedback {
        fn notify(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }
}
