//! User feedback after a successful action.
//!
//! Feedback is best-effort: failures are logged at debug level and dropped.

use crate::constants::APP_NAME;
use crate::dispatch::executor::notification_script;
use crate::dispatch::script::ScriptRunner;

/// Shows a short message to the user.
pub trait Feedback: Send + Sync {
    /// Shows `message`; never fails.
    fn notify(&self, message: &str);
}

/// Host notification through the script runner.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeedback {
    runner: ScriptRunner,
}

impl NotificationFeedback {
    /// Creates feedback that uses `runner` to post notifications.
    #[must_use]
    pub const fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

impl Feedback for NotificationFeedback {
    fn notify(&self, message: &str) {
        if let Err(err) = self.runner.run(&notification_script(APP_NAME, message)) {
            tracing::debug!("Notification failed: {err}");
        }
    }
}

/// Feedback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl Feedback for NoFeedback {
    fn notify(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_failure_is_swallowed() {
        let feedback = NotificationFeedback::new(ScriptRunner::new(
            "buttonflow-no-such-notifier",
            Vec::<String>::new(),
        ));
        feedback.notify("hello");
    }
}
