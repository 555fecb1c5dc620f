//! Notification content.

use alertmachine_core::CheckFailure;

const FAILURE_SEPARATOR: &str = "\n=============\n";

/// A rendered alert or recovery message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub from: Option<String>,
    pub to: Vec<String>,
}

impl Notification {
    /// Alert for a task whose failure log is `failures`, oldest first.
    /// The subject is keyed on the newest failure.
    pub fn failure(failures: &[CheckFailure], from: Option<String>, to: Vec<String>) -> Self {
        let key = failures.last().map(CheckFailure::key).unwrap_or("unknown failure");
        Self {
            subject: format!("AlertMachine Failed: {key}"),
            body: failures
                .iter()
                .map(CheckFailure::log)
                .collect::<Vec<_>>()
                .join(FAILURE_SEPARATOR),
            from,
            to,
        }
    }

    /// Recovery for an alert previously keyed on `key`; the body names the
    /// task's registration site.
    pub fn recovery(key: &str, call_site: &str, from: Option<String>, to: Vec<String>) -> Self {
        Self {
            subject: format!("AlertMachine Passed: {key}"),
            body: call_site.to_string(),
            from,
            to,
        }
    }
}
