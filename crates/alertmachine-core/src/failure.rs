//! The structured failure record produced by a failed check run.

use std::fmt;
use std::panic::Location;

use chrono::{DateTime, Utc};

use crate::host::hostname;

/// One captured check failure.
///
/// Created when a check body reports a failed condition or returns an
/// unexpected error. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure {
    message: Option<String>,
    /// `file:line:column` of the code that raised the failure.
    call_site: String,
    at: DateTime<Utc>,
}

impl CheckFailure {
    /// Build a failure whose call-site is the caller of this function.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self::at_site(Some(message.into()), Location::caller().to_string())
    }

    /// Build a failure attributed to an explicit call-site.
    pub fn at_site(message: Option<String>, call_site: impl Into<String>) -> Self {
        Self {
            message,
            call_site: call_site.into(),
            at: Utc::now(),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn call_site(&self) -> &str {
        &self.call_site
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }

    /// Short identifier used in notification subjects: the message, or the
    /// call-site when there is none.
    pub fn key(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.call_site)
    }

    /// Multi-line report used in logs and notification bodies.
    pub fn log(&self) -> String {
        let mut out = format!("[{}] ", self.at.format("%Y-%m-%d %H:%M:%S %z"));
        if let Some(msg) = &self.message {
            out.push_str(msg);
            out.push('\n');
        }
        out.push_str(&self.call_site);
        out.push('\n');
        out.push_str(&format!("Sent from {}:{}", hostname(), std::process::id()));
        out
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key(), self.call_site)
    }
}

impl std::error::Error for CheckFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_captures_caller_location() {
        let failure = CheckFailure::new("port 80 down");
        assert_eq!(failure.message(), Some("port 80 down"));
        assert!(failure.call_site().contains("failure.rs"), "{}", failure.call_site());
    }

    #[test]
    fn key_falls_back_to_call_site() {
        let failure = CheckFailure::at_site(None, "checks.rs:12:5");
        assert_eq!(failure.key(), "checks.rs:12:5");

        let failure = CheckFailure::at_site(Some("boom".into()), "checks.rs:12:5");
        assert_eq!(failure.key(), "boom");
    }

    #[test]
    fn log_contains_message_site_and_origin() {
        let failure = CheckFailure::at_site(Some("pidfile invalid".into()), "watch.rs:3:1");
        let log = failure.log();
        assert!(log.starts_with('['));
        assert!(log.contains("pidfile invalid\nwatch.rs:3:1\n"));
        assert!(log.contains(&format!(":{}", std::process::id())));
    }

    #[test]
    fn log_without_message_skips_message_line() {
        let failure = CheckFailure::at_site(None, "watch.rs:3:1");
        let log = failure.log();
        assert!(log.contains("] watch.rs:3:1\nSent from "));
    }

    #[test]
    fn converts_into_anyhow_and_back() {
        let err: anyhow::Error = CheckFailure::new("down").into();
        let back = err.downcast_ref::<CheckFailure>().unwrap();
        assert_eq!(back.message(), Some("down"));
    }
}
