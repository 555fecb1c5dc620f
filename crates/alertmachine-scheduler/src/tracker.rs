//! Alert state for a single task.
//!
//! Tracks the failure log since the last clean run, whether the alert is
//! firing, and when the last notification went out. Pure state: callers
//! pass the current instant and act on the returned outcome.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use alertmachine_core::CheckFailure;

/// While an alert stays firing, repeat notifications are at least this far
/// apart.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Oldest failures beyond this are dropped from the log. The consecutive
/// failure count is kept separately and is not capped.
pub const FAILURE_LOG_CAPACITY: usize = 64;

/// Which interval the task should sleep for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polling {
    Steady,
    Error,
}

/// A notification the caller must send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertNotice {
    /// The alert is firing; send the failure log.
    Failure,
    /// The alert cleared.
    Recovery,
}

/// Result of recording one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerOutcome {
    pub polling: Polling,
    pub notice: Option<AlertNotice>,
}

#[derive(Debug, Default)]
pub struct AlertTracker {
    /// Failures since the last clean run, oldest first.
    failures: VecDeque<CheckFailure>,
    consecutive_failures: u32,
    firing: bool,
    last_notified: Option<Instant>,
    /// Key of the failure the last alert was sent for; reused in the
    /// recovery subject.
    alert_key: Option<String>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A run completed without error.
    pub fn record_success(&mut self, now: Instant) -> TrackerOutcome {
        if self.consecutive_failures > 0 {
            info!(failures = self.consecutive_failures, "task recovered");
        }
        self.failures.clear();
        self.consecutive_failures = 0;

        TrackerOutcome {
            polling: Polling::Steady,
            notice: self.set_firing(false, now),
        }
    }

    /// A run failed. The alert fires once consecutive failures exceed
    /// `retries`.
    pub fn record_failure(&mut self, failure: CheckFailure, retries: u32, now: Instant) -> TrackerOutcome {
        if self.failures.len() == FAILURE_LOG_CAPACITY {
            self.failures.pop_front();
        }
        self.failures.push_back(failure);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let notice = if self.consecutive_failures > retries {
            self.set_firing(true, now)
        } else {
            debug!(failures = self.consecutive_failures, retries, "failure below retry threshold");
            None
        };

        TrackerOutcome {
            polling: Polling::Error,
            notice,
        }
    }

    /// The only place the firing flag changes.
    fn set_firing(&mut self, firing: bool, now: Instant) -> Option<AlertNotice> {
        if firing == self.firing {
            // Still firing: remind once the debounce window has passed.
            if firing && self.debounce_elapsed(now) {
                self.last_notified = Some(now);
                self.alert_key = self.last_key();
                warn!(failures = self.consecutive_failures, "alert still firing, repeating notification");
                return Some(AlertNotice::Failure);
            }
            return None;
        }

        self.firing = firing;
        self.last_notified = Some(now);
        if firing {
            self.alert_key = self.last_key();
            warn!(failures = self.consecutive_failures, "alert firing");
            Some(AlertNotice::Failure)
        } else {
            info!("alert cleared");
            Some(AlertNotice::Recovery)
        }
    }

    fn debounce_elapsed(&self, now: Instant) -> bool {
        self.last_notified
            .is_none_or(|at| now.saturating_duration_since(at) >= DEBOUNCE_WINDOW)
    }

    fn last_key(&self) -> Option<String> {
        self.failures.back().map(|f| f.key().to_string())
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Failures since the last clean run, oldest first.
    pub fn failures(&self) -> Vec<CheckFailure> {
        self.failures.iter().cloned().collect()
    }

    pub fn last_failure(&self) -> Option<&CheckFailure> {
        self.failures.back()
    }

    pub fn alert_key(&self) -> Option<&str> {
        self.alert_key.as_deref()
    }

    pub fn last_notified(&self) -> Option<Instant> {
        self.last_notified
    }
}
