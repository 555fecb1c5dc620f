//! Per-task options and their resolution against the shared defaults.

use std::sync::Arc;
use std::time::Duration;

use alertmachine_core::Defaults;
use alertmachine_notify::Notifier;

/// Steady-state interval when nothing else is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Failures tolerated before alerting when nothing else is configured.
pub const DEFAULT_RETRIES: u32 = 1;

/// Delay before the very first firing, capped by the task's interval.
pub const BOOTSTRAP_INTERVAL: Duration = Duration::from_secs(1);

/// The error interval defaults to the steady-state interval over this.
const ERROR_INTERVAL_DIVISOR: u32 = 5;

/// Explicit per-task settings. Anything left `None` falls through to the
/// shared defaults, then to the hard defaults.
#[derive(Clone, Default)]
pub struct TaskOptions {
    /// Passed to the check body through its context.
    pub args: Vec<String>,
    pub interval: Option<Duration>,
    pub interval_error: Option<Duration>,
    pub retries: Option<u32>,
    pub dont_check_long_processes: Option<bool>,
    pub from: Option<String>,
    pub to: Option<Vec<String>>,
    /// Overrides the scheduler's notifier for this task.
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// Settings in effect for one firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub interval: Duration,
    pub interval_error: Duration,
    pub retries: u32,
    pub dont_check_long_processes: bool,
    pub from: Option<String>,
    pub to: Vec<String>,
}

impl ResolvedSettings {
    /// A clean run at least this long is reported as a failure. Always
    /// relative to the steady-state interval, even while polling on the
    /// error interval.
    pub fn long_run_limit(&self) -> Duration {
        self.interval / ERROR_INTERVAL_DIVISOR
    }
}

/// Apply precedence: per-task option, then shared default, then hard
/// default. Zero or invalid durations count as unset.
pub fn resolve(options: &TaskOptions, shared: &Defaults) -> ResolvedSettings {
    let interval = options
        .interval
        .filter(|d| !d.is_zero())
        .or_else(|| secs(shared.interval))
        .unwrap_or(DEFAULT_INTERVAL);

    let interval_error = options
        .interval_error
        .filter(|d| !d.is_zero())
        .or_else(|| secs(shared.interval_error))
        .unwrap_or(interval / ERROR_INTERVAL_DIVISOR);

    ResolvedSettings {
        interval,
        interval_error,
        retries: options.retries.or(shared.retries).unwrap_or(DEFAULT_RETRIES),
        dont_check_long_processes: options
            .dont_check_long_processes
            .or(shared.dont_check_long_processes)
            .unwrap_or(false),
        from: options.from.clone().or_else(|| shared.from.clone()),
        to: options.to.clone().or_else(|| shared.to.clone()).unwrap_or_default(),
    }
}

fn secs(value: Option<f64>) -> Option<Duration> {
    value
        .and_then(|v| Duration::try_from_secs_f64(v).ok())
        .filter(|d| !d.is_zero())
}
