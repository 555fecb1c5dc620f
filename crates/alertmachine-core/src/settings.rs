//! Shared defaults that every task falls back to.
//!
//! The `[defaults]` table of the config file is published through a
//! `watch` channel so the daemon can swap it on reload while tasks keep
//! reading the latest values at each firing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Shared, operator-adjustable task settings. Unset fields fall through to
/// the hard defaults in the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    /// Steady-state interval in seconds.
    pub interval: Option<f64>,
    /// Error-polling interval in seconds.
    pub interval_error: Option<f64>,
    /// Failures tolerated before the alert fires.
    pub retries: Option<u32>,
    pub dont_check_long_processes: Option<bool>,
    /// Sender address for notifications.
    pub from: Option<String>,
    /// Recipients for notifications.
    pub to: Option<Vec<String>>,
}

/// Handle to the live shared defaults.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    tx: Arc<watch::Sender<Defaults>>,
}

impl SharedSettings {
    pub fn new(defaults: Defaults) -> Self {
        let (tx, _rx) = watch::channel(defaults);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current defaults.
    pub fn current(&self) -> Defaults {
        self.tx.borrow().clone()
    }

    /// Replace the defaults. Takes effect at each task's next firing.
    pub fn replace(&self, defaults: Defaults) {
        self.tx.send_replace(defaults);
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(Defaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_is_visible_to_clones() {
        let shared = SharedSettings::default();
        let reader = shared.clone();
        assert_eq!(reader.current().interval, None);

        shared.replace(Defaults {
            interval: Some(30.0),
            ..Defaults::default()
        });
        assert_eq!(reader.current().interval, Some(30.0));
    }
}
