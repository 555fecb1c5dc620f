//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,alertmachine=debug";

/// Install the global fmt subscriber.
///
/// In test mode every event is filtered out; nothing else about the
/// process changes. Calling this twice is harmless.
pub fn init_tracing(test_mode: bool) {
    let filter = if test_mode {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
