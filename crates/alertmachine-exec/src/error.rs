//! Executor error types.

use std::time::Duration;

use thiserror::Error;

/// Why a host produced no output.
///
/// Cloned into every host's outcome when a dispatch fails as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("transport error on {host}: {reason}")]
    Transport { host: String, reason: String },

    #[error("remote execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("dispatch failed: {0}")]
    Dispatch(String),
}
