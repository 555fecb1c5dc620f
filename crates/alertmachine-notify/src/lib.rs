//! alertmachine-notify: delivering alert transitions.
//!
//! The scheduler hands a [`Notification`] to a [`Notifier`] whenever a
//! task's alert starts firing or clears. [`LogNotifier`] records it through
//! `tracing`; [`SendmailNotifier`] pipes it to a local MTA.

pub mod log;
pub mod message;
pub mod sendmail;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use crate::log::LogNotifier;
pub use message::Notification;
pub use sendmail::{DELIVERY_TIMEOUT, SendmailNotifier};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification has no recipients")]
    NoRecipients,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// Receives alert transitions.
pub trait Notifier: Send + Sync {
    /// The alert started firing.
    fn notify_failure<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>>;

    /// The alert cleared.
    fn notify_recovery<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>>;
}
