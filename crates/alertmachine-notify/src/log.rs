//! Notifier that only logs.

use tracing::{info, warn};

use crate::{BoxFuture, Notification, Notifier, NotifyError};

/// Emits each notification as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            warn!(
                subject = %notification.subject,
                to = %notification.to.join(", "),
                body = %notification.body,
                "alert firing"
            );
            Ok(())
        })
    }

    fn notify_recovery<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            info!(
                subject = %notification.subject,
                to = %notification.to.join(", "),
                "alert cleared"
            );
            Ok(())
        })
    }
}
