//! Delivery through a local sendmail-compatible binary.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::{BoxFuture, Notification, Notifier, NotifyError};

/// Longest a single sendmail invocation may take before it is killed.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Pipes each notification to `sendmail -t -i`, which reads recipients
/// from the headers.
#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    program: PathBuf,
    timeout: Duration,
}

impl SendmailNotifier {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DELIVERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.to.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let program = self.program.display().to_string();
        let child = Command::new(&self.program)
            .args(["-t", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| NotifyError::Spawn {
                program: program.clone(),
                source,
            })?;

        let message = render(notification, Utc::now());
        // On timeout the child is dropped, which kills it.
        let output = tokio::time::timeout(self.timeout, pipe(child, message))
            .await
            .map_err(|_| NotifyError::Transport(format!("{program} timed out after {:?}", self.timeout)))??;
        if !output.status.success() {
            return Err(NotifyError::Transport(format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!(%program, to = %notification.to.join(", "), "mail handed to sendmail");
        Ok(())
    }
}

impl Notifier for SendmailNotifier {
    fn notify_failure<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            self.deliver(notification).await?;
            info!(subject = %notification.subject, "failure mail sent");
            Ok(())
        })
    }

    fn notify_recovery<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            self.deliver(notification).await?;
            info!(subject = %notification.subject, "recovery mail sent");
            Ok(())
        })
    }
}

async fn pipe(mut child: Child, message: String) -> Result<Output, NotifyError> {
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        // Dropping stdin closes the pipe so sendmail sees EOF.
    }
    child
        .wait_with_output()
        .await
        .map_err(|e| NotifyError::Transport(e.to_string()))
}

/// Format an RFC 5322 message with CRLF line endings.
fn render(notification: &Notification, date: DateTime<Utc>) -> String {
    let mut headers = Vec::new();
    if let Some(from) = &notification.from {
        headers.push(format!("From: {from}"));
    }
    headers.push(format!("To: {}", notification.to.join(", ")));
    headers.push(format!("Subject: {}", single_line(&notification.subject)));
    headers.push(format!("Date: {}", date.to_rfc2822()));
    headers.push("Content-Type: text/plain; charset=utf-8".to_string());

    let body = notification.body.replace("\r\n", "\n").replace('\n', "\r\n");
    format!("{}\r\n\r\n{}\r\n", headers.join("\r\n"), body)
}

/// Header values must not contain line breaks.
fn single_line(s: &str) -> String {
    s.split(['\r', '\n']).filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ")
}
