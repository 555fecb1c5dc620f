//! One registered recurring check and what happens on each firing.

use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use alertmachine_core::{CheckFailure, SharedSettings};
use alertmachine_notify::{Notification, Notifier};

use crate::error::{SchedulerError, SchedulerResult};
use crate::settings::{ResolvedSettings, TaskOptions, resolve};
use crate::tracker::{AlertNotice, AlertTracker, Polling};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A check body. Returning `Err` marks the run as failed; a
/// [`CheckFailure`] is kept as-is, any other error is wrapped in one.
pub type CheckBody = Arc<dyn Fn(TaskContext) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Box an async closure as a [`CheckBody`].
pub fn check_body<F, Fut>(f: F) -> CheckBody
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx: TaskContext| -> BoxFuture<anyhow::Result<()>> { Box::pin(f(ctx)) })
}

/// What a check body knows about the task running it.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub name: String,
    pub args: Vec<String>,
    /// Where the task was registered.
    pub call_site: String,
    /// Failures since the last clean run, not counting this one.
    pub consecutive_failures: u32,
    pub firing: bool,
}

impl TaskContext {
    /// Fail the run unless `condition` holds. The failure points at the
    /// caller of this method.
    #[track_caller]
    pub fn check(&self, condition: bool, message: impl Into<String>) -> Result<(), CheckFailure> {
        if condition {
            Ok(())
        } else {
            Err(CheckFailure::at_site(Some(message.into()), Location::caller().to_string()))
        }
    }
}

/// Published after every firing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStatus {
    pub runs: u64,
    pub consecutive_failures: u32,
    pub failure_log_len: usize,
    pub firing: bool,
    /// Delay until the next firing.
    pub next_interval: Duration,
    pub last_failure: Option<String>,
    pub notifications_sent: u64,
}

pub(crate) struct Task {
    pub(crate) name: String,
    options: TaskOptions,
    shared: SharedSettings,
    body: CheckBody,
    pub(crate) call_site: String,
    tracker: AlertTracker,
    notifier: Arc<dyn Notifier>,
    runs: u64,
    notifications_sent: u64,
}

impl Task {
    pub(crate) fn new(
        name: String,
        options: TaskOptions,
        shared: SharedSettings,
        body: CheckBody,
        call_site: String,
        default_notifier: Arc<dyn Notifier>,
    ) -> Self {
        let notifier = options.notifier.clone().unwrap_or(default_notifier);
        Self {
            name,
            options,
            shared,
            body,
            call_site,
            tracker: AlertTracker::new(),
            notifier,
            runs: 0,
            notifications_sent: 0,
        }
    }

    pub(crate) fn settings(&self) -> ResolvedSettings {
        resolve(&self.options, &self.shared.current())
    }

    /// Run the body once, fold the result into the alert state, and return
    /// the delay before the next firing.
    pub(crate) async fn fire(&mut self) -> SchedulerResult<Duration> {
        let settings = self.settings();
        let ctx = TaskContext {
            name: self.name.clone(),
            args: self.options.args.clone(),
            call_site: self.call_site.clone(),
            consecutive_failures: self.tracker.consecutive_failures(),
            firing: self.tracker.is_firing(),
        };

        debug!(task = %self.name, "task firing");
        let start = Instant::now();
        let result = self.run_body(ctx).await?;
        let elapsed = start.elapsed();
        self.runs += 1;

        let result = result.and_then(|()| self.check_duration(&settings, elapsed));
        let now = Instant::now().into_std();
        let outcome = match result {
            Ok(()) => {
                debug!(task = %self.name, elapsed_ms = elapsed.as_millis() as u64, "task passed");
                self.tracker.record_success(now)
            }
            Err(failure) => {
                warn!(task = %self.name, failure = %failure.log(), "task failed");
                self.tracker.record_failure(failure, settings.retries, now)
            }
        };

        if let Some(notice) = outcome.notice {
            self.notify(notice, &settings).await;
        }

        Ok(match outcome.polling {
            Polling::Steady => settings.interval,
            Polling::Error => settings.interval_error,
        })
    }

    /// Run the body on its own tokio task so a panic becomes a failure.
    async fn run_body(&self, ctx: TaskContext) -> SchedulerResult<Result<(), CheckFailure>> {
        match tokio::spawn((self.body)(ctx)).await {
            Ok(Ok(())) => Ok(Ok(())),
            Ok(Err(e)) => Ok(Err(self.wrap_error(e))),
            Err(join) if join.is_panic() => {
                let payload = join.into_panic();
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(task = %self.name, panic = %msg, "task body panicked");
                Ok(Err(CheckFailure::at_site(Some(format!("Task panicked: {msg}")), &self.call_site)))
            }
            Err(join) => Err(SchedulerError::BodyCancelled {
                task: self.name.clone(),
                reason: join.to_string(),
            }),
        }
    }

    fn wrap_error(&self, error: anyhow::Error) -> CheckFailure {
        match error.downcast::<CheckFailure>() {
            Ok(failure) => failure,
            Err(other) => {
                warn!(task = %self.name, error = %format!("{other:#}"), "task error");
                CheckFailure::at_site(Some(format!("{other:#}")), &self.call_site)
            }
        }
    }

    fn check_duration(&self, settings: &ResolvedSettings, elapsed: Duration) -> Result<(), CheckFailure> {
        if settings.dont_check_long_processes || elapsed < settings.long_run_limit() {
            return Ok(());
        }
        Err(CheckFailure::at_site(
            Some(format!(
                "Task ran for too long. Invoked every {}s. Ran for {}s.",
                settings.interval.as_secs_f64(),
                elapsed.as_secs_f64()
            )),
            &self.call_site,
        ))
    }

    async fn notify(&mut self, notice: AlertNotice, settings: &ResolvedSettings) {
        self.notifications_sent += 1;
        let result = match notice {
            AlertNotice::Failure => {
                let notification = Notification::failure(
                    &self.tracker.failures(),
                    settings.from.clone(),
                    settings.to.clone(),
                );
                info!(task = %self.name, subject = %notification.subject, "sending failure notification");
                self.notifier.notify_failure(&notification).await
            }
            AlertNotice::Recovery => {
                let key = self.tracker.alert_key().unwrap_or(&self.call_site);
                let notification =
                    Notification::recovery(key, &self.call_site, settings.from.clone(), settings.to.clone());
                info!(task = %self.name, subject = %notification.subject, "sending recovery notification");
                self.notifier.notify_recovery(&notification).await
            }
        };

        if let Err(e) = result {
            warn!(task = %self.name, error = %e, "notification delivery failed");
        }
    }

    pub(crate) fn status(&self, next_interval: Duration) -> TaskStatus {
        TaskStatus {
            runs: self.runs,
            consecutive_failures: self.tracker.consecutive_failures(),
            failure_log_len: self.tracker.failures().len(),
            firing: self.tracker.is_firing(),
            next_interval,
            last_failure: self.tracker.last_failure().map(|f| f.key().to_string()),
            notifications_sent: self.notifications_sent,
        }
    }
}
