//! Scheduler: owns the per-task background loops.
//!
//! Each scheduled task gets one tokio task that sleeps, fires, and sleeps
//! again. A firing never overlaps the previous one because the next sleep
//! only starts once the body has returned.

use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use alertmachine_core::SharedSettings;
use alertmachine_notify::{LogNotifier, Notifier};

use crate::error::{SchedulerError, SchedulerResult};
use crate::settings::{BOOTSTRAP_INTERVAL, TaskOptions};
use crate::task::{Task, TaskContext, TaskStatus, check_body};

/// Per-task loop state.
struct TaskSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

type Registry = Arc<RwLock<HashMap<String, TaskSlot>>>;

/// Registers tasks and runs their loops.
#[derive(Clone)]
pub struct Scheduler {
    shared: SharedSettings,
    notifier: Arc<dyn Notifier>,
    tasks: Registry,
}

impl Scheduler {
    /// Scheduler with the given shared defaults, logging notifications.
    pub fn new(shared: SharedSettings) -> Self {
        Self {
            shared,
            notifier: Arc::new(LogNotifier),
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Notifier used by tasks that do not set their own.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn shared_settings(&self) -> &SharedSettings {
        &self.shared
    }

    /// Register a task. Nothing runs until [`TaskHandle::schedule`] is
    /// called. The caller's location becomes the task's call site.
    #[track_caller]
    pub fn register<F, Fut>(&self, name: impl Into<String>, options: TaskOptions, body: F) -> TaskHandle
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let call_site = Location::caller().to_string();
        let name = name.into();
        let task = Task::new(
            name.clone(),
            options,
            self.shared.clone(),
            check_body(body),
            call_site,
            self.notifier.clone(),
        );
        let (status_tx, status_rx) = watch::channel(TaskStatus::default());

        debug!(task = %name, "task registered");
        TaskHandle {
            name,
            task: Some(task),
            status_tx,
            status_rx,
            registry: self.tasks.clone(),
        }
    }

    /// Signal every loop to stop. A body that is mid-run finishes first.
    pub async fn stop_all(&self) {
        let slots: Vec<(String, TaskSlot)> = self.tasks.write().await.drain().collect();
        for (name, slot) in slots {
            let _ = slot.shutdown_tx.send(true);
            if let Err(e) = slot.handle.await {
                error!(task = %name, error = %e, "task loop ended abnormally");
            }
            debug!(task = %name, "task stopped");
        }
        info!("all tasks stopped");
    }

    /// Names of tasks with a running loop.
    pub async fn active_tasks(&self) -> Vec<String> {
        let tasks = self.tasks.read().await;
        let mut names: Vec<String> = tasks.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_running(&self, name: &str) -> bool {
        self.tasks.read().await.contains_key(name)
    }
}

/// A registered task.
pub struct TaskHandle {
    name: String,
    /// Taken when the loop starts.
    task: Option<Task>,
    status_tx: watch::Sender<TaskStatus>,
    status_rx: watch::Receiver<TaskStatus>,
    registry: Registry,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the task's loop. The first firing comes after the bootstrap
    /// delay, or the task's interval if that is shorter.
    pub async fn schedule(&mut self) -> SchedulerResult<()> {
        let mut registry = self.registry.write().await;
        if registry.contains_key(&self.name) {
            return Err(SchedulerError::AlreadyScheduled(self.name.clone()));
        }
        let task = self
            .task
            .take()
            .ok_or_else(|| SchedulerError::AlreadyScheduled(self.name.clone()))?;

        let first = BOOTSTRAP_INTERVAL.min(task.settings().interval);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let status_tx = self.status_tx.clone();
        let handle = tokio::spawn(run_task_loop(task, first, status_tx, shutdown_rx));

        registry.insert(self.name.clone(), TaskSlot { handle, shutdown_tx });
        info!(task = %self.name, first_delay_ms = first.as_millis() as u64, "task scheduled");
        Ok(())
    }

    /// Stop this task's loop. A body that is mid-run finishes first.
    pub async fn cancel(&self) {
        let slot = self.registry.write().await.remove(&self.name);
        if let Some(slot) = slot {
            let _ = slot.shutdown_tx.send(true);
            if let Err(e) = slot.handle.await {
                error!(task = %self.name, error = %e, "task loop ended abnormally");
            }
            info!(task = %self.name, "task cancelled");
        }
    }

    /// Status after the most recent firing.
    pub fn status(&self) -> TaskStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver updated after every firing.
    pub fn subscribe(&self) -> watch::Receiver<TaskStatus> {
        self.status_rx.clone()
    }
}

async fn run_task_loop(
    mut task: Task,
    first: Duration,
    status_tx: watch::Sender<TaskStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delay = first;
    debug!(task = %task.name, "task loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                debug!(task = %task.name, "task loop shutting down");
                break;
            }
        }

        match task.fire().await {
            Ok(next) => {
                delay = next;
                status_tx.send_replace(task.status(next));
            }
            Err(e) => {
                error!(task = %task.name, error = %e, "task loop stopped");
                break;
            }
        }
    }
}
