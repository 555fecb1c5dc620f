//! Scheduler error types.
//!
//! Check failures never surface here; they are folded into the alert
//! state. These errors mean the scheduler itself broke and the affected
//! task loop stops.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task already scheduled: {0}")]
    AlreadyScheduled(String),

    #[error("check body for task {task} was cancelled: {reason}")]
    BodyCancelled { task: String, reason: String },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
