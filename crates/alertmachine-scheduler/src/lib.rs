//! alertmachine-scheduler: recurring checks with debounced alerting.
//!
//! Each registered task runs on its own timer. A failing task is polled
//! faster, fires an alert once its consecutive failures exceed the retry
//! threshold, and sends a recovery notice on its next clean run.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── SharedSettings (hot-swappable defaults)
//!   ├── default Notifier
//!   └── Per-task background loop (single-flight)
//!       ├── resolve() → ResolvedSettings, every firing
//!       ├── check body(TaskContext) → anyhow::Result<()>
//!       ├── AlertTracker (failure log, firing flag, debounce)
//!       └── Notifier::notify_failure / notify_recovery
//! ```
//!
//! # Timing
//!
//! The first firing comes after at most one second. After that the task
//! sleeps for its steady-state interval, or for its error interval while
//! its failure log is non-empty. A clean run that takes a fifth of the
//! steady-state interval or longer counts as a failure.

pub mod error;
pub mod scheduler;
pub mod settings;
pub mod task;
pub mod tracker;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{Scheduler, TaskHandle};
pub use settings::{ResolvedSettings, TaskOptions, resolve};
pub use task::{CheckBody, TaskContext, TaskStatus, check_body};
pub use tracker::{AlertNotice, AlertTracker, DEBOUNCE_WINDOW, Polling, TrackerOutcome};
