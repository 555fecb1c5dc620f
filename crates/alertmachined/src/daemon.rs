//! Daemon assembly: config → executor → scheduler → one task per watch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use alertmachine_checks::{CheckError, ProcessWatch};
use alertmachine_core::{AlertConfig, HostId, MailConfig, SharedSettings, WatchConfig, init_tracing};
use alertmachine_exec::{ConnectionPool, RemoteExecutor, SshTransport};
use alertmachine_notify::{LogNotifier, Notifier, SendmailNotifier};
use alertmachine_scheduler::{Scheduler, TaskContext, TaskHandle, TaskOptions};

/// Run every watch in the config at `path` until SIGINT or SIGTERM.
/// SIGHUP re-reads the `[defaults]` table.
pub async fn run(path: PathBuf, test_mode: bool) -> anyhow::Result<()> {
    let config = AlertConfig::from_file(&path)?;
    init_tracing(test_mode || config.test_mode);
    info!(path = %path.display(), watches = config.watches.len(), "AlertMachine daemon starting");

    // ── Remote executor ────────────────────────────────────────
    let transport = Arc::new(SshTransport::new(config.ssh.clone()));
    let pool = Arc::new(ConnectionPool::new(transport));
    let executor = Arc::new(RemoteExecutor::new(pool));
    info!(control_dir = %config.ssh.control_dir.display(), "remote executor initialized");

    // ── Scheduler ──────────────────────────────────────────────
    let shared = SharedSettings::new(config.defaults.clone());
    let scheduler = Scheduler::new(shared.clone()).with_notifier(notifier_for(&config.mail));

    let mut handles = register_watches(&scheduler, &config.watches, executor)?;
    for handle in &mut handles {
        handle.schedule().await?;
    }
    info!(tasks = handles.len(), "watches scheduled");

    // ── Signals ────────────────────────────────────────────────
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    loop {
        tokio::select! {
            _ = hangup.recv() => reload_defaults(&path, &shared),
            _ = terminate.recv() => {
                info!("SIGTERM received");
                break;
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    scheduler.stop_all().await;
    info!("AlertMachine daemon stopped");
    Ok(())
}

/// Sendmail when a binary is configured, the log otherwise.
pub fn notifier_for(mail: &MailConfig) -> Arc<dyn Notifier> {
    match &mail.sendmail {
        Some(program) => {
            info!(program = %program.display(), "notifications via sendmail");
            Arc::new(SendmailNotifier::new(program))
        }
        None => {
            info!("no sendmail configured, notifications go to the log");
            Arc::new(LogNotifier)
        }
    }
}

pub fn process_watch(watch: &WatchConfig) -> Result<ProcessWatch, CheckError> {
    ProcessWatch::new(watch.port, watch.pid_file.clone(), watch.grep.clone())
}

/// Per-task options from a watch entry. Hosts are passed as the task args.
pub fn task_options(watch: &WatchConfig) -> TaskOptions {
    TaskOptions {
        args: watch.hosts.clone(),
        interval: secs(watch.interval),
        interval_error: secs(watch.interval_error),
        retries: watch.retries,
        dont_check_long_processes: watch.dont_check_long_processes,
        from: watch.from.clone(),
        to: watch.to.clone(),
        notifier: None,
    }
}

/// Register, but do not schedule, one task per watch.
pub fn register_watches(
    scheduler: &Scheduler,
    watches: &[WatchConfig],
    executor: Arc<RemoteExecutor>,
) -> anyhow::Result<Vec<TaskHandle>> {
    let mut handles = Vec::with_capacity(watches.len());
    for watch in watches {
        let checks = Arc::new(process_watch(watch)?);
        let hosts: Arc<Vec<HostId>> = Arc::new(watch.hosts.clone());
        let executor = executor.clone();

        let handle = scheduler.register(&watch.name, task_options(watch), move |ctx: TaskContext| {
            let checks = checks.clone();
            let hosts = hosts.clone();
            let executor = executor.clone();
            async move {
                checks.run(&executor, &hosts, &ctx.call_site).await?;
                Ok(())
            }
        });
        handles.push(handle);
    }
    Ok(handles)
}

/// Swap in the `[defaults]` table from disk. A bad file keeps the old
/// values. Watch changes need a restart.
fn reload_defaults(path: &Path, shared: &SharedSettings) {
    match AlertConfig::from_file(path) {
        Ok(config) => {
            shared.replace(config.defaults);
            info!(path = %path.display(), "defaults reloaded");
        }
        Err(e) => warn!(path = %path.display(), error = %e, "reload failed, keeping previous defaults"),
    }
}

fn secs(value: Option<f64>) -> Option<Duration> {
    value.and_then(|v| Duration::try_from_secs_f64(v).ok())
}
