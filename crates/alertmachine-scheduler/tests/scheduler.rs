//! Scheduler driving real checks against a fake fleet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alertmachine_checks::ProcessWatch;
use alertmachine_core::{Defaults, SharedSettings};
use alertmachine_exec::{BoxFuture, ConnectionPool, ExecError, RemoteExecutor, Session, Transport};
use alertmachine_notify::{Notification, Notifier, NotifyError};
use alertmachine_scheduler::*;

/// Per-host process list. Hosts can be brought up or down mid-test.
#[derive(Default)]
struct Fleet {
    process_lists: Mutex<HashMap<String, Vec<String>>>,
    delay: Mutex<Duration>,
}

impl Fleet {
    fn set(&self, host: &str, processes: &[&str]) {
        self.process_lists
            .lock()
            .unwrap()
            .insert(host.to_string(), processes.iter().map(|p| p.to_string()).collect());
    }
}

struct FleetTransport(Arc<Fleet>);

struct FleetSession {
    host: String,
    fleet: Arc<Fleet>,
}

impl Transport for FleetTransport {
    fn open<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Arc<dyn Session>, ExecError>> {
        Box::pin(async move {
            Ok(Arc::new(FleetSession {
                host: host.to_string(),
                fleet: self.0.clone(),
            }) as Arc<dyn Session>)
        })
    }
}

impl Session for FleetSession {
    /// Emulates `ps aux | grep 'pattern' | grep -v grep || echo SENTINEL`.
    fn execute<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<Vec<String>, ExecError>> {
        Box::pin(async move {
            let delay = *self.fleet.delay.lock().unwrap();
            tokio::time::sleep(delay).await;

            let pattern = command.split('\'').nth(1).unwrap_or_default().to_string();
            let lines: Vec<String> = self
                .fleet
                .process_lists
                .lock()
                .unwrap()
                .get(&self.host)
                .map(|ps| ps.iter().filter(|p| p.contains(&pattern)).cloned().collect())
                .unwrap_or_default();

            if lines.is_empty() {
                Ok(vec![alertmachine_checks::BAD_SENTINEL.to_string()])
            } else {
                Ok(lines)
            }
        })
    }
}

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<(AlertNotice, Notification)>>,
}

impl Recorder {
    fn sent(&self) -> Vec<(AlertNotice, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for Recorder {
    fn notify_failure<'a>(
        &'a self,
        n: &'a Notification,
    ) -> alertmachine_notify::BoxFuture<'a, Result<(), NotifyError>> {
        self.sent.lock().unwrap().push((AlertNotice::Failure, n.clone()));
        Box::pin(async { Ok(()) })
    }

    fn notify_recovery<'a>(
        &'a self,
        n: &'a Notification,
    ) -> alertmachine_notify::BoxFuture<'a, Result<(), NotifyError>> {
        self.sent.lock().unwrap().push((AlertNotice::Recovery, n.clone()));
        Box::pin(async { Ok(()) })
    }
}

struct Harness {
    fleet: Arc<Fleet>,
    recorder: Arc<Recorder>,
    scheduler: Scheduler,
    handle: TaskHandle,
}

fn nginx_watch(shared: SharedSettings, options: TaskOptions) -> Harness {
    let fleet = Arc::new(Fleet::default());
    fleet.set("h1", &["root 1 nginx: master process"]);
    fleet.set("h2", &["root 7 sshd"]);

    let recorder = Arc::new(Recorder::default());
    let executor = Arc::new(RemoteExecutor::new(Arc::new(ConnectionPool::new(Arc::new(
        FleetTransport(fleet.clone()),
    )))));
    let watch = Arc::new(ProcessWatch::new(None, None, Some("nginx".into())).unwrap());
    let hosts = vec!["h1".to_string(), "h2".to_string()];

    let scheduler = Scheduler::new(shared).with_notifier(recorder.clone());
    let handle = scheduler.register("nginx", options, move |ctx: TaskContext| {
        let executor = executor.clone();
        let watch = watch.clone();
        let hosts = hosts.clone();
        async move {
            watch.run(&executor, &hosts, &ctx.call_site).await?;
            Ok(())
        }
    });

    Harness {
        fleet,
        recorder,
        scheduler,
        handle,
    }
}

fn options(interval: u64, interval_error: u64, retries: u32) -> TaskOptions {
    TaskOptions {
        interval: Some(Duration::from_secs(interval)),
        interval_error: Some(Duration::from_secs(interval_error)),
        retries: Some(retries),
        to: Some(vec!["ops@example.com".into()]),
        ..TaskOptions::default()
    }
}

async fn next_status(rx: &mut tokio::sync::watch::Receiver<TaskStatus>) -> TaskStatus {
    rx.changed().await.unwrap();
    rx.borrow_and_update().clone()
}

/// h2 fails three times, alerts once, then recovers.
async fn alert_then_recovery(mut h: Harness) {
    let mut status = h.handle.subscribe();
    h.handle.schedule().await.unwrap();

    let first = next_status(&mut status).await;
    assert_eq!(first.consecutive_failures, 1);
    assert_eq!(first.failure_log_len, 1);
    assert_eq!(first.next_interval, Duration::from_secs(10));
    assert!(!first.firing);
    assert!(h.recorder.sent().is_empty());

    let second = next_status(&mut status).await;
    assert_eq!(second.consecutive_failures, 2);
    assert!(h.recorder.sent().is_empty());

    let third = next_status(&mut status).await;
    assert_eq!(third.consecutive_failures, 3);
    assert!(third.firing);
    let sent = h.recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, AlertNotice::Failure);
    assert_eq!(
        sent[0].1.subject,
        "AlertMachine Failed: Grepping the process list for 'nginx' failed at h2"
    );
    assert_eq!(sent[0].1.body.matches("failed at h2").count(), 3);

    h.fleet.set("h2", &["root 9 nginx: worker process"]);

    let fourth = next_status(&mut status).await;
    assert_eq!(fourth.consecutive_failures, 0);
    assert_eq!(fourth.failure_log_len, 0);
    assert!(!fourth.firing);
    assert_eq!(fourth.next_interval, Duration::from_secs(60));

    let sent = h.recorder.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].0, AlertNotice::Recovery);
    assert_eq!(
        sent[1].1.subject,
        "AlertMachine Passed: Grepping the process list for 'nginx' failed at h2"
    );

    h.scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn failing_host_alerts_after_retries_then_recovers() {
    alert_then_recovery(nginx_watch(SharedSettings::default(), options(60, 10, 2))).await;
}

#[tokio::test(start_paused = true)]
async fn silenced_logging_still_notifies() {
    // Test mode filters out every log line.
    alertmachine_core::init_tracing(true);
    alert_then_recovery(nginx_watch(SharedSettings::default(), options(60, 10, 2))).await;
}

#[tokio::test(start_paused = true)]
async fn healthy_fleet_stays_quiet() {
    let mut h = nginx_watch(SharedSettings::default(), options(60, 10, 0));
    h.fleet.set("h2", &["root 3 nginx: master process"]);
    let mut status = h.handle.subscribe();
    h.handle.schedule().await.unwrap();

    for _ in 0..3 {
        let s = next_status(&mut status).await;
        assert_eq!(s.consecutive_failures, 0);
        assert_eq!(s.next_interval, Duration::from_secs(60));
    }
    assert!(h.recorder.sent().is_empty());
    h.scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn slow_check_counts_as_failure() {
    let mut h = nginx_watch(SharedSettings::default(), options(60, 10, 0));
    h.fleet.set("h2", &["root 3 nginx: master process"]);
    *h.fleet.delay.lock().unwrap() = Duration::from_secs(13);
    let mut status = h.handle.subscribe();
    h.handle.schedule().await.unwrap();

    let s = next_status(&mut status).await;
    assert_eq!(s.consecutive_failures, 1);
    let key = s.last_failure.unwrap();
    assert!(key.starts_with("Task ran for too long. Invoked every 60s. Ran for 13"), "{key}");
    assert_eq!(h.recorder.sent().len(), 1);
    h.scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn shared_defaults_apply_at_next_firing() {
    let shared = SharedSettings::new(Defaults {
        interval: Some(60.0),
        ..Defaults::default()
    });
    let opts = TaskOptions {
        retries: Some(5),
        ..TaskOptions::default()
    };
    let mut h = nginx_watch(shared.clone(), opts);
    h.fleet.set("h2", &["root 3 nginx: master process"]);
    let mut status = h.handle.subscribe();
    h.handle.schedule().await.unwrap();

    assert_eq!(next_status(&mut status).await.next_interval, Duration::from_secs(60));

    shared.replace(Defaults {
        interval: Some(30.0),
        ..Defaults::default()
    });
    assert_eq!(next_status(&mut status).await.next_interval, Duration::from_secs(30));

    // A failing run polls at the error interval derived from the new default.
    h.fleet.set("h2", &[]);
    assert_eq!(next_status(&mut status).await.next_interval, Duration::from_secs(6));
    h.scheduler.stop_all().await;
}
