//! Check primitives against a fake fleet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alertmachine_checks::*;
use alertmachine_exec::*;

/// Replies per host; hosts missing from the map refuse connections.
/// Records every command it receives.
#[derive(Default)]
struct Fleet {
    replies: HashMap<String, Vec<String>>,
    commands: Mutex<Vec<String>>,
}

struct FleetSession {
    lines: Vec<String>,
    fleet: Arc<Fleet>,
}

struct FleetTransport(Arc<Fleet>);

impl Transport for FleetTransport {
    fn open<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Arc<dyn Session>, ExecError>> {
        Box::pin(async move {
            match self.0.replies.get(host) {
                Some(lines) => Ok(Arc::new(FleetSession {
                    lines: lines.clone(),
                    fleet: self.0.clone(),
                }) as Arc<dyn Session>),
                None => Err(ExecError::Connect {
                    host: host.to_string(),
                    reason: "no route to host".to_string(),
                }),
            }
        })
    }
}

impl Session for FleetSession {
    fn execute<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<Vec<String>, ExecError>> {
        Box::pin(async move {
            self.fleet.commands.lock().unwrap().push(command.to_string());
            Ok(self.lines.clone())
        })
    }
}

/// One reply per host; lines separated by `\n`.
fn fleet(replies: &[(&str, &str)]) -> Arc<Fleet> {
    Arc::new(Fleet {
        replies: replies
            .iter()
            .map(|(h, text)| (h.to_string(), text.lines().map(str::to_string).collect()))
            .collect(),
        commands: Mutex::new(Vec::new()),
    })
}

fn executor(fleet: &Arc<Fleet>) -> RemoteExecutor {
    RemoteExecutor::new(Arc::new(ConnectionPool::new(Arc::new(FleetTransport(fleet.clone())))))
}

fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn port_check_names_only_the_bad_host() {
    let fleet = fleet(&[
        ("a", BAD_SENTINEL),
        ("b", "tcp4  0  0  *.3343  *.*  LISTEN"),
    ]);
    let failure = CheckKind::Port(3343)
        .command()
        .run(&executor(&fleet), &hosts(&["a", "b"]), "watch.rs:1:1")
        .await
        .unwrap_err();

    assert_eq!(failure.message(), Some("Port 3343 seems down on a"));
    assert_eq!(failure.call_site(), "watch.rs:1:1");
}

#[tokio::test]
async fn passing_hosts_yield_ok() {
    let fleet = fleet(&[("a", "root 1 nginx: master"), ("b", "root 2 nginx: master")]);
    let result = CheckKind::Grep("nginx: master".into())
        .command()
        .run(&executor(&fleet), &hosts(&["a", "b"]), "here")
        .await;
    assert!(result.is_ok());

    let sent = fleet.commands.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|c| c.ends_with(&format!("|| echo {BAD_SENTINEL}"))));
}

#[tokio::test]
async fn sentinel_on_a_later_line_still_counts() {
    let text = format!("cat: /run/x.pid: No such file\n{BAD_SENTINEL}");
    let fleet = fleet(&[("a", text.as_str())]);
    let failure = CheckKind::PidFile("/run/x.pid".into())
        .command()
        .run(&executor(&fleet), &hosts(&["a"]), "here")
        .await
        .unwrap_err();
    assert_eq!(failure.message(), Some("Pidfile /run/x.pid doesnt seem valid at a"));
}

#[tokio::test]
async fn executor_failure_marks_every_host_bad() {
    // "gone" refuses connections, so the whole dispatch fails.
    let fleet = fleet(&[("a", "fine")]);
    let failure = CheckKind::Grep("sshd".into())
        .command()
        .run(&executor(&fleet), &hosts(&["a", "gone"]), "here")
        .await
        .unwrap_err();
    assert_eq!(
        failure.message(),
        Some("Grepping the process list for 'sshd' failed at a, gone")
    );
}

#[tokio::test]
async fn watch_stops_at_first_failing_check() {
    let fleet = fleet(&[("a", BAD_SENTINEL)]);
    let watch = ProcessWatch::new(Some(80), None, Some("nginx".into())).unwrap();

    let failure = watch.run(&executor(&fleet), &hosts(&["a"]), "here").await.unwrap_err();
    assert_eq!(failure.message(), Some("Port 80 seems down on a"));
    assert_eq!(fleet.commands.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn watch_runs_every_check_when_healthy() {
    let fleet = fleet(&[("a", "ok")]);
    let watch = ProcessWatch::new(Some(80), Some("/run/nginx.pid".into()), Some("nginx".into())).unwrap();

    watch.run(&executor(&fleet), &hosts(&["a"]), "here").await.unwrap();
    assert_eq!(fleet.commands.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn watch_without_hosts_fails() {
    let fleet = fleet(&[]);
    let watch = ProcessWatch::new(Some(80), None, None).unwrap();
    let failure = watch.run(&executor(&fleet), &[], "here").await.unwrap_err();
    assert_eq!(failure.message(), Some("no hosts to check"));
}
