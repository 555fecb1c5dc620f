//! Parallel multi-host command dispatch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{info, warn};

use alertmachine_core::HostId;

use crate::error::ExecError;
use crate::pool::ConnectionPool;

/// Hard limit for one `run` across all of its hosts.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(15);

/// What one host produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutput {
    pub host: HostId,
    pub result: Result<Vec<String>, ExecError>,
}

impl HostOutput {
    /// Output lines joined by spaces, or `None` if the host failed.
    pub fn joined(&self) -> Option<String> {
        self.result.as_ref().ok().map(|lines| lines.join(" "))
    }
}

/// Per-host outcomes of one `run`, in the order the hosts were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecReport {
    outputs: Vec<HostOutput>,
}

impl ExecReport {
    pub fn outputs(&self) -> &[HostOutput] {
        &self.outputs
    }

    pub fn get(&self, host: &str) -> Option<&HostOutput> {
        self.outputs.iter().find(|o| o.host == host)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// True when the dispatch failed as a whole.
    pub fn all_failed(&self) -> bool {
        !self.outputs.is_empty() && self.outputs.iter().all(|o| o.result.is_err())
    }

    /// Every requested host failed with `error`.
    fn failed(hosts: &[HostId], error: ExecError) -> Self {
        Self {
            outputs: hosts
                .iter()
                .map(|host| HostOutput {
                    host: host.clone(),
                    result: Err(error.clone()),
                })
                .collect(),
        }
    }
}

/// Runs commands over pooled sessions.
#[derive(Clone)]
pub struct RemoteExecutor {
    pool: Arc<ConnectionPool>,
    timeout: Duration,
}

impl RemoteExecutor {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            timeout: EXEC_TIMEOUT,
        }
    }

    /// Override the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Run `command` on every host in parallel.
    ///
    /// Never fails: if any host cannot be reached, the transport breaks, or
    /// the whole dispatch outlives the timeout, every requested host is
    /// reported as failed.
    pub async fn run(&self, hosts: &[HostId], command: &str) -> ExecReport {
        info!(hosts = %hosts.join(","), %command, "executing");

        let report = match tokio::time::timeout(self.timeout, self.dispatch(hosts, command)).await {
            Ok(Ok(results)) => ExecReport {
                outputs: hosts
                    .iter()
                    .map(|host| HostOutput {
                        host: host.clone(),
                        result: results
                            .get(host)
                            .cloned()
                            .ok_or_else(|| ExecError::Dispatch(format!("no result for {host}"))),
                    })
                    .collect(),
            },
            Ok(Err(e)) => {
                warn!(hosts = %hosts.join(","), %command, error = %e, "executing command on hosts failed");
                ExecReport::failed(hosts, e)
            }
            Err(_) => {
                warn!(
                    hosts = %hosts.join(","),
                    %command,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "executing command on hosts timed out"
                );
                // A hung session would time out again on reuse.
                for host in hosts.iter().collect::<HashSet<_>>() {
                    self.pool.evict(host).await;
                }
                ExecReport::failed(hosts, ExecError::Timeout(self.timeout))
            }
        };

        for output in report.outputs() {
            if let Ok(lines) = &output.result {
                info!(host = %output.host, output = %lines.join("\n"), "command output");
            }
        }
        report
    }

    /// Fan out to each distinct host; the first error aborts the rest.
    async fn dispatch(
        &self,
        hosts: &[HostId],
        command: &str,
    ) -> Result<HashMap<HostId, Vec<String>>, ExecError> {
        let mut set = JoinSet::new();
        let mut seen = HashSet::new();

        for host in hosts.iter().filter(|h| seen.insert(h.as_str())) {
            let pool = self.pool.clone();
            let host = host.clone();
            let command = command.to_string();
            set.spawn(async move {
                let result = match pool.get_or_create(&host).await {
                    Ok(session) => session.execute(&command).await,
                    Err(e) => Err(e),
                };
                (host, result)
            });
        }

        let mut results = HashMap::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            let (host, result) = joined.map_err(|e| ExecError::Dispatch(e.to_string()))?;
            match result {
                Ok(lines) => {
                    results.insert(host, lines);
                }
                Err(e) => {
                    // The session may be dead; reconnect on next use.
                    self.pool.evict(&host).await;
                    return Err(e);
                }
            }
        }
        Ok(results)
    }
}
