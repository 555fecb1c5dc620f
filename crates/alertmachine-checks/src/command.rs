//! Check kinds and the command/message triple each one builds.

use tracing::{info, warn};

use alertmachine_core::{CheckFailure, HostId};
use alertmachine_exec::RemoteExecutor;

/// Echoed by the remote shell when the check command fails.
pub const BAD_SENTINEL: &str = "__ALERTMACHINE_BAD__";

/// What to look for on each host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    /// A TCP port in LISTEN state.
    Port(u16),
    /// A pid file naming a live process.
    PidFile(String),
    /// A process-list line matching a grep pattern.
    Grep(String),
}

impl CheckKind {
    pub fn command(&self) -> CheckCommand {
        match self {
            CheckKind::Port(port) => CheckCommand {
                command: format!(
                    "netstat -na | grep LISTEN | grep -E '[.:]{port} ' | grep -v grep"
                ),
                checking_msg: format!("Checking if port {port} is open on %s"),
                failed_msg: format!("Port {port} seems down on %s"),
            },
            CheckKind::PidFile(path) => CheckCommand {
                command: format!("ps -p \"$(cat {})\"", shell_quote(path)),
                checking_msg: format!("Checking if valid pidfile {path} exists in %s"),
                failed_msg: format!("Pidfile {path} doesnt seem valid at %s"),
            },
            CheckKind::Grep(pattern) => CheckCommand {
                command: format!("ps aux | grep {} | grep -v grep", shell_quote(pattern)),
                checking_msg: format!("Grepping the process list for '{pattern}' in %s"),
                failed_msg: format!("Grepping the process list for '{pattern}' failed at %s"),
            },
        }
    }
}

/// A shell command plus its log and failure templates. Both templates
/// carry a `%s` placeholder for a comma-separated host list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckCommand {
    pub command: String,
    pub checking_msg: String,
    pub failed_msg: String,
}

impl CheckCommand {
    /// The command actually sent: prints the sentinel if `command` fails.
    pub fn guarded_command(&self) -> String {
        format!("{} || echo {BAD_SENTINEL}", self.command)
    }

    pub fn checking_message(&self, hosts: &[HostId]) -> String {
        fill(&self.checking_msg, hosts)
    }

    pub fn failed_message(&self, hosts: &[HostId]) -> String {
        fill(&self.failed_msg, hosts)
    }

    /// Run on every host. Fails naming only the bad hosts, or every host if
    /// the executor could not run the command at all.
    pub async fn run(
        &self,
        executor: &RemoteExecutor,
        hosts: &[HostId],
        call_site: &str,
    ) -> Result<(), CheckFailure> {
        info!("{}", self.checking_message(hosts));

        let report = executor.run(hosts, &self.guarded_command()).await;
        if report.all_failed() {
            warn!(command = %self.command, "executor failed for every host, treating all as bad");
        }

        let bad: Vec<HostId> = report
            .outputs()
            .iter()
            .filter(|output| match output.joined() {
                Some(text) => text.contains(BAD_SENTINEL),
                None => true,
            })
            .map(|output| output.host.clone())
            .collect();

        if bad.is_empty() {
            return Ok(());
        }

        let failure = CheckFailure::at_site(Some(self.failed_message(&bad)), call_site);
        warn!(failure = %failure.log(), "check failed");
        Err(failure)
    }
}

/// Quote `s` as a single POSIX shell word.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn fill(template: &str, hosts: &[HostId]) -> String {
    template.replacen("%s", &hosts.join(", "), 1)
}
