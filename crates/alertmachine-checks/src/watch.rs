//! A watch over one process: any mix of port, pid-file and grep checks.

use alertmachine_core::{CheckFailure, HostId};
use alertmachine_exec::RemoteExecutor;

use crate::command::CheckKind;
use crate::error::CheckError;

/// The checks configured for one process, run in a fixed order (port,
/// pid-file, grep). The first failing check ends the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessWatch {
    kinds: Vec<CheckKind>,
}

impl ProcessWatch {
    pub fn new(
        port: Option<u16>,
        pid_file: Option<String>,
        grep: Option<String>,
    ) -> Result<Self, CheckError> {
        let kinds: Vec<CheckKind> = [
            port.map(CheckKind::Port),
            pid_file.map(CheckKind::PidFile),
            grep.map(CheckKind::Grep),
        ]
        .into_iter()
        .flatten()
        .collect();

        if kinds.is_empty() {
            return Err(CheckError::NothingToCheck);
        }
        Ok(Self { kinds })
    }

    pub fn kinds(&self) -> &[CheckKind] {
        &self.kinds
    }

    pub async fn run(
        &self,
        executor: &RemoteExecutor,
        hosts: &[HostId],
        call_site: &str,
    ) -> Result<(), CheckFailure> {
        if hosts.is_empty() {
            return Err(CheckFailure::at_site(
                Some(CheckError::NoHosts.to_string()),
                call_site,
            ));
        }
        for kind in &self.kinds {
            kind.command().run(executor, hosts, call_site).await?;
        }
        Ok(())
    }
}
