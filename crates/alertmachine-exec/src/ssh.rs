//! OpenSSH transport.
//!
//! Each session is an ssh control master started in the background; every
//! command is multiplexed over its control socket so only the first use of
//! a host pays for the handshake.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::process::Command;
use tracing::{debug, warn};

use alertmachine_core::SshConfig;

use crate::error::ExecError;
use crate::transport::{BoxFuture, Session, Transport};

/// ssh exits with 255 when the failure is its own rather than the remote
/// command's.
const SSH_ERROR_EXIT: i32 = 255;

/// Idle seconds before a background master exits on its own. Longer than
/// the pool TTL, so only masters orphaned by an exited daemon hit it.
const CONTROL_PERSIST_SECS: u64 = 2 * 60 * 60;

/// Opens control-master sessions with the system `ssh` binary.
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: SshConfig,
    program: PathBuf,
    /// Numbers each master so a replaced session never shares a socket
    /// with its successor.
    generation: Arc<AtomicU64>,
}

impl SshTransport {
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            program: PathBuf::from("ssh"),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Use a different ssh binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Options shared by the master and every multiplexed command.
    pub fn base_args(&self, control_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout),
            "-o".to_string(),
            format!(
                "StrictHostKeyChecking={}",
                if self.config.strict_host_key_checking { "yes" } else { "no" }
            ),
            "-S".to_string(),
            control_path.display().to_string(),
        ];
        if let Some(port) = self.config.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(ref key) = self.config.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        if let Some(ref user) = self.config.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        for opt in &self.config.options {
            args.push("-o".to_string());
            args.push(opt.clone());
        }
        args
    }

    /// Control socket for one master to `host` inside the configured
    /// directory.
    pub fn control_path(&self, host: &str, generation: u64) -> PathBuf {
        let safe: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.config
            .control_dir
            .join(format!("{safe}-{}-{generation}.sock", std::process::id()))
    }
}

impl Transport for SshTransport {
    fn open<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Arc<dyn Session>, ExecError>> {
        Box::pin(async move {
            let connect_err = |reason: String| ExecError::Connect {
                host: host.to_string(),
                reason,
            };

            tokio::fs::create_dir_all(&self.config.control_dir)
                .await
                .map_err(|e| connect_err(format!("control dir: {e}")))?;

            let generation = self.generation.fetch_add(1, Ordering::Relaxed);
            let control_path = self.control_path(host, generation);
            // A socket left by a dead master would make ssh refuse to bind.
            let _ = tokio::fs::remove_file(&control_path).await;

            let base_args = self.base_args(&control_path);
            let status = Command::new(&self.program)
                .args(&base_args)
                .args(["-M", "-N", "-f", "-o"])
                .arg(format!("ControlPersist={CONTROL_PERSIST_SECS}"))
                .arg(host)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status()
                .await
                .map_err(|e| connect_err(format!("spawn {}: {e}", self.program.display())))?;

            if !status.success() {
                return Err(connect_err(format!("ssh master exited with {status}")));
            }

            debug!(%host, control_path = %control_path.display(), "ssh control master started");
            Ok(Arc::new(SshSession {
                host: host.to_string(),
                program: self.program.clone(),
                base_args,
            }) as Arc<dyn Session>)
        })
    }
}

/// Commands multiplexed over one host's control master.
pub struct SshSession {
    host: String,
    program: PathBuf,
    base_args: Vec<String>,
}

impl Session for SshSession {
    fn execute<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<Vec<String>, ExecError>> {
        Box::pin(async move {
            let output = Command::new(&self.program)
                .args(&self.base_args)
                .arg(&self.host)
                .arg("--")
                .arg(command)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| ExecError::Transport {
                    host: self.host.clone(),
                    reason: e.to_string(),
                })?;

            if output.status.code() == Some(SSH_ERROR_EXIT) {
                return Err(ExecError::Transport {
                    host: self.host.clone(),
                    reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }

            Ok(collect_lines(&output.stdout, &output.stderr))
        })
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(["-O", "exit"])
            .arg(&self.host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let host = self.host.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = cmd.status().await {
                        warn!(%host, error = %e, "failed to stop ssh control master");
                    }
                });
            }
            // Outside a runtime the master exits after its idle timeout.
            Err(_) => debug!(%host, "no runtime, ssh control master left running"),
        }
    }
}

/// Split captured output into lines, stdout first.
fn collect_lines(stdout: &[u8], stderr: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .chain(String::from_utf8_lossy(stderr).lines())
        .map(str::to_string)
        .collect()
}
