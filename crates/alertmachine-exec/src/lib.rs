//! alertmachine-exec: run one shell command on many hosts at once.
//!
//! # Architecture
//!
//! ```text
//! RemoteExecutor::run(hosts, command)
//!   ├── ConnectionPool (one session per host, replaced after 1h)
//!   │   └── Transport::open(host) → Session   (SshTransport in production)
//!   ├── JoinSet: Session::execute(command) per host, in parallel
//!   └── tokio::time::timeout over the whole dispatch (15s)
//! ```
//!
//! The executor never returns an error. Any connection, transport, or
//! timeout failure is reported as a failure of every requested host, so a
//! broken host can never silently drop out of monitoring.

pub mod error;
pub mod executor;
pub mod pool;
pub mod ssh;
pub mod transport;

pub use error::ExecError;
pub use executor::{EXEC_TIMEOUT, ExecReport, HostOutput, RemoteExecutor};
pub use pool::{CONNECTION_TTL, ConnectionPool};
pub use ssh::SshTransport;
pub use transport::{BoxFuture, Session, Transport};
