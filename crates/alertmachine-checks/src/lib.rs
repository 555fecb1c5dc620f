//! alertmachine-checks: process checks run over the remote executor.
//!
//! Each check kind builds a shell command plus a pair of human-readable
//! messages. The command is suffixed with `|| echo <sentinel>` because the
//! remote exit status does not survive the transport; a host whose output
//! contains the sentinel (or that could not run the command at all) is bad.

pub mod command;
pub mod error;
pub mod watch;

pub use command::{BAD_SENTINEL, CheckCommand, CheckKind, shell_quote};
pub use error::CheckError;
pub use watch::ProcessWatch;
