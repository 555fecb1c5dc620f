//! Check construction errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("must mention at least one of port, pid_file, grep")]
    NothingToCheck,

    #[error("no hosts to check")]
    NoHosts,
}
