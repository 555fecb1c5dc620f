//! The seam between the executor and the remote shell.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ExecError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An open remote-shell session to one host.
pub trait Session: Send + Sync {
    /// Run `command` and return its stdout followed by its stderr, one
    /// entry per line. A non-zero remote exit status is not an error.
    fn execute<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<Vec<String>, ExecError>>;
}

/// Opens sessions. Sessions for different hosts are used concurrently.
pub trait Transport: Send + Sync {
    fn open<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Arc<dyn Session>, ExecError>>;
}
