//! alertmachine-core: types shared by every AlertMachine crate.
//!
//! - [`CheckFailure`]: the structured record of one failed check run
//! - [`AlertConfig`]: the TOML configuration file model
//! - [`SharedSettings`]: hot-swappable shared defaults read by the scheduler
//! - [`init_tracing`]: subscriber bootstrap that honors test mode

pub mod config;
pub mod failure;
pub mod host;
pub mod logging;
pub mod settings;

pub use config::{AlertConfig, ConfigError, MailConfig, SshConfig, WatchConfig};
pub use failure::CheckFailure;
pub use host::{HostId, hostname};
pub use logging::init_tracing;
pub use settings::{Defaults, SharedSettings};
