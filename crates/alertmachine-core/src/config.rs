//! alertmachine.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::Defaults;

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid watch '{name}': {reason}")]
    InvalidWatch { name: String, reason: String },

    #[error("invalid defaults: {0}")]
    InvalidDefaults(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Silences all human-readable logging. Changes nothing else.
    pub test_mode: bool,
    pub defaults: Defaults,
    pub ssh: SshConfig,
    pub mail: MailConfig,
    #[serde(rename = "watch")]
    pub watches: Vec<WatchConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
    /// Seconds allowed for the TCP connect and handshake.
    pub connect_timeout: u64,
    pub strict_host_key_checking: bool,
    /// Directory holding the control-master sockets.
    pub control_dir: PathBuf,
    /// Extra `-o` options passed verbatim.
    pub options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: None,
            port: None,
            identity_file: None,
            connect_timeout: 10,
            strict_host_key_checking: false,
            control_dir: std::env::temp_dir().join("alertmachine"),
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Path to a sendmail-compatible binary. Without one, notifications
    /// are only logged.
    pub sendmail: Option<PathBuf>,
}

/// One `[[watch]]` entry: a process check against a list of hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub name: String,
    pub hosts: Vec<String>,
    pub port: Option<u16>,
    pub pid_file: Option<String>,
    pub grep: Option<String>,
    pub interval: Option<f64>,
    pub interval_error: Option<f64>,
    pub retries: Option<u32>,
    pub dont_check_long_processes: Option<bool>,
    pub from: Option<String>,
    pub to: Option<Vec<String>>,
}

impl AlertConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a config document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: AlertConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive(self.defaults.interval, "interval").map_err(ConfigError::InvalidDefaults)?;
        check_positive(self.defaults.interval_error, "interval_error")
            .map_err(ConfigError::InvalidDefaults)?;

        for watch in &self.watches {
            watch.validate()?;
        }

        let mut names: Vec<&str> = self.watches.iter().map(|w| w.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::InvalidWatch {
                name: dup[0].to_string(),
                reason: "duplicate watch name".to_string(),
            });
        }
        Ok(())
    }

    /// A starter config with one watch, for `alertmachined sample-config`.
    pub fn sample() -> Self {
        AlertConfig {
            test_mode: false,
            defaults: Defaults {
                interval: Some(300.0),
                interval_error: None,
                retries: Some(1),
                dont_check_long_processes: None,
                from: Some("alertmachine@localhost".to_string()),
                to: Some(vec!["ops@localhost".to_string()]),
            },
            ssh: SshConfig::default(),
            mail: MailConfig {
                sendmail: Some(PathBuf::from("/usr/sbin/sendmail")),
            },
            watches: vec![WatchConfig {
                name: "nginx".to_string(),
                hosts: vec!["web1".to_string(), "web2".to_string()],
                port: Some(80),
                pid_file: None,
                grep: Some("nginx: master".to_string()),
                interval: Some(60.0),
                interval_error: Some(10.0),
                retries: Some(2),
                dont_check_long_processes: None,
                from: None,
                to: None,
            }],
        }
    }
}

impl WatchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidWatch {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.hosts.is_empty() {
            return Err(invalid("at least one host is required"));
        }
        if self.port.is_none() && self.pid_file.is_none() && self.grep.is_none() {
            return Err(invalid("must set at least one of port, pid_file, grep"));
        }
        check_positive(self.interval, "interval").map_err(|r| invalid(&r))?;
        check_positive(self.interval_error, "interval_error").map_err(|r| invalid(&r))?;
        Ok(())
    }
}

fn check_positive(value: Option<f64>, field: &str) -> Result<(), String> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => Err(format!("{field} must be a positive number of seconds")),
        _ => Ok(()),
    }
}
