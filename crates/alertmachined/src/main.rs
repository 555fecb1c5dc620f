//! alertmachined: the AlertMachine daemon.
//!
//! Loads `alertmachine.toml`, registers one recurring check per
//! `[[watch]]` entry, and runs until interrupted:
//! - Remote executor (pooled ssh control masters)
//! - Scheduler with per-task alert state
//! - Notifier (sendmail, or the log when no MTA is configured)
//!
//! # Usage
//!
//! ```text
//! alertmachined run --config /etc/alertmachine/alertmachine.toml
//! alertmachined check-config --config alertmachine.toml --json
//! alertmachined sample-config > alertmachine.toml
//! ```

mod daemon;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use alertmachine_core::{AlertConfig, init_tracing};

#[derive(Parser)]
#[command(name = "alertmachined", about = "AlertMachine fleet health-check daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every configured watch until interrupted.
    Run {
        /// Path to the configuration file.
        #[arg(long, default_value = "/etc/alertmachine/alertmachine.toml")]
        config: PathBuf,

        /// Silence all logging, whatever the config says.
        #[arg(long)]
        test_mode: bool,
    },
    /// Validate a configuration file and list its watches.
    CheckConfig {
        #[arg(long, default_value = "/etc/alertmachine/alertmachine.toml")]
        config: PathBuf,

        /// Print the watches as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print a starter configuration file.
    SampleConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, test_mode } => daemon::run(config, test_mode).await,
        Command::CheckConfig { config, json } => check_config(config, json),
        Command::SampleConfig => {
            print!("{}", AlertConfig::sample().to_toml_string()?);
            Ok(())
        }
    }
}

fn check_config(path: PathBuf, json: bool) -> anyhow::Result<()> {
    init_tracing(false);
    let config = AlertConfig::from_file(&path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.watches)?);
        return Ok(());
    }

    println!("{}: {} watch(es)", path.display(), config.watches.len());
    for watch in &config.watches {
        let checks: Vec<String> = daemon::process_watch(watch)?
            .kinds()
            .iter()
            .map(|kind| kind.command().command)
            .collect();
        println!("  {} on {}", watch.name, watch.hosts.join(", "));
        for check in checks {
            println!("    {check}");
        }
    }
    Ok(())
}
