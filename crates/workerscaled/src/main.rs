//! workerscaled — the workerscale daemon.
//!
//! Watches the backlog of a Redis-backed job queue and scales a Docker
//! Compose worker service one replica at a time between configured bounds.
//!
//! # Usage
//!
//! ```text
//! workerscaled run      [--config /etc/workerscale.toml]
//! workerscaled check    [--config-only]
//! workerscaled monitor
//! ```
//!
//! Settings come from environment variables, optionally layered over a TOML
//! file. `RUST_LOG` filters log output and `LOG_FORMAT=json` switches to
//! JSON lines. Logs go to stderr so `check` output stays machine-readable.

mod check;
mod monitor_mode;
mod scaler_mode;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,workerscaled=debug,workerscale=debug";

#[derive(Parser)]
#[command(name = "workerscaled", about = "Queue-driven worker autoscaler", version)]
struct Cli {
    /// TOML settings file. Environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaler (the default).
    Run,

    /// Validate settings and the compose manifest, then print the resolved
    /// configuration as JSON.
    Check {
        /// Only validate settings; skip the compose manifest.
        #[arg(long)]
        config_only: bool,
    },

    /// Log queue depth on an interval without scaling anything.
    Monitor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => scaler_mode::run(config_path).await,
        Command::Check { config_only } => check::run(config_path, config_only).await,
        Command::Monitor => monitor_mode::run(config_path).await,
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
