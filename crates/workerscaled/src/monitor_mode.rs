//! `workerscaled monitor`: read-only queue depth logging.

use std::path::Path;

use anyhow::{bail, Context};
use tracing::info;

use workerscale_core::{MonitorConfig, QueueDepthProbe};
use workerscale_queue::{MonitorExit, QueueMonitor, RedisQueueProbe};

use crate::shutdown;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = MonitorConfig::load(config_path, |key| std::env::var(key).ok())
        .context("invalid configuration")?;
    info!(
        queue = %config.queue,
        redis = %format_args!("{}:{}", config.redis.host, config.redis.port),
        poll_interval_secs = config.poll_interval.as_secs(),
        "starting queue monitor"
    );

    let mut probe = RedisQueueProbe::new(config.redis.clone());
    probe
        .connect()
        .await
        .with_context(|| format!("failed to connect to redis at {}:{}", config.redis.host, config.redis.port))?;

    let mut monitor = QueueMonitor::new(probe, config.queue, config.poll_interval);
    match monitor.run(shutdown::install()).await {
        MonitorExit::Cancelled => Ok(()),
        MonitorExit::BudgetExhausted { consecutive_errors } => {
            bail!("giving up after {consecutive_errors} consecutive errors")
        }
    }
}
