//! `workerscaled run`: validate the compose setup, connect to Redis, then
//! hand control to the scaling loop until shutdown.

use std::path::Path;

use anyhow::{bail, Context};
use tracing::info;

use workerscale_autoscale::{ControlLoop, LoopExit, LoopSettings};
use workerscale_compose::{validate_setup, ComposeActuator, ComposeCli, ComposeReplicaCounter};
use workerscale_core::{QueueDepthProbe, ScalerConfig};
use workerscale_queue::RedisQueueProbe;

use crate::shutdown;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = ScalerConfig::load(config_path, |key| std::env::var(key).ok())
        .context("invalid configuration")?;
    log_banner(&config);

    let cli = ComposeCli::new(&config.compose);
    validate_setup(&cli, &config.compose.service)
        .await
        .context("docker compose setup validation failed")?;

    let mut probe = RedisQueueProbe::new(config.redis.clone());
    probe
        .connect()
        .await
        .with_context(|| format!("failed to connect to redis at {}:{}", config.redis.host, config.redis.port))?;

    let mut control = ControlLoop::new(
        probe,
        ComposeReplicaCounter::new(cli.clone()),
        ComposeActuator::new(cli),
        LoopSettings::from(&config),
    );

    match control.run(shutdown::install()).await {
        LoopExit::Cancelled => {
            info!("worker autoscaler stopped");
            Ok(())
        }
        LoopExit::BudgetExhausted { consecutive_errors } => {
            bail!("giving up after {consecutive_errors} consecutive errors")
        }
    }
}

fn log_banner(config: &ScalerConfig) {
    info!(
        service = %config.compose.service,
        compose_file = %config.compose.compose_file.display(),
        queue = %config.queue,
        redis = %format_args!("{}:{}", config.redis.host, config.redis.port),
        min_replicas = config.scaling.min_replicas(),
        max_replicas = config.scaling.max_replicas(),
        scale_up_threshold = config.scaling.scale_up_threshold(),
        scale_down_threshold = config.scaling.scale_down_threshold(),
        polling_interval_secs = config.timing.polling_interval().as_secs(),
        cooldown_period_secs = config.timing.cooldown_period().as_secs(),
        "starting worker autoscaler"
    );
}
