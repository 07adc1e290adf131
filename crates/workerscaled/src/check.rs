//! `workerscaled check`: validate everything `run` would validate and print
//! the resolved configuration.

use std::path::Path;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::info;

use workerscale_compose::{validate_setup, ComposeCli};
use workerscale_core::ScalerConfig;

const REDACTED: &str = "********";

pub async fn run(config_path: Option<&Path>, config_only: bool) -> anyhow::Result<()> {
    let config = ScalerConfig::load(config_path, |key| std::env::var(key).ok())
        .context("invalid configuration")?;

    if !config_only {
        let cli = ComposeCli::new(&config.compose);
        validate_setup(&cli, &config.compose.service)
            .await
            .context("docker compose setup validation failed")?;
    }

    println!("{}", serde_json::to_string_pretty(&describe(&config))?);
    info!("configuration is valid");
    Ok(())
}

/// JSON view of the resolved configuration. The Redis password is never
/// printed, only whether one is set.
pub fn describe(config: &ScalerConfig) -> Value {
    json!({
        "redis": {
            "host": config.redis.host,
            "port": config.redis.port,
            "password": config.redis.password.as_ref().map(|_| REDACTED),
            "timeout_secs": config.redis.timeout.as_secs(),
        },
        "queue": {
            "name_prefix": config.queue.name_prefix,
            "name": config.queue.name,
            "candidate_keys": config.queue.candidate_keys(),
        },
        "scaling": {
            "min_replicas": config.scaling.min_replicas(),
            "max_replicas": config.scaling.max_replicas(),
            "scale_up_threshold": config.scaling.scale_up_threshold(),
            "scale_down_threshold": config.scaling.scale_down_threshold(),
        },
        "compose": {
            "file": config.compose.compose_file.display().to_string(),
            "project_directory": config
                .compose
                .project_directory
                .as_ref()
                .map(|dir| dir.display().to_string()),
            "project_name": config.compose.service.project,
            "service_name": config.compose.service.service,
        },
        "timing": {
            "polling_interval_secs": config.timing.polling_interval().as_secs(),
            "cooldown_period_secs": config.timing.cooldown_period().as_secs(),
            "scale_timeout_secs": config.scale_timeout.as_secs(),
        },
        "failure": {
            "max_consecutive_errors": config.failure.max_consecutive_errors(),
            "fail_stop": config.failure.fail_stop(),
        },
    })
}
