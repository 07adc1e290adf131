//! Startup check of the compose manifest.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use workerscale_core::ServiceIdentity;

use crate::cli::{ComposeCli, RunError};

const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("compose project name is not configured")]
    MissingProject,

    #[error("compose file not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("compose configuration invalid: {0}")]
    InvalidManifest(String),

    #[error("{0} not found")]
    ToolUnavailable(String),

    #[error("compose config check timed out after {0:?}")]
    TimedOut(Duration),

    #[error("compose config check failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Verify the manifest exists and `docker compose config` accepts it.
pub async fn validate_setup(cli: &ComposeCli, service: &ServiceIdentity) -> Result<(), PreflightError> {
    if service.project.trim().is_empty() {
        error!("docker project name not configured");
        return Err(PreflightError::MissingProject);
    }

    let manifest = cli.compose_file();
    if !manifest.is_file() {
        error!(file = %manifest.display(), "docker compose file not found");
        return Err(PreflightError::ManifestNotFound(manifest.clone()));
    }

    let captured = cli
        .run(&cli.config_args(service), PREFLIGHT_TIMEOUT)
        .await
        .map_err(|e| match e {
            RunError::NotFound(program) => PreflightError::ToolUnavailable(program),
            RunError::TimedOut(after) => PreflightError::TimedOut(after),
            RunError::Io(e) => PreflightError::Io(e),
        })?;

    if !captured.status.success() {
        error!(stderr = %captured.stderr, "docker compose configuration invalid");
        return Err(PreflightError::InvalidManifest(captured.stderr));
    }

    info!(file = %manifest.display(), %service, "docker setup validated");
    Ok(())
}
