//! Scaling through `docker compose up --scale`.

use std::time::Duration;

use tracing::{error, info, warn};

use workerscale_core::{ActuationError, Actuator, ServiceIdentity};

use crate::cli::{ComposeCli, RunError};

/// [`Actuator`] that converges a compose service to an exact replica count.
///
/// `up -d --no-deps` is declarative: re-issuing the current count is a
/// no-op reconciliation and dependencies are never restarted.
#[derive(Debug, Clone)]
pub struct ComposeActuator {
    cli: ComposeCli,
}

impl ComposeActuator {
    pub fn new(cli: ComposeCli) -> Self {
        Self { cli }
    }
}

impl Actuator for ComposeActuator {
    async fn scale_to(
        &self,
        service: &ServiceIdentity,
        target: u32,
        timeout: Duration,
    ) -> Result<(), ActuationError> {
        let args = self.cli.scale_args(service, target);
        let command = self.cli.command_line(&args);

        info!(%service, target, %command, "scaling service");

        let captured = match self.cli.run(&args, timeout).await {
            Ok(captured) => captured,
            Err(RunError::NotFound(program)) => {
                error!(%service, target, %program, "docker compose command not found");
                return Err(ActuationError::ToolUnavailable(program));
            }
            Err(RunError::TimedOut(after)) => {
                error!(%service, target, timeout_secs = after.as_secs(), "scale command timed out");
                return Err(ActuationError::TimedOut(after));
            }
            Err(RunError::Io(e)) => {
                error!(%service, target, error = %e, "unexpected error during scaling");
                return Err(ActuationError::Io(e.to_string()));
            }
        };

        if !captured.status.success() {
            let code = captured.status.code();
            error!(
                %service,
                target,
                %command,
                return_code = ?code,
                stdout = %captured.stdout,
                stderr = %captured.stderr,
                "scale command failed"
            );
            return Err(ActuationError::CommandFailed {
                code,
                stdout: captured.stdout,
                stderr: captured.stderr,
            });
        }

        if !captured.stdout.is_empty() {
            info!(%service, stdout = %captured.stdout, "scale command output");
        }
        if !captured.stderr.is_empty() {
            warn!(%service, stderr = %captured.stderr, "scale command warnings");
        }
        Ok(())
    }
}
