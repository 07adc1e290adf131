//! Running-replica count via `docker ps`.

use std::time::Duration;

use tracing::{debug, error};

use workerscale_core::{ReplicaCounter, ServiceIdentity};

use crate::cli::{ComposeCli, RunError};

/// Counts running containers carrying the compose service and project labels.
#[derive(Debug, Clone)]
pub struct ComposeReplicaCounter {
    cli: ComposeCli,
    timeout: Duration,
}

impl ComposeReplicaCounter {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(cli: ComposeCli) -> Self {
        Self {
            cli,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ReplicaCounter for ComposeReplicaCounter {
    async fn count(&self, service: &ServiceIdentity) -> u32 {
        let args = self.cli.ps_args(service);

        let captured = match self.cli.run(&args, self.timeout).await {
            Ok(captured) => captured,
            Err(e) => {
                let error = match e {
                    RunError::NotFound(program) => format!("{program} not found"),
                    RunError::TimedOut(after) => format!("timed out after {after:?}"),
                    RunError::Io(e) => e.to_string(),
                };
                error!(%service, %error, "error getting current replicas");
                return 0;
            }
        };

        if !captured.status.success() {
            error!(
                %service,
                return_code = ?captured.status.code(),
                stderr = %captured.stderr,
                "error getting current replicas"
            );
            return 0;
        }

        let count = captured
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count() as u32;
        debug!(%service, count, "current replicas counted");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::{settings, stub_cli};

    fn worker() -> ServiceIdentity {
        ServiceIdentity::new("automation", "n8n-worker")
    }

    #[tokio::test]
    async fn counts_container_ids() {
        let dir = tempfile::tempdir().unwrap();
        let counter = ComposeReplicaCounter::new(stub_cli(
            dir.path(),
            "printf 'a1b2c3\\nd4e5f6\\n\\n0a1b2c\\n'",
        ));
        assert_eq!(counter.count(&worker()).await, 3);
    }

    #[tokio::test]
    async fn no_containers_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let counter = ComposeReplicaCounter::new(stub_cli(dir.path(), "exit 0"));
        assert_eq!(counter.count(&worker()).await, 0);
    }

    #[tokio::test]
    async fn failures_read_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let failing = ComposeReplicaCounter::new(stub_cli(
            dir.path(),
            "echo abc; echo 'Cannot connect to the Docker daemon' >&2; exit 1",
        ));
        assert_eq!(failing.count(&worker()).await, 0);

        let hung = ComposeReplicaCounter::new(stub_cli(dir.path(), "sleep 10"))
            .with_timeout(Duration::from_millis(200));
        assert_eq!(hung.count(&worker()).await, 0);

        let missing = ComposeReplicaCounter::new(
            ComposeCli::new(&settings(None))
                .with_program("/nonexistent/docker", Vec::<String>::new()),
        );
        assert_eq!(missing.count(&worker()).await, 0);
    }
}
