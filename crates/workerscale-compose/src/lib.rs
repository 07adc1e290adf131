//! workerscale-compose — Docker Compose as the orchestrator.
//!
//! All interaction goes through the `docker` CLI, each call bounded by a
//! hard timeout and killed if it overruns:
//!
//! ```text
//! count     docker ps -q --filter label=com.docker.compose.service=<svc>
//!                        --filter label=com.docker.compose.project=<project>
//!                        --filter status=running
//! scale     docker compose -f <file> --project-name <project>
//!                          [--project-directory <dir>]
//!                          up -d --no-deps --scale <svc>=<n> <svc>
//! preflight docker compose -f <file> --project-name <project>
//!                          [--project-directory <dir>] config --quiet
//! ```

pub mod actuator;
pub mod cli;
pub mod preflight;
pub mod replicas;

pub use actuator::ComposeActuator;
pub use cli::ComposeCli;
pub use preflight::{validate_setup, PreflightError};
pub use replicas::ComposeReplicaCounter;
