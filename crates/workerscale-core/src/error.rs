//! Error types shared across workerscale crates.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid or unreadable configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("port must be between 1 and 65535, got {0}")]
    PortOutOfRange(u64),

    #[error("minimum replicas must be at least 1, got {0}")]
    MinReplicasTooLow(u32),

    #[error("maximum replicas ({max}) must be >= minimum replicas ({min})")]
    ReplicaBounds { min: u32, max: u32 },

    #[error("{name} must be at least {min:?}, got {actual:?}")]
    DurationTooShort {
        name: &'static str,
        min: Duration,
        actual: Duration,
    },

    #[error("{name} must be between {min:?} and {max:?}, got {actual:?}")]
    DurationOutOfRange {
        name: &'static str,
        min: Duration,
        max: Duration,
        actual: Duration,
    },

    #[error("max consecutive errors must be at least 1")]
    ZeroErrorBudget,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failures talking to the queue store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store call timed out after {0:?}")]
    TimedOut(Duration),

    #[error("store command failed: {0}")]
    Command(String),
}

/// Failures scaling the worker service.
#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("scale command exited with {}: {stderr}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    CommandFailed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("scale command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("orchestrator tool not found: {0}")]
    ToolUnavailable(String),

    #[error("failed to run scale command: {0}")]
    Io(String),
}
