//! workerscale-core — shared configuration and collaborator traits.
//!
//! Everything the control loop needs to know about the outside world lives
//! here: the validated configuration tree, the identities of the queue and
//! the scaled service, and the three traits the loop drives
//! ([`QueueDepthProbe`], [`ReplicaCounter`], [`Actuator`]).
//!
//! Concrete implementations live in `workerscale-queue` (Redis) and
//! `workerscale-compose` (Docker Compose).

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

pub use backend::{Actuator, QueueDepthProbe, ReplicaCounter};
pub use config::{
    ComposeSettings, FailurePolicy, MonitorConfig, RawSettings, RedisSettings, ScalerConfig,
    ScalingConfig, TimingConfig,
};
pub use error::{ActuationError, ConfigError, ConfigResult, StoreError};
pub use types::*;
