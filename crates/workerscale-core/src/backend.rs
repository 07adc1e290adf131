//! Collaborator traits driven by the control loop.
//!
//! Each trait is the loop's only view of an external system, so tests can
//! substitute in-memory fakes. Every call is awaited sequentially by a
//! single task; implementations bound their own latency.

use std::future::Future;
use std::time::Duration;

use crate::error::{ActuationError, StoreError};
use crate::types::{QueueIdentity, ServiceIdentity};

/// Reads the backlog length from the shared key-value store.
pub trait QueueDepthProbe: Send {
    /// Establish a session and verify it with a round trip.
    fn connect(&mut self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Re-verify the session. Never errors; failure reads as `false`.
    fn is_connected(&mut self) -> impl Future<Output = bool> + Send;

    /// Number of waiting jobs. Unreadable queues count as empty.
    fn length(&mut self, queue: &QueueIdentity) -> impl Future<Output = u64> + Send;

    /// Release the session. Safe to call repeatedly.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

/// Counts running replicas of a service.
pub trait ReplicaCounter: Send + Sync {
    /// Running instances. Query failures count as zero.
    fn count(&self, service: &ServiceIdentity) -> impl Future<Output = u32> + Send;
}

/// Converges a service to an exact replica count.
pub trait Actuator: Send + Sync {
    /// Blocks until the orchestrator acknowledges or `timeout` elapses.
    fn scale_to(
        &self,
        service: &ServiceIdentity,
        target: u32,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), ActuationError>> + Send;
}
