//! Read-only queue monitor.
//!
//! Logs the backlog depth on every poll and a per-state breakdown every
//! [`QueueMonitor::STATS_EVERY`] polls. Never touches the orchestrator.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use workerscale_core::{FailurePolicy, QueueDepthProbe, QueueIdentity, StoreError};

use crate::probe::RedisQueueProbe;
use crate::stats::QueueStats;

/// A probe that can also break the backlog down by job state.
pub trait StatsProbe: QueueDepthProbe {
    fn stats(&mut self, queue: &QueueIdentity) -> impl Future<Output = QueueStats> + Send;
}

impl StatsProbe for RedisQueueProbe {
    async fn stats(&mut self, queue: &QueueIdentity) -> QueueStats {
        RedisQueueProbe::stats(self, queue).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    Cancelled,
    BudgetExhausted { consecutive_errors: u32 },
}

pub struct QueueMonitor<P> {
    probe: P,
    queue: QueueIdentity,
    interval: Duration,
    failure: FailurePolicy,
}

impl<P: StatsProbe> QueueMonitor<P> {
    /// Detailed stats cadence, in polls.
    pub const STATS_EVERY: u64 = 12;

    /// Five reconnect failures in a row end the monitor.
    pub fn default_failure_policy() -> FailurePolicy {
        FailurePolicy::default().with_backoff(Duration::from_secs(2), Duration::from_secs(30))
    }

    pub fn new(probe: P, queue: QueueIdentity, interval: Duration) -> Self {
        Self {
            probe,
            queue,
            interval,
            failure: Self::default_failure_policy(),
        }
    }

    pub fn with_failure_policy(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }

    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> MonitorExit {
        info!(queue = %self.queue, poll_interval_secs = self.interval.as_secs(), "queue monitoring started");

        let mut polls: u64 = 0;
        let mut consecutive_errors: u32 = 0;

        let exit = loop {
            if *shutdown.borrow() {
                break MonitorExit::Cancelled;
            }

            let pause = match self.poll(&mut polls).await {
                Ok(()) => {
                    consecutive_errors = 0;
                    self.interval
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error!(error = %e, consecutive_errors, "error in monitoring loop");
                    if self.failure.is_exhausted(consecutive_errors) {
                        error!("max consecutive errors reached, shutting down");
                        break MonitorExit::BudgetExhausted { consecutive_errors };
                    }
                    self.failure.backoff(consecutive_errors)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break MonitorExit::Cancelled;
                    }
                }
            }
        };

        self.probe.disconnect().await;
        info!(?exit, "queue monitor stopped");
        exit
    }

    async fn poll(&mut self, polls: &mut u64) -> Result<(), StoreError> {
        if !self.probe.is_connected().await {
            warn!("redis connection lost, attempting to reconnect");
            self.probe.connect().await?;
        }

        let waiting_jobs = self.probe.length(&self.queue).await;
        info!(queue = %self.queue, waiting_jobs, "queue metrics");

        *polls += 1;
        if *polls % Self::STATS_EVERY == 0 {
            let stats = self.probe.stats(&self.queue).await;
            info!(queue = %self.queue, %stats, "detailed queue stats");
        }
        Ok(())
    }
}
