//! Control loop: polling cadence, cooldown and the error budget.
//!
//! One task, one cycle at a time: probe the queue, count replicas, decide,
//! and actuate at most once. [`LoopState`] is plain owned data; nothing
//! else reads or writes it while the loop runs.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use workerscale_core::{
    ActuationError, Actuator, FailurePolicy, QueueDepthProbe, QueueIdentity, ReplicaCounter,
    ScalerConfig, ScalingConfig, ServiceIdentity, StoreError, TimingConfig,
};

use crate::scaler::{decide, ScalingDecision};

/// Where the loop is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Polling,
    Cooldown,
    Backoff,
    Stopped,
}

/// Mutable loop bookkeeping.
#[derive(Debug, Clone)]
pub struct LoopState {
    running: bool,
    /// `None` until the first successful actuation.
    last_scale_time: Option<Instant>,
    consecutive_errors: u32,
    phase: LoopPhase,
}

impl LoopState {
    fn new() -> Self {
        Self {
            running: false,
            last_scale_time: None,
            consecutive_errors: 0,
            phase: LoopPhase::Polling,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn last_scale_time(&self) -> Option<Instant> {
        self.last_scale_time
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }
}

/// Why [`ControlLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown was requested.
    Cancelled,
    /// The consecutive-error budget ran out under a fail-stop policy.
    BudgetExhausted { consecutive_errors: u32 },
}

/// A cycle that counts against the error budget.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("store reconnect failed: {0}")]
    Reconnect(#[from] StoreError),

    #[error("scaling to {target} replicas failed: {source}")]
    Actuation {
        target: u32,
        #[source]
        source: ActuationError,
    },
}

/// What a successful cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CycleOutcome {
    /// Still inside the cooldown window; nothing was measured.
    CoolingDown { remaining: Duration },
    /// Measured, nothing to do.
    Steady,
    /// Measured and actuated.
    Scaled(ScalingDecision),
}

/// Everything the loop needs from the configuration.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub queue: QueueIdentity,
    pub service: ServiceIdentity,
    pub scaling: ScalingConfig,
    pub timing: TimingConfig,
    pub failure: FailurePolicy,
    pub scale_timeout: Duration,
}

impl From<&ScalerConfig> for LoopSettings {
    fn from(config: &ScalerConfig) -> Self {
        Self {
            queue: config.queue.clone(),
            service: config.compose.service.clone(),
            scaling: config.scaling,
            timing: config.timing,
            failure: config.failure,
            scale_timeout: config.scale_timeout,
        }
    }
}

/// The autoscaling control loop.
pub struct ControlLoop<P, R, A> {
    probe: P,
    replicas: R,
    actuator: A,
    settings: LoopSettings,
    state: LoopState,
}

impl<P, R, A> ControlLoop<P, R, A>
where
    P: QueueDepthProbe,
    R: ReplicaCounter,
    A: Actuator,
{
    pub fn new(probe: P, replicas: R, actuator: A, settings: LoopSettings) -> Self {
        Self {
            probe,
            replicas,
            actuator,
            settings,
            state: LoopState::new(),
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Run until cancelled or the error budget is exhausted.
    ///
    /// Sleeps end early when `shutdown` flips to `true` (or its sender is
    /// dropped). The store session is released before returning.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> LoopExit {
        self.state.running = true;
        self.state.phase = LoopPhase::Polling;

        info!(
            service = %self.settings.service,
            queue = %self.settings.queue,
            polling_interval_secs = self.settings.timing.polling_interval().as_secs(),
            "control loop started"
        );

        let exit = loop {
            if *shutdown.borrow() {
                self.state.running = false;
            }
            if !self.state.running {
                info!("shutdown requested");
                break LoopExit::Cancelled;
            }

            let pause = match self.cycle().await {
                Ok(CycleOutcome::CoolingDown { remaining }) => {
                    self.state.phase = LoopPhase::Cooldown;
                    debug!(remaining_secs = remaining.as_secs(), "in cooldown period");
                    self.settings.timing.polling_interval()
                }
                Ok(CycleOutcome::Steady | CycleOutcome::Scaled(_)) => {
                    self.state.consecutive_errors = 0;
                    self.state.phase = LoopPhase::Polling;
                    self.settings.timing.polling_interval()
                }
                Err(e) => {
                    self.state.consecutive_errors += 1;
                    self.state.phase = LoopPhase::Backoff;
                    let consecutive_errors = self.state.consecutive_errors;
                    error!(
                        service = %self.settings.service,
                        error = %e,
                        consecutive_errors,
                        "error in scaling loop"
                    );

                    if self.settings.failure.is_exhausted(consecutive_errors) {
                        error!(consecutive_errors, "max consecutive errors reached, shutting down");
                        break LoopExit::BudgetExhausted { consecutive_errors };
                    }

                    let backoff = self.settings.failure.backoff(consecutive_errors);
                    warn!(
                        consecutive_errors,
                        backoff_secs = backoff.as_secs(),
                        "backing off due to errors"
                    );
                    backoff
                }
            };

            self.pause(pause, &mut shutdown).await;
        };

        self.probe.disconnect().await;
        self.state.running = false;
        self.state.phase = LoopPhase::Stopped;
        info!(?exit, "control loop stopped");
        exit
    }

    /// One pass of the state machine, without sleeping.
    async fn cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        if let Some(remaining) = self.cooldown_remaining() {
            return Ok(CycleOutcome::CoolingDown { remaining });
        }

        if !self.probe.is_connected().await {
            warn!("redis connection lost, attempting to reconnect");
            self.probe.connect().await?;
        }

        let queue_length = self.probe.length(&self.settings.queue).await;
        let current_replicas = self.replicas.count(&self.settings.service).await;
        info!(queue_length, current_replicas, "current metrics");

        let Some(decision) = decide(queue_length, current_replicas, &self.settings.scaling) else {
            debug!("no scaling action needed");
            return Ok(CycleOutcome::Steady);
        };

        info!(
            service = %self.settings.service,
            from = current_replicas,
            target_replicas = decision.target_replicas,
            reason = %decision.reason,
            "scaling decision made"
        );

        match self
            .actuator
            .scale_to(
                &self.settings.service,
                decision.target_replicas,
                self.settings.scale_timeout,
            )
            .await
        {
            Ok(()) => {
                self.state.last_scale_time = Some(Instant::now());
                info!(new_replicas = decision.target_replicas, "scaling completed successfully");
                Ok(CycleOutcome::Scaled(decision))
            }
            Err(source) => Err(CycleError::Actuation {
                target: decision.target_replicas,
                source,
            }),
        }
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        let last = self.state.last_scale_time?;
        let cooldown = self.settings.timing.cooldown_period();
        let elapsed = last.elapsed();
        (elapsed < cooldown).then(|| cooldown - elapsed)
    }

    async fn pause(&mut self, duration: Duration, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    self.state.running = false;
                }
            }
        }
    }
}
