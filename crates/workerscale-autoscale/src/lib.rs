//! workerscale-autoscale — queue-driven replica scaling.
//!
//! Samples the job backlog and the running replica count, and moves the
//! replica count one step at a time between configured bounds. Cooldown
//! after each actuation prevents thrashing; consecutive failures back off
//! linearly and, under a fail-stop policy, end the loop.
//!
//! # Scaling Algorithm
//!
//! ```text
//! if queue > scale_up_threshold and replicas < max:
//!     ScaleTo(replicas + 1)
//!
//! elif queue <= scale_down_threshold and replicas > min:
//!     ScaleTo(replicas - 1)
//!
//! else:
//!     NoChange   // dead band, or already at a bound
//! ```
//!
//! # Loop
//!
//! ```text
//! Polling ──actuation──▶ Cooldown ──elapsed──▶ Polling
//!    │                                            ▲
//!    └──failure──▶ Backoff ──sleep n*2s (≤60s)────┘
//!                     │
//!                     └──n ≥ budget──▶ Stopped
//! ```
//!
//! Cancellation is checked once per iteration. An in-flight store query
//! or actuation always runs to completion or to its own timeout.

pub mod control;
pub mod scaler;

pub use control::{ControlLoop, CycleError, LoopExit, LoopPhase, LoopSettings, LoopState};
pub use scaler::{decide, ScalingDecision};
