//! Per-state job counts for the read-only monitor.

use std::fmt;

use tracing::debug;

use workerscale_core::QueueIdentity;

use crate::probe::KeyReader;

/// Job counts by queue state. Unreadable states count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub wait: u64,
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

impl QueueStats {
    pub const STATES: [&'static str; 6] =
        ["wait", "waiting", "active", "completed", "failed", "delayed"];

    fn slot(&mut self, state: &str) -> Option<&mut u64> {
        match state {
            "wait" => Some(&mut self.wait),
            "waiting" => Some(&mut self.waiting),
            "active" => Some(&mut self.active),
            "completed" => Some(&mut self.completed),
            "failed" => Some(&mut self.failed),
            "delayed" => Some(&mut self.delayed),
            _ => None,
        }
    }
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wait={} waiting={} active={} completed={} failed={} delayed={}",
            self.wait, self.waiting, self.active, self.completed, self.failed, self.delayed
        )
    }
}

/// Read every state key of `queue`. Lists are measured with `LLEN`, sorted
/// sets with `ZCARD`; anything else reads as zero.
pub async fn collect_stats<R: KeyReader>(reader: &mut R, queue: &QueueIdentity) -> QueueStats {
    let mut stats = QueueStats::default();

    for state in QueueStats::STATES {
        let key = queue.state_key(state);
        let count = match reader.key_type(&key).await {
            Ok(kind) if kind == "list" => reader.list_len(&key).await,
            Ok(kind) if kind == "zset" => reader.sorted_set_len(&key).await,
            Ok(_) => Ok(0),
            Err(e) => Err(e),
        };
        let count = count.unwrap_or_else(|e| {
            debug!(%key, error = %e, "queue state unreadable");
            0
        });
        if let Some(slot) = stats.slot(state) {
            *slot = count;
        }
    }

    stats
}
