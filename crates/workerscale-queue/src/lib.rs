//! workerscale-queue — backlog depth from Redis.
//!
//! Queue libraries have named the waiting-jobs list differently over the
//! years, so the probe tries each known key in a fixed order and reports
//! the first one that holds a list:
//!
//! ```text
//! <prefix>:<name>:wait      current
//! <prefix>:<name>:waiting   older releases
//! <prefix>:<name>           legacy, no suffix
//! ```
//!
//! Missing keys and keys of another type are skipped. Store errors on a
//! single key are logged and skipped. When nothing usable is found the
//! queue is reported empty so the scaler keeps making decisions.
//!
//! The key logic is written against [`KeyReader`] so it can be exercised
//! without a live server; [`RedisQueueProbe`] plugs a Redis session into it.

pub mod monitor;
pub mod probe;
pub mod stats;

pub use monitor::{MonitorExit, QueueMonitor, StatsProbe};
pub use probe::{queue_length, read_list_length, KeyReadError, KeyReader, RedisQueueProbe};
pub use stats::{collect_stats, QueueStats};
