//! Queue depth probe.
//!
//! [`queue_length`] walks the candidate keys of a queue through any
//! [`KeyReader`]. [`RedisQueueProbe`] owns the Redis session, bounds every
//! call with the configured timeout, and implements the control loop's
//! [`QueueDepthProbe`] trait.

use std::future::Future;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};
use tracing::{debug, error, info, warn};

use workerscale_core::{QueueDepthProbe, QueueIdentity, RedisSettings, StoreError};

use crate::stats::{collect_stats, QueueStats};

/// Why a single key could not be measured.
#[derive(Debug, thiserror::Error)]
pub enum KeyReadError {
    #[error("key does not exist")]
    Missing,

    #[error("key holds a {0}, not a list")]
    WrongType(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Minimal read access to the key space.
pub trait KeyReader: Send {
    /// Redis `TYPE`: `"none"` for a missing key.
    fn key_type(&mut self, key: &str) -> impl Future<Output = Result<String, KeyReadError>> + Send;

    /// Redis `LLEN`.
    fn list_len(&mut self, key: &str) -> impl Future<Output = Result<u64, KeyReadError>> + Send;

    /// Redis `ZCARD`.
    fn sorted_set_len(
        &mut self,
        key: &str,
    ) -> impl Future<Output = Result<u64, KeyReadError>> + Send;
}

/// Length of `key` if it holds a list.
///
/// `LLEN` reports 0 for a missing key, so the type is checked first to
/// tell "empty" apart from "absent".
pub async fn read_list_length<R: KeyReader>(reader: &mut R, key: &str) -> Result<u64, KeyReadError> {
    match reader.key_type(key).await?.as_str() {
        "list" => reader.list_len(key).await,
        "none" => Err(KeyReadError::Missing),
        other => Err(KeyReadError::WrongType(other.to_string())),
    }
}

/// Waiting-job count of `queue`, or 0 when no candidate key is usable.
pub async fn queue_length<R: KeyReader>(reader: &mut R, queue: &QueueIdentity) -> u64 {
    let candidates = queue.candidate_keys();

    for key in &candidates {
        match read_list_length(reader, key).await {
            Ok(length) => {
                debug!(%key, length, "queue length retrieved");
                return length;
            }
            Err(e @ (KeyReadError::Missing | KeyReadError::WrongType(_))) => {
                debug!(%key, error = %e, "queue key not usable");
            }
            Err(KeyReadError::Store(e)) => {
                warn!(%key, error = %e, "error checking queue key");
            }
        }
    }

    warn!(patterns = ?candidates, "no valid queue keys found, assuming length 0");
    0
}

// ── Redis session ──────────────────────────────────────────────────

/// An established Redis session with a per-call timeout.
struct RedisSession {
    conn: MultiplexedConnection,
    timeout: Duration,
}

impl RedisSession {
    async fn query<T: redis::FromRedisValue>(&mut self, cmd: redis::Cmd) -> Result<T, KeyReadError> {
        match tokio::time::timeout(self.timeout, cmd.query_async(&mut self.conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(e)),
            Err(_) => Err(StoreError::TimedOut(self.timeout).into()),
        }
    }

    async fn ping(&mut self) -> Result<(), StoreError> {
        match self.query::<String>(redis::cmd("PING")).await {
            Ok(_) => Ok(()),
            Err(KeyReadError::Store(e)) => Err(e),
            Err(e) => Err(StoreError::Command(e.to_string())),
        }
    }
}

impl KeyReader for RedisSession {
    async fn key_type(&mut self, key: &str) -> Result<String, KeyReadError> {
        let mut cmd = redis::cmd("TYPE");
        cmd.arg(key);
        self.query(cmd).await
    }

    async fn list_len(&mut self, key: &str) -> Result<u64, KeyReadError> {
        let mut cmd = redis::cmd("LLEN");
        cmd.arg(key);
        self.query(cmd).await
    }

    async fn sorted_set_len(&mut self, key: &str) -> Result<u64, KeyReadError> {
        let mut cmd = redis::cmd("ZCARD");
        cmd.arg(key);
        self.query(cmd).await
    }
}

fn classify(e: RedisError) -> KeyReadError {
    let unreachable = e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal();
    classify_reply(e.code(), unreachable, e.to_string())
}

/// Server error code first, then transport state.
fn classify_reply(code: Option<&str>, unreachable: bool, message: String) -> KeyReadError {
    if code == Some("WRONGTYPE") {
        KeyReadError::WrongType(message)
    } else if unreachable {
        StoreError::Unreachable(message).into()
    } else {
        StoreError::Command(message).into()
    }
}

/// Redis-backed [`QueueDepthProbe`].
pub struct RedisQueueProbe {
    settings: RedisSettings,
    session: Option<RedisSession>,
}

impl RedisQueueProbe {
    pub fn new(settings: RedisSettings) -> Self {
        Self {
            settings,
            session: None,
        }
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.settings.host.clone(), self.settings.port),
            redis: RedisConnectionInfo {
                password: self.settings.password.clone(),
                ..Default::default()
            },
        }
    }

    /// Counts for every known queue state. All zero when not connected.
    pub async fn stats(&mut self, queue: &QueueIdentity) -> QueueStats {
        match self.session.as_mut() {
            Some(session) => collect_stats(session, queue).await,
            None => QueueStats::default(),
        }
    }
}

impl QueueDepthProbe for RedisQueueProbe {
    async fn connect(&mut self) -> Result<(), StoreError> {
        let host = self.settings.host.clone();
        let port = self.settings.port;
        let timeout = self.settings.timeout;

        let client = redis::Client::open(self.connection_info())
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let conn = match tokio::time::timeout(timeout, client.get_multiplexed_async_connection()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                error!(%host, port, error = %e, "failed to connect to redis");
                return Err(StoreError::Unreachable(e.to_string()));
            }
            Err(_) => {
                error!(%host, port, ?timeout, "redis connect timed out");
                return Err(StoreError::TimedOut(timeout));
            }
        };

        let mut session = RedisSession { conn, timeout };
        if let Err(e) = session.ping().await {
            error!(%host, port, error = %e, "redis did not answer ping");
            return Err(e);
        }

        self.session = Some(session);
        info!(%host, port, "connected to redis");
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.ping().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "redis liveness check failed");
                false
            }
        }
    }

    async fn length(&mut self, queue: &QueueIdentity) -> u64 {
        match self.session.as_mut() {
            Some(session) => queue_length(session, queue).await,
            None => {
                error!(%queue, "redis client not connected");
                0
            }
        }
    }

    async fn disconnect(&mut self) {
        if self.session.take().is_some() {
            info!("redis connection closed");
        }
    }
}
