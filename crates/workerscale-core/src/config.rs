//! Scaler configuration: raw settings from TOML and the environment,
//! resolved into validated, immutable types.
//!
//! Loading is two-phase. [`RawSettings`] collects optional values, first
//! from an optional TOML file and then from environment variables (which
//! win). [`ScalerConfig::resolve`] applies defaults and enforces every
//! invariant, failing with a [`ConfigError`] on the first violation.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{QueueIdentity, ServiceIdentity};

const DEFAULT_REDIS_HOST: &str = "redis";
const DEFAULT_REDIS_PORT: u64 = 6379;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
/// Every store call blocks the loop for up to this long.
const MAX_STORE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_QUEUE_PREFIX: &str = "bull";
const DEFAULT_QUEUE_NAME: &str = "jobs";
const DEFAULT_MIN_REPLICAS: u32 = 1;
const DEFAULT_MAX_REPLICAS: u32 = 5;
const DEFAULT_SCALE_UP_THRESHOLD: u64 = 5;
const DEFAULT_SCALE_DOWN_THRESHOLD: u64 = 0;
const DEFAULT_COMPOSE_FILE: &str = "/app/docker-compose.yml";
const DEFAULT_SERVICE_NAME: &str = "n8n-worker";
const DEFAULT_POLLING_INTERVAL_SECS: u64 = 30;
const DEFAULT_COOLDOWN_SECS: u64 = 120;
const DEFAULT_SCALE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 5;

// ── Validated config ───────────────────────────────────────────────

/// Replica bounds and hysteresis thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingConfig {
    min_replicas: u32,
    max_replicas: u32,
    scale_up_threshold: u64,
    scale_down_threshold: u64,
}

impl ScalingConfig {
    pub fn new(
        min_replicas: u32,
        max_replicas: u32,
        scale_up_threshold: u64,
        scale_down_threshold: u64,
    ) -> ConfigResult<Self> {
        if min_replicas < 1 {
            return Err(ConfigError::MinReplicasTooLow(min_replicas));
        }
        if max_replicas < min_replicas {
            return Err(ConfigError::ReplicaBounds {
                min: min_replicas,
                max: max_replicas,
            });
        }
        Ok(Self {
            min_replicas,
            max_replicas,
            scale_up_threshold,
            scale_down_threshold,
        })
    }

    pub fn min_replicas(&self) -> u32 {
        self.min_replicas
    }

    pub fn max_replicas(&self) -> u32 {
        self.max_replicas
    }

    pub fn scale_up_threshold(&self) -> u64 {
        self.scale_up_threshold
    }

    pub fn scale_down_threshold(&self) -> u64 {
        self.scale_down_threshold
    }

    /// True when there is no dead band between the thresholds. Scale-up
    /// then shadows scale-down for every queue length above the up
    /// threshold.
    pub fn thresholds_overlap(&self) -> bool {
        self.scale_down_threshold >= self.scale_up_threshold
    }
}

/// Loop cadence and the quiet period after an actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    polling_interval: Duration,
    cooldown_period: Duration,
}

impl TimingConfig {
    pub const MIN_POLLING_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(polling_interval: Duration, cooldown_period: Duration) -> ConfigResult<Self> {
        if polling_interval < Self::MIN_POLLING_INTERVAL {
            return Err(ConfigError::DurationTooShort {
                name: "polling interval",
                min: Self::MIN_POLLING_INTERVAL,
                actual: polling_interval,
            });
        }
        Ok(Self {
            polling_interval,
            cooldown_period,
        })
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    pub fn cooldown_period(&self) -> Duration {
        self.cooldown_period
    }
}

/// What to do when consecutive cycle failures pile up.
///
/// Each failure backs off `step * n` capped at `cap`. Once `n` reaches
/// `max_consecutive_errors` a fail-stop policy ends the loop; otherwise the
/// loop keeps retrying at the capped interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    max_consecutive_errors: u32,
    fail_stop: bool,
    backoff_step: Duration,
    backoff_cap: Duration,
}

impl FailurePolicy {
    pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 5;

    pub fn new(max_consecutive_errors: u32, fail_stop: bool) -> ConfigResult<Self> {
        if max_consecutive_errors == 0 {
            return Err(ConfigError::ZeroErrorBudget);
        }
        Ok(Self {
            max_consecutive_errors,
            fail_stop,
            backoff_step: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
        })
    }

    /// Override the linear backoff step and its ceiling.
    pub fn with_backoff(mut self, step: Duration, cap: Duration) -> Self {
        self.backoff_step = step;
        self.backoff_cap = cap;
        self
    }

    pub fn max_consecutive_errors(&self) -> u32 {
        self.max_consecutive_errors
    }

    pub fn fail_stop(&self) -> bool {
        self.fail_stop
    }

    /// Sleep after the `consecutive_errors`-th failure in a row.
    pub fn backoff(&self, consecutive_errors: u32) -> Duration {
        self.backoff_step
            .saturating_mul(consecutive_errors)
            .min(self.backoff_cap)
    }

    /// Whether the error budget is spent and the loop must stop.
    pub fn is_exhausted(&self, consecutive_errors: u32) -> bool {
        self.fail_stop && consecutive_errors >= self.max_consecutive_errors
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_consecutive_errors: Self::DEFAULT_MAX_CONSECUTIVE_ERRORS,
            fail_stop: true,
            backoff_step: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
        }
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Bound on connect and on every individual command.
    pub timeout: Duration,
}

/// Docker Compose settings for the scaled service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeSettings {
    pub compose_file: PathBuf,
    pub project_directory: Option<PathBuf>,
    pub service: ServiceIdentity,
}

/// The full, validated scaler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalerConfig {
    pub redis: RedisSettings,
    pub queue: QueueIdentity,
    pub scaling: ScalingConfig,
    pub compose: ComposeSettings,
    pub timing: TimingConfig,
    pub failure: FailurePolicy,
    /// Hard upper bound on a single actuation.
    pub scale_timeout: Duration,
}

impl ScalerConfig {
    /// Load from an optional TOML file overlaid with `lookup`.
    pub fn load(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let mut raw = match path {
            Some(path) => RawSettings::from_file(path)?,
            None => RawSettings::default(),
        };
        raw.apply_env(lookup)?;
        Self::resolve(raw)
    }

    /// Apply defaults and validate.
    pub fn resolve(raw: RawSettings) -> ConfigResult<Self> {
        let redis = resolve_redis(raw.redis)?;
        let queue = resolve_queue(raw.queue);

        let scaling = ScalingConfig::new(
            raw.scaling.min_replicas.unwrap_or(DEFAULT_MIN_REPLICAS),
            raw.scaling.max_replicas.unwrap_or(DEFAULT_MAX_REPLICAS),
            raw.scaling
                .scale_up_threshold
                .unwrap_or(DEFAULT_SCALE_UP_THRESHOLD),
            raw.scaling
                .scale_down_threshold
                .unwrap_or(DEFAULT_SCALE_DOWN_THRESHOLD),
        )?;
        if scaling.thresholds_overlap() {
            warn!(
                scale_up_threshold = scaling.scale_up_threshold(),
                scale_down_threshold = scaling.scale_down_threshold(),
                "scale-down threshold is not below scale-up threshold; scale-up takes precedence"
            );
        }

        let project = raw
            .compose
            .project_name
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::Missing("COMPOSE_PROJECT_NAME"))?;
        let compose = ComposeSettings {
            compose_file: raw
                .compose
                .file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPOSE_FILE)),
            project_directory: raw.compose.project_directory,
            service: ServiceIdentity::new(
                project,
                raw.compose
                    .service_name
                    .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            ),
        };

        let timing = TimingConfig::new(
            Duration::from_secs(
                raw.timing
                    .polling_interval_secs
                    .unwrap_or(DEFAULT_POLLING_INTERVAL_SECS),
            ),
            Duration::from_secs(raw.timing.cooldown_period_secs.unwrap_or(DEFAULT_COOLDOWN_SECS)),
        )?;

        let failure = FailurePolicy::new(
            raw.failure
                .max_consecutive_errors
                .unwrap_or(FailurePolicy::DEFAULT_MAX_CONSECUTIVE_ERRORS),
            raw.failure.fail_stop.unwrap_or(true),
        )?;

        Ok(Self {
            redis,
            queue,
            scaling,
            compose,
            timing,
            failure,
            scale_timeout: at_least_one_second(
                "scale timeout",
                raw.timing
                    .scale_timeout_secs
                    .unwrap_or(DEFAULT_SCALE_TIMEOUT_SECS),
            )?,
        })
    }
}

/// Settings for the read-only monitor. Orchestrator settings are not needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub redis: RedisSettings,
    pub queue: QueueIdentity,
    pub poll_interval: Duration,
}

impl MonitorConfig {
    pub fn load(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let mut raw = match path {
            Some(path) => RawSettings::from_file(path)?,
            None => RawSettings::default(),
        };
        raw.apply_env(lookup)?;
        Self::resolve(raw)
    }

    pub fn resolve(raw: RawSettings) -> ConfigResult<Self> {
        Ok(Self {
            redis: resolve_redis(raw.redis)?,
            queue: resolve_queue(raw.queue),
            poll_interval: at_least_one_second(
                "monitor poll interval",
                raw.timing
                    .monitor_interval_secs
                    .unwrap_or(DEFAULT_MONITOR_INTERVAL_SECS),
            )?,
        })
    }
}

fn resolve_redis(raw: RawRedis) -> ConfigResult<RedisSettings> {
    let port = raw.port.unwrap_or(DEFAULT_REDIS_PORT);
    if !(1..=u64::from(u16::MAX)).contains(&port) {
        return Err(ConfigError::PortOutOfRange(port));
    }
    Ok(RedisSettings {
        host: raw.host.unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string()),
        port: port as u16,
        password: raw.password,
        timeout: store_timeout(raw.timeout_secs.unwrap_or(DEFAULT_STORE_TIMEOUT_SECS))?,
    })
}

fn store_timeout(secs: u64) -> ConfigResult<Duration> {
    if !(1..=MAX_STORE_TIMEOUT_SECS).contains(&secs) {
        return Err(ConfigError::DurationOutOfRange {
            name: "store timeout",
            min: Duration::from_secs(1),
            max: Duration::from_secs(MAX_STORE_TIMEOUT_SECS),
            actual: Duration::from_secs(secs),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn resolve_queue(raw: RawQueue) -> QueueIdentity {
    QueueIdentity::new(
        raw.name_prefix
            .unwrap_or_else(|| DEFAULT_QUEUE_PREFIX.to_string()),
        raw.name.unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
    )
}

fn at_least_one_second(name: &'static str, secs: u64) -> ConfigResult<Duration> {
    let actual = Duration::from_secs(secs);
    if secs < 1 {
        return Err(ConfigError::DurationTooShort {
            name,
            min: Duration::from_secs(1),
            actual,
        });
    }
    Ok(actual)
}

// ── Raw settings ───────────────────────────────────────────────────

/// Unvalidated settings, as read from TOML and the environment.
///
/// ```toml
/// [redis]
/// host = "redis"
/// port = 6379
///
/// [scaling]
/// min_replicas = 1
/// max_replicas = 5
///
/// [compose]
/// project_name = "automation"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawSettings {
    pub redis: RawRedis,
    pub queue: RawQueue,
    pub scaling: RawScaling,
    pub compose: RawCompose,
    pub timing: RawTiming,
    pub failure: RawFailure,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawRedis {
    pub host: Option<String>,
    pub port: Option<u64>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawQueue {
    pub name_prefix: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawScaling {
    pub min_replicas: Option<u32>,
    pub max_replicas: Option<u32>,
    pub scale_up_threshold: Option<u64>,
    pub scale_down_threshold: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawCompose {
    pub file: Option<PathBuf>,
    pub project_name: Option<String>,
    pub project_directory: Option<PathBuf>,
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawTiming {
    pub polling_interval_secs: Option<u64>,
    pub cooldown_period_secs: Option<u64>,
    pub scale_timeout_secs: Option<u64>,
    pub monitor_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawFailure {
    pub max_consecutive_errors: Option<u32>,
    pub fail_stop: Option<bool>,
}

impl RawSettings {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overlay environment values. Blank values are treated as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("REDIS_HOST") {
            self.redis.host = Some(v);
        }
        if let Some(v) = get("REDIS_PORT") {
            self.redis.port = Some(parse_value("REDIS_PORT", &v)?);
        }
        if let Some(v) = get("REDIS_PASSWORD") {
            self.redis.password = Some(v);
        }
        if let Some(v) = get("REDIS_TIMEOUT_SECONDS") {
            self.redis.timeout_secs = Some(parse_value("REDIS_TIMEOUT_SECONDS", &v)?);
        }

        if let Some(v) = get("QUEUE_NAME_PREFIX") {
            self.queue.name_prefix = Some(v);
        }
        if let Some(v) = get("QUEUE_NAME") {
            self.queue.name = Some(v);
        }

        if let Some(v) = get("MIN_REPLICAS") {
            self.scaling.min_replicas = Some(parse_value("MIN_REPLICAS", &v)?);
        }
        if let Some(v) = get("MAX_REPLICAS") {
            self.scaling.max_replicas = Some(parse_value("MAX_REPLICAS", &v)?);
        }
        if let Some(v) = get("SCALE_UP_QUEUE_THRESHOLD") {
            self.scaling.scale_up_threshold = Some(parse_value("SCALE_UP_QUEUE_THRESHOLD", &v)?);
        }
        if let Some(v) = get("SCALE_DOWN_QUEUE_THRESHOLD") {
            self.scaling.scale_down_threshold =
                Some(parse_value("SCALE_DOWN_QUEUE_THRESHOLD", &v)?);
        }

        if let Some(v) = get("COMPOSE_FILE_PATH") {
            self.compose.file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("COMPOSE_PROJECT_NAME") {
            self.compose.project_name = Some(v);
        }
        if let Some(v) = get("COMPOSE_PROJECT_DIRECTORY") {
            self.compose.project_directory = Some(PathBuf::from(v));
        }
        if let Some(v) = get("WORKER_SERVICE_NAME").or_else(|| get("N8N_WORKER_SERVICE_NAME")) {
            self.compose.service_name = Some(v);
        }

        if let Some(v) = get("POLLING_INTERVAL_SECONDS") {
            self.timing.polling_interval_secs = Some(parse_value("POLLING_INTERVAL_SECONDS", &v)?);
        }
        if let Some(v) = get("COOLDOWN_PERIOD_SECONDS") {
            self.timing.cooldown_period_secs = Some(parse_value("COOLDOWN_PERIOD_SECONDS", &v)?);
        }
        if let Some(v) = get("SCALE_TIMEOUT_SECONDS") {
            self.timing.scale_timeout_secs = Some(parse_value("SCALE_TIMEOUT_SECONDS", &v)?);
        }
        if let Some(v) = get("MONITOR_POLL_INTERVAL_SECONDS") {
            self.timing.monitor_interval_secs =
                Some(parse_value("MONITOR_POLL_INTERVAL_SECONDS", &v)?);
        }

        if let Some(v) = get("MAX_CONSECUTIVE_ERRORS") {
            self.failure.max_consecutive_errors = Some(parse_value("MAX_CONSECUTIVE_ERRORS", &v)?);
        }
        if let Some(v) = get("FAIL_STOP") {
            self.failure.fail_stop = Some(parse_bool("FAIL_STOP", &v)?);
        }

        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

fn parse_bool(key: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
