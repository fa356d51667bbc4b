use serde::Deserialize;
use std::time::Duration;

/// Which backend implementation holds limiter state
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One map, one lock
    Memory,
    /// Many independently locked partitions
    #[default]
    Sharded,
}

/// Hash function used to pick a partition
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    /// FNV-1a 64
    #[default]
    Fnv,
    /// ahash with fixed seeds
    Ahash,
}

/// Limiter state cache configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    /// Backend implementation
    /// Default: "sharded"
    #[serde(default)]
    pub kind: BackendKind,
    /// Number of partitions (sharded backend only)
    /// Default: 256
    #[serde(default = "default_partitions")]
    pub partitions: usize,
    /// Time an entry stays live after being written, in milliseconds
    /// Default: 600000 (10 minutes)
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// How often expired entries are swept, in milliseconds
    /// Must not exceed `ttl_ms`
    /// Default: same as `ttl_ms`
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,
    /// Partition selector
    /// Default: "fnv"
    #[serde(default)]
    pub hash: HashKind,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.unwrap_or(self.ttl_ms))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            partitions: default_partitions(),
            ttl_ms: default_ttl_ms(),
            sweep_interval_ms: None,
            hash: HashKind::default(),
        }
    }
}

fn default_partitions() -> usize {
    256
}

fn default_ttl_ms() -> u64 {
    600_000 // 10 minutes
}

/// Rate limiting key extraction strategy
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LimitBy {
    /// Rate limit by client IP address
    #[default]
    Ip,
    /// Rate limit by the value of a request header (API key, token)
    Header,
    /// All clients of a route share one limit
    Route,
    /// Client IP and route together
    Combined,
}

impl LimitBy {
    pub fn as_str(self) -> &'static str {
        match self {
            LimitBy::Ip => "ip",
            LimitBy::Header => "header",
            LimitBy::Route => "route",
            LimitBy::Combined => "combined",
        }
    }
}

/// Rate limiting configuration
///
/// Two independent token buckets can guard a route: one shared by every
/// client (`max_rate`/`capacity`) and one per client key
/// (`client_max_rate`/`client_capacity`). A rate of 0 disables that bucket.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Tokens added per `every_ms` to the route-wide bucket
    /// Default: 0 (disabled)
    #[serde(default)]
    pub max_rate: f64,
    /// Route-wide bucket size
    /// Default: same as `max_rate` rounded up
    #[serde(default)]
    pub capacity: Option<u64>,
    /// Tokens added per `every_ms` to each client bucket
    /// Default: 0 (disabled)
    #[serde(default)]
    pub client_max_rate: f64,
    /// Client bucket size
    /// Default: same as `client_max_rate` rounded up
    #[serde(default)]
    pub client_capacity: Option<u64>,
    /// Refill period in milliseconds
    /// Default: 1000
    #[serde(default = "default_every_ms")]
    pub every_ms: u64,
    /// Key extraction strategy
    /// Default: "ip"
    #[serde(default)]
    pub limit_by: LimitBy,
    /// Custom header name for "header" limit_by mode
    /// Required when limit_by = "header"
    pub limit_by_header: Option<String>,
}

impl RateLimitConfig {
    pub fn every(&self) -> Duration {
        Duration::from_millis(self.every_ms)
    }

    pub fn route_capacity(&self) -> u64 {
        self.capacity.unwrap_or_else(|| default_capacity(self.max_rate))
    }

    pub fn client_bucket_capacity(&self) -> u64 {
        self.client_capacity
            .unwrap_or_else(|| default_capacity(self.client_max_rate))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_rate: 0.0,
            capacity: None,
            client_max_rate: 0.0,
            client_capacity: None,
            every_ms: default_every_ms(),
            limit_by: LimitBy::default(),
            limit_by_header: None,
        }
    }
}

fn default_every_ms() -> u64 {
    1000
}

fn default_capacity(rate: f64) -> u64 {
    if rate.is_finite() && rate > 0.0 {
        rate.ceil() as u64
    } else {
        0
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    /// Export rate limit counters to a Prometheus registry
    /// Default: false
    #[serde(default)]
    pub metrics_enabled: bool,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Limiter state cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token bucket limits
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Metrics configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
