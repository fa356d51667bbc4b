#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod error;
pub mod limiter;
pub mod telemetry;

pub use backend::{
    ahash64, pseudo_fnv64a, Backend, CacheBackend, HashFunction, MemoryBackend,
    ShardedMemoryBackend, StatsSnapshot,
};
pub use config::{load_from_path, CacheConfig, Config, LimitBy, RateLimitConfig};
pub use error::{RateLimitError, Result};
pub use limiter::{
    check_rate_limit, extract_rate_limit_key, LimiterStore, RateLimitDecision, RateLimitManager,
    RateLimitResult, TokenBucket,
};
