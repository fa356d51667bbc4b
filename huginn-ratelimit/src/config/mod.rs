mod loader;
mod types;

pub use loader::{from_str, load_from_path, validate_config};
pub use types::{
    BackendKind, CacheConfig, Config, HashKind, LimitBy, LoggingConfig, RateLimitConfig,
    TelemetryConfig,
};
