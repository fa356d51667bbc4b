use std::fs;
use std::path::Path;

use crate::config::{BackendKind, Config, LimitBy};
use crate::error::{RateLimitError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| RateLimitError::Config(format!("Failed to read config file: {e}")))?;
    from_str(&txt)
}

pub fn from_str(txt: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(txt)
        .map_err(|e| RateLimitError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> Result<()> {
    let cache = &cfg.cache;
    if cache.kind == BackendKind::Sharded && cache.partitions == 0 {
        return Err(RateLimitError::Config("cache.partitions must be > 0".to_string()));
    }
    if cache.ttl_ms == 0 {
        return Err(RateLimitError::Config("cache.ttl_ms must be > 0".to_string()));
    }
    if let Some(sweep) = cache.sweep_interval_ms {
        if sweep == 0 || sweep > cache.ttl_ms {
            return Err(RateLimitError::Config(format!(
                "cache.sweep_interval_ms must be between 1 and ttl_ms ({}), got {sweep}",
                cache.ttl_ms
            )));
        }
    }

    let rl = &cfg.rate_limit;
    if rl.every_ms == 0 {
        return Err(RateLimitError::Config("rate_limit.every_ms must be > 0".to_string()));
    }
    for (name, rate) in [("max_rate", rl.max_rate), ("client_max_rate", rl.client_max_rate)] {
        if !rate.is_finite() || rate < 0.0 {
            return Err(RateLimitError::Config(format!(
                "rate_limit.{name} must be a finite, non-negative number"
            )));
        }
    }
    if rl.limit_by == LimitBy::Header
        && rl.limit_by_header.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        return Err(RateLimitError::Config(
            "rate_limit.limit_by_header is required when limit_by = \"header\"".to_string(),
        ));
    }

    Ok(())
}
