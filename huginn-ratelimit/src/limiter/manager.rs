use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{LimiterStore, RateLimitResult, TokenBucket};
use crate::backend::CacheBackend;
use crate::config::{CacheConfig, RateLimitConfig};
use crate::error::Result;
use crate::telemetry::Metrics;

/// Which bucket rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    /// The bucket shared by every client of the route
    Route,
    /// The calling client's own bucket
    Client,
}

impl LimitScope {
    pub fn as_str(self) -> &'static str {
        match self {
            LimitScope::Route => "route",
            LimitScope::Client => "client",
        }
    }
}

/// Outcome of [`RateLimitManager::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        /// Client bucket state, when a client limit is configured
        client: Option<RateLimitResult>,
    },
    Limited {
        scope: LimitScope,
        limit: u64,
        reset_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Rate limiters guarding one route
///
/// This struct holds:
/// - A route-wide token bucket (optional), shared by all clients
/// - A per-client limiter store (optional), one bucket per client key
///
pub struct RateLimitManager {
    route: Option<TokenBucket>,
    clients: Option<LimiterStore>,
}

impl RateLimitManager {
    /// Create a rate limit manager from configuration
    ///
    /// # Arguments
    /// * `config` - Token bucket settings
    /// * `cache` - Backend settings for per-client buckets
    /// * `cancel` - Stops the backend sweepers
    pub fn new(
        config: &RateLimitConfig,
        cache: &CacheConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        if !config.enabled {
            return Ok(Self { route: None, clients: None });
        }

        let every = config.every();
        let route = (config.max_rate > 0.0)
            .then(|| TokenBucket::new(config.max_rate, config.route_capacity(), every));

        let clients = if config.client_max_rate > 0.0 {
            let backend = CacheBackend::from_config(cache, cancel)?;
            let rate = config.client_max_rate;
            let capacity = config.client_bucket_capacity();
            Some(LimiterStore::new(backend, move || TokenBucket::new(rate, capacity, every)))
        } else {
            None
        };

        info!(
            route_limit = route.is_some(),
            client_limit = clients.is_some(),
            limit_by = config.limit_by.as_str(),
            "Rate limiting configured"
        );

        Ok(Self { route, clients })
    }

    pub fn with_limiters(route: Option<TokenBucket>, clients: Option<LimiterStore>) -> Self {
        Self { route, clients }
    }

    /// Check if a request from `key` is allowed
    ///
    /// The route-wide bucket is consulted first: a request rejected there does
    /// not consume a token from the client bucket.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        if let Some(route) = &self.route {
            if let RateLimitResult::Limited { limit, reset_after, .. } = route.check() {
                return RateLimitDecision::Limited { scope: LimitScope::Route, limit, reset_after };
            }
        }

        let Some(clients) = &self.clients else {
            return RateLimitDecision::Allowed { client: None };
        };

        match clients.check(key) {
            RateLimitResult::Limited { limit, reset_after, .. } => {
                RateLimitDecision::Limited { scope: LimitScope::Client, limit, reset_after }
            }
            allowed => RateLimitDecision::Allowed { client: Some(allowed) },
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.route.is_some() || self.clients.is_some()
    }

    pub fn clients(&self) -> Option<&LimiterStore> {
        self.clients.as_ref()
    }

    /// Publish the client backend counters. Locks every partition briefly, so
    /// call it from a periodic task rather than per request.
    pub fn report_cache_metrics(&self, route: &str, metrics: &Metrics) {
        if let Some(clients) = &self.clients {
            metrics.record_cache_stats(route, clients.tracked_keys(), clients.stats());
        }
    }
}
