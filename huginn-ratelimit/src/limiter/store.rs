use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::bucket::{RateLimitResult, TokenBucket};
use crate::backend::{
    pseudo_fnv64a, Backend, CacheBackend, MemoryBackend, ShardedMemoryBackend, StatsSnapshot,
};
use crate::error::Result;

type LimiterConstructor = Arc<dyn Fn() -> TokenBucket + Send + Sync>;

/// Hands out one [`TokenBucket`] per key, creating it on first use.
///
/// Buckets live in a [`CacheBackend`], so a client that goes quiet for longer
/// than the backend TTL has its bucket dropped and gets a fresh, full one on
/// its next request.
#[derive(Clone)]
pub struct LimiterStore {
    backend: CacheBackend<Arc<TokenBucket>>,
    constructor: LimiterConstructor,
}

impl LimiterStore {
    pub fn new<F>(backend: CacheBackend<Arc<TokenBucket>>, constructor: F) -> Self
    where
        F: Fn() -> TokenBucket + Send + Sync + 'static,
    {
        Self { backend, constructor: Arc::new(constructor) }
    }

    /// Buckets of `rate` tokens per `every` and size `capacity`, kept in a single partition.
    pub fn memory(
        cancel: CancellationToken,
        rate: f64,
        capacity: u64,
        every: Duration,
        ttl: Duration,
    ) -> Result<Self> {
        let backend = MemoryBackend::new(cancel, ttl)?;
        Ok(Self::new(CacheBackend::Memory(backend), move || {
            TokenBucket::new(rate, capacity, every)
        }))
    }

    /// Buckets of `rate` tokens per `every` and size `capacity`, spread over `partitions`.
    pub fn sharded(
        cancel: CancellationToken,
        rate: f64,
        capacity: u64,
        every: Duration,
        partitions: usize,
        ttl: Duration,
    ) -> Result<Self> {
        let backend = ShardedMemoryBackend::new(cancel, partitions, ttl, pseudo_fnv64a)?;
        Ok(Self::new(CacheBackend::Sharded(backend), move || {
            TokenBucket::new(rate, capacity, every)
        }))
    }

    /// The bucket for `key`, created if missing or expired.
    pub fn limiter_for(&self, key: &str) -> Arc<TokenBucket> {
        self.backend.load(key, || Arc::new((self.constructor)()))
    }

    pub fn allow(&self, key: &str) -> bool {
        self.limiter_for(key).allow()
    }

    pub fn check(&self, key: &str) -> RateLimitResult {
        self.limiter_for(key).check()
    }

    /// Number of buckets currently held, including expired ones not yet swept.
    pub fn tracked_keys(&self) -> usize {
        self.backend.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.backend.stats()
    }
}

impl std::fmt::Debug for LimiterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterStore").field("backend", &self.backend).finish()
    }
}
