//! Time-expiring key/value backends that hold per-key rate limiter state.
//!
//! Two implementations share the [`Backend`] contract:
//!
//! 1. **MemoryBackend** (`memory.rs`): one map behind one mutex, with a
//!    background sweeper dropping entries older than the TTL.
//!
//! 2. **ShardedMemoryBackend** (`sharded.rs`): a fixed array of
//!    `MemoryBackend` partitions. Keys are routed with a [`HashFunction`] so
//!    unrelated clients rarely contend on the same lock.
//!
//! [`CacheBackend`] selects one of them from [`CacheConfig`].
//!
//! # Example Usage
//!
//! ```ignore
//! use huginn_ratelimit::backend::{pseudo_fnv64a, Backend, ShardedMemoryBackend};
//! use tokio_util::sync::CancellationToken;
//! use std::time::Duration;
//!
//! let cancel = CancellationToken::new();
//! let backend = ShardedMemoryBackend::new(cancel.clone(), 256, Duration::from_secs(60), pseudo_fnv64a)?;
//!
//! // Created once, returned to every caller until the entry expires
//! let value = backend.load("192.168.1.1", || 42u64);
//! assert_eq!(backend.load("192.168.1.1", || 0), value);
//!
//! // Stops the sweepers; loads and stores keep working
//! cancel.cancel();
//! ```

mod hash;
mod memory;
mod sharded;
mod stats;

pub use hash::{ahash64, pseudo_fnv64a, HashFunction};
pub use memory::MemoryBackend;
pub use sharded::ShardedMemoryBackend;
pub use stats::{CacheStats, StatsSnapshot};

use tokio_util::sync::CancellationToken;

use crate::config::{BackendKind, CacheConfig, HashKind};
use crate::error::Result;

/// Load-or-create storage keyed by string.
pub trait Backend<V>: Send + Sync {
    /// Return the live value for `key`, or run `factory`, store its result and return it.
    ///
    /// `factory` runs at most once per key per expiration window, even when many
    /// callers race on the same missing key. It runs while the owning partition is
    /// locked, so it should be cheap.
    fn load<F>(&self, key: &str, factory: F) -> V
    where
        F: FnOnce() -> V;

    /// Insert or replace the value for `key`, restarting its TTL.
    ///
    /// The in-memory backends always succeed; the `Result` leaves room for
    /// backends with fallible storage.
    fn store(&self, key: &str, value: V) -> Result<()>;
}

/// A backend chosen at startup.
pub enum CacheBackend<V> {
    Memory(MemoryBackend<V>),
    Sharded(ShardedMemoryBackend<V>),
}

impl<V> Clone for CacheBackend<V> {
    fn clone(&self) -> Self {
        match self {
            CacheBackend::Memory(b) => CacheBackend::Memory(b.clone()),
            CacheBackend::Sharded(b) => CacheBackend::Sharded(b.clone()),
        }
    }
}

impl<V> std::fmt::Debug for CacheBackend<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::Memory(b) => b.fmt(f),
            CacheBackend::Sharded(b) => b.fmt(f),
        }
    }
}

impl<V> CacheBackend<V>
where
    V: Send + 'static,
{
    /// Build the backend described by `config`. Sweepers are bound to `cancel`.
    pub fn from_config(config: &CacheConfig, cancel: CancellationToken) -> Result<Self> {
        let ttl = config.ttl();
        let sweep_interval = config.sweep_interval();

        match config.kind {
            BackendKind::Memory => {
                MemoryBackend::with_sweep_interval(cancel, ttl, sweep_interval)
                    .map(CacheBackend::Memory)
            }
            BackendKind::Sharded => ShardedMemoryBackend::with_sweep_interval(
                cancel,
                config.partitions,
                ttl,
                sweep_interval,
                config.hash.function(),
            )
            .map(CacheBackend::Sharded),
        }
    }
}

impl<V> CacheBackend<V> {
    pub fn len(&self) -> usize {
        match self {
            CacheBackend::Memory(b) => b.len(),
            CacheBackend::Sharded(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CacheBackend::Memory(b) => b.is_empty(),
            CacheBackend::Sharded(b) => b.is_empty(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        match self {
            CacheBackend::Memory(b) => b.stats(),
            CacheBackend::Sharded(b) => b.stats(),
        }
    }
}

impl<V> Backend<V> for CacheBackend<V>
where
    V: Clone + Send,
{
    fn load<F>(&self, key: &str, factory: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self {
            CacheBackend::Memory(b) => b.load(key, factory),
            CacheBackend::Sharded(b) => b.load(key, factory),
        }
    }

    fn store(&self, key: &str, value: V) -> Result<()> {
        match self {
            CacheBackend::Memory(b) => b.store(key, value),
            CacheBackend::Sharded(b) => b.store(key, value),
        }
    }
}

impl HashKind {
    pub fn function(self) -> HashFunction {
        match self {
            HashKind::Fnv => pseudo_fnv64a,
            HashKind::Ahash => ahash64,
        }
    }
}
