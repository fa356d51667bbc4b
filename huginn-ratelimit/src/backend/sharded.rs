use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::hash::HashFunction;
use super::memory::{validate_timing, MemoryBackend};
use super::stats::StatsSnapshot;
use super::Backend;
use crate::error::{RateLimitError, Result};

/// A fixed set of independent [`MemoryBackend`] partitions.
///
/// Every key is owned by exactly one partition, `hash(key) % partitions`.
/// Partitions never coordinate, so contention is limited to keys that share a
/// partition while the load-or-create guarantee still holds per key.
pub struct ShardedMemoryBackend<V> {
    partitions: Arc<[MemoryBackend<V>]>,
    hash: HashFunction,
}

impl<V> Clone for ShardedMemoryBackend<V> {
    fn clone(&self) -> Self {
        Self { partitions: Arc::clone(&self.partitions), hash: self.hash }
    }
}

impl<V> std::fmt::Debug for ShardedMemoryBackend<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedMemoryBackend")
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

impl<V> ShardedMemoryBackend<V>
where
    V: Send + 'static,
{
    /// Create `partitions` partitions, each sweeping once per `ttl`.
    ///
    /// # Parameters
    /// - `cancel`: stops every partition's sweeper when cancelled
    /// - `partitions`: number of partitions, must be > 0 (256 suits busy gateways)
    /// - `ttl`: lifetime of an entry
    /// - `hash`: partition selector, see [`pseudo_fnv64a`](super::pseudo_fnv64a)
    pub fn new(
        cancel: CancellationToken,
        partitions: usize,
        ttl: Duration,
        hash: HashFunction,
    ) -> Result<Self> {
        Self::with_sweep_interval(cancel, partitions, ttl, ttl, hash)
    }

    pub fn with_sweep_interval(
        cancel: CancellationToken,
        partitions: usize,
        ttl: Duration,
        sweep_interval: Duration,
        hash: HashFunction,
    ) -> Result<Self> {
        if partitions == 0 {
            return Err(RateLimitError::Config("partition count must be > 0".to_string()));
        }
        validate_timing(ttl, sweep_interval)?;
        let handle = Handle::try_current().map_err(|_| RateLimitError::NoRuntime)?;

        let partitions: Arc<[MemoryBackend<V>]> = (0..partitions)
            .map(|index| {
                MemoryBackend::spawn_partition(index, ttl, sweep_interval, cancel.clone(), &handle)
            })
            .collect();

        info!(
            partitions = partitions.len(),
            ?ttl,
            ?sweep_interval,
            "Sharded memory backend started"
        );

        Ok(Self { partitions, hash })
    }
}

impl<V> ShardedMemoryBackend<V> {
    /// Index of the partition owning `key`.
    #[inline]
    pub fn partition_index(&self, key: &str) -> usize {
        // partitions.len() > 0 is checked at construction
        ((self.hash)(key) % self.partitions.len() as u64) as usize
    }

    #[inline]
    fn partition(&self, key: &str) -> &MemoryBackend<V> {
        &self.partitions[self.partition_index(key)]
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Entries physically present across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(MemoryBackend::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(MemoryBackend::is_empty)
    }

    /// Aggregated counters of every partition.
    pub fn stats(&self) -> StatsSnapshot {
        self.partitions.iter().map(MemoryBackend::stats).sum()
    }

    pub fn sweep(&self) -> usize {
        self.partitions.iter().map(MemoryBackend::sweep).sum()
    }
}

impl<V> Backend<V> for ShardedMemoryBackend<V>
where
    V: Clone + Send,
{
    #[inline]
    fn load<F>(&self, key: &str, factory: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.partition(key).load(key, factory)
    }

    #[inline]
    fn store(&self, key: &str, value: V) -> Result<()> {
        self.partition(key).store(key, value)
    }
}
