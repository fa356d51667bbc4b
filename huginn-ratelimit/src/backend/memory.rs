use ahash::AHashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::stats::{CacheStats, StatsSnapshot};
use super::Backend;
use crate::error::{RateLimitError, Result};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V) -> Self {
        Self { value, inserted_at: Instant::now() }
    }

    #[inline]
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// State owned by one partition. The map is only touched with `entries` locked.
struct Partition<V> {
    index: usize,
    ttl: Duration,
    entries: Mutex<AHashMap<String, Entry<V>>>,
    stats: CacheStats,
}

impl<V> Partition<V> {
    /// Lock the map, recovering from a poisoned lock.
    ///
    /// The map is only mutated after the factory returns, so a panic inside a
    /// factory never leaves a half-written entry behind. The poison flag is
    /// cleared so later callers take the fast path again.
    fn lock_recovering(&self) -> MutexGuard<'_, AHashMap<String, Entry<V>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(partition = self.index, "Partition lock poisoned, recovering");
                let guard = poisoned.into_inner();
                self.entries.clear_poison();
                guard
            }
        }
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut entries = self.lock_recovering();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now, ttl));
        let removed = before.saturating_sub(entries.len());
        drop(entries);

        self.stats.record_evictions(removed as u64);
        removed
    }
}

/// A single mutex-guarded map with time-based expiration.
///
/// Entries become invisible to [`Backend::load`] once `ttl` has elapsed since
/// they were written, and a background task physically drops them every
/// sweep interval. The task stops when the [`CancellationToken`] passed at
/// construction is cancelled or when every handle to the backend is dropped.
///
/// Cloning is cheap and yields a handle to the same partition.
pub struct MemoryBackend<V> {
    partition: Arc<Partition<V>>,
}

impl<V> Clone for MemoryBackend<V> {
    fn clone(&self) -> Self {
        Self { partition: Arc::clone(&self.partition) }
    }
}

impl<V> std::fmt::Debug for MemoryBackend<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("index", &self.partition.index)
            .field("ttl", &self.partition.ttl)
            .field("len", &self.len())
            .finish()
    }
}

impl<V> MemoryBackend<V>
where
    V: Send + 'static,
{
    /// Create a backend sweeping expired entries once per `ttl`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Example
    /// ```ignore
    /// let cancel = CancellationToken::new();
    /// let backend = MemoryBackend::new(cancel.clone(), Duration::from_secs(60))?;
    /// let limiter = backend.load("10.0.0.1", || Arc::new(TokenBucket::per_second(10.0, 20)));
    /// ```
    pub fn new(cancel: CancellationToken, ttl: Duration) -> Result<Self> {
        Self::with_sweep_interval(cancel, ttl, ttl)
    }

    /// Create a backend with an explicit sweep cadence.
    ///
    /// `sweep_interval` must be non-zero and no longer than `ttl`.
    pub fn with_sweep_interval(
        cancel: CancellationToken,
        ttl: Duration,
        sweep_interval: Duration,
    ) -> Result<Self> {
        validate_timing(ttl, sweep_interval)?;
        let handle = Handle::try_current().map_err(|_| RateLimitError::NoRuntime)?;
        Ok(Self::spawn_partition(0, ttl, sweep_interval, cancel, &handle))
    }

    /// Build one partition and start its sweeper. Timing is already validated.
    pub(crate) fn spawn_partition(
        index: usize,
        ttl: Duration,
        sweep_interval: Duration,
        cancel: CancellationToken,
        handle: &Handle,
    ) -> Self {
        let partition = Arc::new(Partition {
            index,
            ttl,
            entries: Mutex::new(AHashMap::new()),
            stats: CacheStats::default(),
        });
        spawn_sweeper(Arc::downgrade(&partition), sweep_interval, cancel, handle);
        Self { partition }
    }
}

impl<V> MemoryBackend<V> {
    /// Number of entries physically present, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.partition.lock_recovering().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.partition.ttl
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.partition.stats.snapshot()
    }

    /// Drop every expired entry now and return how many were removed.
    ///
    /// The background sweeper calls this on its own; it is exposed for callers
    /// that want to reclaim memory at a known point.
    pub fn sweep(&self) -> usize {
        self.partition.sweep()
    }
}

impl<V> Backend<V> for MemoryBackend<V>
where
    V: Clone + Send,
{
    fn load<F>(&self, key: &str, factory: F) -> V
    where
        F: FnOnce() -> V,
    {
        let partition = &*self.partition;
        // Check and create happen under one guard: concurrent callers on the
        // same key wait here and then observe the entry created by the winner.
        let mut entries = partition.lock_recovering();

        if let Some(entry) = entries.get(key) {
            if entry.is_live(Instant::now(), partition.ttl) {
                partition.stats.record_hit();
                return entry.value.clone();
            }
        }

        partition.stats.record_miss();
        let value = factory();
        entries.insert(key.to_owned(), Entry::new(value.clone()));
        value
    }

    fn store(&self, key: &str, value: V) -> Result<()> {
        let partition = &*self.partition;
        let mut entries = partition.lock_recovering();

        entries.insert(key.to_owned(), Entry::new(value));
        partition.stats.record_store();
        Ok(())
    }
}

pub(crate) fn validate_timing(ttl: Duration, sweep_interval: Duration) -> Result<()> {
    if ttl.is_zero() {
        return Err(RateLimitError::Config("ttl must be > 0".to_string()));
    }
    if sweep_interval.is_zero() {
        return Err(RateLimitError::Config("sweep interval must be > 0".to_string()));
    }
    if sweep_interval > ttl {
        return Err(RateLimitError::Config(format!(
            "sweep interval ({sweep_interval:?}) must not exceed ttl ({ttl:?})"
        )));
    }
    Ok(())
}

fn spawn_sweeper<V>(
    partition: Weak<Partition<V>>,
    interval: Duration,
    cancel: CancellationToken,
    handle: &Handle,
) where
    V: Send + 'static,
{
    handle.spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(partition) = partition.upgrade() else {
                        break;
                    };
                    let removed = partition.sweep();
                    if removed > 0 {
                        debug!(partition = partition.index, removed, "Swept expired entries");
                    }
                }
            }
        }

        debug!("Partition sweeper stopped");
    });
}
