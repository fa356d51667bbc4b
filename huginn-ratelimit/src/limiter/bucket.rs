//! Token bucket limiter stored per key in a backend.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed to proceed.
    Allowed {
        /// Bucket capacity
        limit: u64,
        /// Whole tokens left after this request
        remaining: u64,
    },
    /// Request is rate limited and should be rejected.
    Limited {
        /// Bucket capacity
        limit: u64,
        /// Number of requests remaining (always 0)
        remaining: u64,
        /// Time until the next token is available
        reset_after: Duration,
    },
}

impl RateLimitResult {
    /// Returns true if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Returns true if the request is limited.
    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }

    pub fn limit(&self) -> u64 {
        match self {
            RateLimitResult::Allowed { limit, .. } => *limit,
            RateLimitResult::Limited { limit, .. } => *limit,
        }
    }

    pub fn remaining(&self) -> u64 {
        match self {
            RateLimitResult::Allowed { remaining, .. } => *remaining,
            RateLimitResult::Limited { remaining, .. } => *remaining,
        }
    }

    /// Get the reset duration if limited.
    pub fn reset_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Limited { reset_after, .. } => Some(*reset_after),
            _ => None,
        }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket refilled with `rate` tokens every `every`, holding at most `capacity`.
///
/// The bucket starts full. Refill is computed lazily on each check from the
/// time elapsed since the previous one, so an idle bucket costs nothing.
///
/// # Example
/// ```ignore
/// // 10 requests per second, bursts of up to 20
/// let bucket = TokenBucket::per_second(10.0, 20);
/// assert!(bucket.allow());
/// ```
pub struct TokenBucket {
    rate: f64,
    capacity: u64,
    every: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate: f64, capacity: u64, every: Duration) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 0.0 };
        Self {
            rate,
            capacity,
            every,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn per_second(rate: f64, capacity: u64) -> Self {
        Self::new(rate, capacity, Duration::from_secs(1))
    }

    /// Take one token if available.
    pub fn allow(&self) -> bool {
        self.check().is_allowed()
    }

    /// Take one token if available and report the bucket state.
    pub fn check(&self) -> RateLimitResult {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            RateLimitResult::Allowed { limit: self.capacity, remaining: state.tokens as u64 }
        } else {
            RateLimitResult::Limited {
                limit: self.capacity,
                remaining: 0,
                reset_after: self.time_to_next_token(state.tokens),
            }
        }
    }

    /// Whole tokens currently available, without consuming any.
    pub fn available(&self) -> u64 {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());
        state.tokens as u64
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn every(&self) -> Duration {
        self.every
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // State is two plain numbers, always consistent between statements.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.last_refill = now;
        if self.rate == 0.0 || self.every.is_zero() {
            return;
        }
        let added = elapsed.as_secs_f64() / self.every.as_secs_f64() * self.rate;
        state.tokens = (state.tokens + added).min(self.capacity as f64);
    }

    fn time_to_next_token(&self, tokens: f64) -> Duration {
        if self.rate == 0.0 {
            return self.every;
        }
        let missing = (1.0 - tokens).max(0.0);
        Duration::try_from_secs_f64(missing / self.rate * self.every.as_secs_f64())
            .unwrap_or(Duration::MAX)
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .field("every", &self.every)
            .finish()
    }
}
