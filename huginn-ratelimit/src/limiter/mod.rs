//! Per-client rate limiting on top of the [`backend`](crate::backend) cache.
//!
//! # Architecture
//!
//! 1. **TokenBucket** (`bucket.rs`): the limiter held per key.
//!
//! 2. **LimiterStore** (`store.rs`): closes over a backend and a bucket
//!    constructor; `limiter_for(key)` is a backend load-or-create.
//!
//! 3. **RateLimitManager** (`manager.rs`): the route-wide bucket plus the
//!    per-client store for one route.
//!
//! 4. **check_rate_limit** (`response.rs`): derives the client key from the
//!    request and turns a rejection into a 429 or 503 response.
//!
//! # Configuration
//!
//! ```toml
//! [cache]
//! kind = "sharded"
//! partitions = 256
//! ttl_ms = 600000
//!
//! [rate_limit]
//! enabled = true
//! max_rate = 1000
//! client_max_rate = 10
//! client_capacity = 20
//! limit_by = "header"
//! limit_by_header = "x-api-key"
//! ```

mod bucket;
mod key;
mod manager;
mod response;
mod store;

pub use bucket::{RateLimitResult, TokenBucket};
pub use key::extract_rate_limit_key;
pub use manager::{LimitScope, RateLimitDecision, RateLimitManager};
pub use response::{check_rate_limit, RespBody};
pub use store::LimiterStore;
