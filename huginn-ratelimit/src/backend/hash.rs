//! Key hashing used to pick a partition in [`ShardedMemoryBackend`].
//!
//! Only distribution matters here. None of these functions are meant to resist
//! collision attacks, and callers must not rely on the concrete values.
//!
//! [`ShardedMemoryBackend`]: super::ShardedMemoryBackend

use ahash::RandomState;
use std::sync::LazyLock;

/// A deterministic mapping from a key to a 64-bit number.
pub type HashFunction = fn(&str) -> u64;

const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

/// FNV-1a over the key bytes.
///
/// # Example
/// ```ignore
/// use huginn_ratelimit::backend::pseudo_fnv64a;
/// assert_eq!(pseudo_fnv64a(""), 14695981039346656037);
/// ```
#[inline]
pub fn pseudo_fnv64a(key: &str) -> u64 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

// Fixed seeds so the same key lands on the same partition across restarts.
static AHASH_STATE: LazyLock<RandomState> = LazyLock::new(|| {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
});

/// ahash with fixed seeds.
#[inline]
pub fn ahash64(key: &str) -> u64 {
    AHASH_STATE.hash_one(key)
}
