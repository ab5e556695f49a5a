//! Listing cache.
//!
//! Entries are whole serialized listings with a per-entry TTL. Invalidation is
//! coarse: every write clears the whole [`LISTING_PREFIX`] namespace instead of
//! working out which filters a record would affect.

pub mod keys;
pub mod moka_cache;
pub mod redis_cache;
pub mod factory;

pub use keys::{listing_key, LISTING_PREFIX};
pub use moka_cache::MokaCache;
pub use redis_cache::RedisCache;
pub use factory::create_cache;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value cache with per-entry expiry and prefix deletion
///
/// Every failure is reported as [`AppError::Cache`](crate::error::AppError::Cache).
#[async_trait]
pub trait ListingCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous entry and restarting its TTL
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Delete every entry whose key starts with `prefix`, returning how many were removed.
    ///
    /// Entries are scanned and then deleted one batch at a time. Each delete is
    /// atomic; the whole sweep is not.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<()>;
}
