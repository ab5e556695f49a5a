use crate::cache::ListingCache;
use crate::error::Result;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CachedListing {
    bytes: Arc<Vec<u8>>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with
struct ListingExpiry;

impl Expiry<String, CachedListing> for ListingExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedListing,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedListing,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process listing cache using Moka
#[derive(Clone)]
pub struct MokaCache {
    cache: Cache<String, CachedListing>,
}

impl MokaCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(ListingExpiry)
            .build();

        tracing::info!(max_capacity, "Initialized in-process listing cache");
        Self { cache }
    }
}

#[async_trait]
impl ListingCache for MokaCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .cache
            .get(key)
            .await
            .map(|entry| entry.bytes.as_ref().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.cache
            .insert(
                key.to_string(),
                CachedListing {
                    bytes: Arc::new(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64> {
        let keys: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.cache.remove(key.as_str()).await.is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
