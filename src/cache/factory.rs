use crate::cache::{ListingCache, MokaCache, RedisCache};
use crate::config::{CacheBackend, CacheConfig};
use crate::error::Result;
use std::sync::Arc;

/// Create the listing cache based on configuration.
///
/// A Redis backend that does not answer PING is a startup error.
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<dyn ListingCache>> {
    match config.backend {
        CacheBackend::Redis => {
            let redis_url = config.redis_url();
            tracing::info!(
                host = %config.redis_host,
                port = config.redis_port,
                db = config.redis_db,
                "Initializing Redis listing cache"
            );

            let cache = RedisCache::new(&redis_url).await?;
            Ok(Arc::new(cache))
        }

        CacheBackend::Memory => Ok(Arc::new(MokaCache::new(config.max_capacity))),
    }
}
