use crate::cache::ListingCache;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 500;

/// Redis-backed listing cache shared by every server process
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers PING
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            AppError::Cache(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        let cache = Self { connection };
        cache.ping().await?;

        tracing::info!("Initialized Redis listing cache");
        Ok(cache)
    }

    /// Collect every key under `prefix` with cursor-based SCAN
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", escape_glob(prefix));

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::Cache(format!("Failed to scan cache keys: {}", e)))?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl ListingCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();

        conn.get(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to read cache entry: {}", e)))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();

        // EX rejects 0, so sub-second TTLs round up
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to write cache entry: {}", e)))?;

        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64> {
        let keys = self.scan_prefix(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let mut removed = 0u64;
        for batch in keys.chunks(SCAN_BATCH) {
            let deleted: u64 = conn
                .del(batch)
                .await
                .map_err(|e| AppError::Cache(format!("Failed to delete cache entries: {}", e)))?;
            removed += deleted;
        }

        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Cache(format!("Redis connection test failed: {}", e)))?;

        Ok(())
    }
}

/// Escape glob metacharacters so the prefix matches literally in SCAN MATCH
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_REDIS_URL: &str = "redis://127.0.0.1:6379/15";

    // Helper to check if Redis is available
    async fn create_test_cache() -> Option<RedisCache> {
        RedisCache::new(TEST_REDIS_URL).await.ok()
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("incidents:"), "incidents:");
        assert_eq!(escape_glob("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
    }

    #[tokio::test]
    async fn test_set_get_and_invalidate() {
        let Some(cache) = create_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let prefix = "redis-cache-test:";
        cache
            .set("redis-cache-test:1:10:any:any", b"[1]".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("redis-cache-test:2:10:any:any", b"[2]".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get("redis-cache-test:1:10:any:any").await.unwrap(),
            Some(b"[1]".to_vec())
        );

        let removed = cache.invalidate_prefix(prefix).await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get("redis-cache-test:1:10:any:any").await.unwrap().is_none());
        assert_eq!(cache.invalidate_prefix(prefix).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_spans_several_scan_rounds() {
        let Some(cache) = create_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let prefix = "redis-cache-bulk:";
        cache.invalidate_prefix(prefix).await.unwrap();

        let total = SCAN_BATCH * 2 + 37;
        for page in 0..total {
            cache
                .set(
                    &format!("{}{}:10:any:any", prefix, page + 1),
                    b"[]".to_vec(),
                    Duration::from_secs(60),
                )
                .await
                .unwrap();
        }
        cache
            .set("redis-cache-other:1:10:any:any", b"[]".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.invalidate_prefix(prefix).await.unwrap(), total as u64);
        assert!(cache.get("redis-cache-bulk:1:10:any:any").await.unwrap().is_none());
        assert!(cache
            .get("redis-cache-other:1:10:any:any")
            .await
            .unwrap()
            .is_some());

        cache.invalidate_prefix("redis-cache-other:").await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let Some(cache) = create_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        cache
            .set("redis-cache-ttl:key", b"v".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(cache.get("redis-cache-ttl:key").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(cache.get("redis-cache-ttl:key").await.unwrap().is_none());
    }
}
