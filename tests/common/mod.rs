//! Common test utilities for service and API tests
//!
//! Store and cache wrappers that count calls, fail on demand, or pause a
//! cache write so interleavings can be reproduced.

#![allow(dead_code)]

use async_trait::async_trait;
use incident_ledger::{
    cache::{ListingCache, MokaCache},
    error::{AppError, Result},
    models::{Incident, IncidentSource, IncidentStatus, NewIncident},
    service::IncidentService,
    state::{IncidentQuery, IncidentStore, InMemoryStore},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub fn draft(message: &str, status: IncidentStatus, source: IncidentSource) -> NewIncident {
    NewIncident::new(message, status, source)
}

/// In-memory store that counts listing reads
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl IncidentStore for CountingStore {
    async fn create_incident(&self, draft: NewIncident) -> Result<Incident> {
        self.inner.create_incident(draft).await
    }

    async fn get_incident(&self, id: i64) -> Result<Option<Incident>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_incident(id).await
    }

    async fn list_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_incidents(query).await
    }

    async fn count_incidents(&self, query: &IncidentQuery) -> Result<u64> {
        self.inner.count_incidents(query).await
    }

    async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<Incident> {
        self.inner.update_status(id, status).await
    }
}

/// Store whose every operation fails like a lost database connection
pub struct FailingStore;

#[async_trait]
impl IncidentStore for FailingStore {
    async fn create_incident(&self, _draft: NewIncident) -> Result<Incident> {
        Err(AppError::Database("connection reset".to_string()))
    }

    async fn get_incident(&self, _id: i64) -> Result<Option<Incident>> {
        Err(AppError::Database("connection reset".to_string()))
    }

    async fn list_incidents(&self, _query: &IncidentQuery) -> Result<Vec<Incident>> {
        Err(AppError::Database("connection reset".to_string()))
    }

    async fn count_incidents(&self, _query: &IncidentQuery) -> Result<u64> {
        Err(AppError::Database("connection reset".to_string()))
    }

    async fn update_status(&self, _id: i64, _status: IncidentStatus) -> Result<Incident> {
        Err(AppError::Database("connection reset".to_string()))
    }
}

/// Store that applies every write and then reports a database error,
/// like a commit whose flush failed
#[derive(Default)]
pub struct CommitThenFailStore {
    inner: InMemoryStore,
}

impl CommitThenFailStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentStore for CommitThenFailStore {
    async fn create_incident(&self, draft: NewIncident) -> Result<Incident> {
        self.inner.create_incident(draft).await?;
        Err(AppError::Database("flush failed".to_string()))
    }

    async fn get_incident(&self, id: i64) -> Result<Option<Incident>> {
        self.inner.get_incident(id).await
    }

    async fn list_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>> {
        self.inner.list_incidents(query).await
    }

    async fn count_incidents(&self, query: &IncidentQuery) -> Result<u64> {
        self.inner.count_incidents(query).await
    }

    async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<Incident> {
        self.inner.update_status(id, status).await?;
        Err(AppError::Database("flush failed".to_string()))
    }
}

/// Moka cache that counts calls per operation
pub struct RecordingCache {
    inner: MokaCache,
    gets: AtomicUsize,
    sets: AtomicUsize,
    invalidations: AtomicUsize,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self {
            inner: MokaCache::new(1000),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingCache for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_prefix(prefix).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// Cache that is unreachable
pub struct FailingCache;

#[async_trait]
impl ListingCache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(AppError::Cache("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Err(AppError::Cache("connection refused".to_string()))
    }

    async fn invalidate_prefix(&self, _prefix: &str) -> Result<u64> {
        Err(AppError::Cache("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<()> {
        Err(AppError::Cache("connection refused".to_string()))
    }
}

/// Moka cache whose `set` parks until released
pub struct GatedCache {
    inner: MokaCache,
    pub set_reached: Notify,
    pub release: Notify,
}

impl GatedCache {
    pub fn new() -> Self {
        Self {
            inner: MokaCache::new(1000),
            set_reached: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl ListingCache for GatedCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.set_reached.notify_one();
        self.release.notified().await;
        self.inner.set(key, value, ttl).await
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64> {
        self.inner.invalidate_prefix(prefix).await
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Service over a counting store and a recording cache
pub fn recording_service() -> (Arc<IncidentService>, Arc<CountingStore>, Arc<RecordingCache>) {
    let store = Arc::new(CountingStore::new());
    let cache = Arc::new(RecordingCache::new());
    let service = Arc::new(IncidentService::new(store.clone(), cache.clone()));
    (service, store, cache)
}

/// Create `count` incidents with distinct messages, returning them in creation order
pub async fn seed(service: &IncidentService, count: usize) -> Vec<Incident> {
    let mut created = Vec::with_capacity(count);
    for i in 0..count {
        let incident = service
            .create_incident(draft(
                &format!("Seeded incident {}", i),
                IncidentStatus::New,
                IncidentSource::Monitoring,
            ))
            .await
            .expect("seed incident");
        created.push(incident);
    }
    created
}
