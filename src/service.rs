//! Cache-aside coordination between the record store and the listing cache.
//!
//! Listings are read through the cache. Creates and status updates write to the
//! store first and then clear every cached listing. Point lookups always go to
//! the store.
//!
//! # Stale-listing race
//!
//! Populating the cache and invalidating it are not mutually exclusive. A
//! listing can read the store, a concurrent write can commit and invalidate
//! (finding nothing to delete yet), and the listing then writes its stale
//! result. That entry is served until the next write or until its TTL runs
//! out. Fencing writes with a generation read at the start of the listing
//! would close this; it is not done here.

use crate::cache::{listing_key, ListingCache, LISTING_PREFIX};
use crate::error::{AppError, Result};
use crate::models::{Incident, IncidentStatus, NewIncident};
use crate::state::{IncidentQuery, IncidentStore, MAX_LIMIT};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime of a cached listing
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listing_ttl: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listing_ttl: DEFAULT_LISTING_TTL,
        }
    }
}

/// Snapshot reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub incidents: u64,
    pub cache_reachable: bool,
    pub cache_degraded_events: u64,
}

/// Orchestrates the record store and the listing cache
pub struct IncidentService {
    store: Arc<dyn IncidentStore>,
    cache: Arc<dyn ListingCache>,
    config: ServiceConfig,
    degraded_events: AtomicU64,
}

impl IncidentService {
    pub fn new(store: Arc<dyn IncidentStore>, cache: Arc<dyn ListingCache>) -> Self {
        Self::with_config(store, cache, ServiceConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn IncidentStore>,
        cache: Arc<dyn ListingCache>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            degraded_events: AtomicU64::new(0),
        }
    }

    /// Validate and persist a draft, then clear cached listings
    pub async fn create_incident(&self, draft: NewIncident) -> Result<Incident> {
        let draft = draft.normalized()?;

        let incident = self.settle_write(self.store.create_incident(draft).await).await?;
        tracing::info!(
            incident_id = incident.id,
            incident_type = %incident.incident_type,
            source = %incident.source,
            "Incident created"
        );

        self.invalidate_listings().await;
        Ok(incident)
    }

    /// One page of incidents, served from the cache when possible
    pub async fn list_incidents(&self, query: IncidentQuery) -> Result<Vec<Incident>> {
        validate_paging(&query)?;
        let key = listing_key(&query);

        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<Incident>>(&bytes) {
                Ok(incidents) => {
                    tracing::debug!(cache_key = %key, "Listing cache hit");
                    return Ok(incidents);
                }
                Err(e) => {
                    self.record_degraded("decode", &key, &AppError::from(e));
                }
            },
            Ok(None) => {
                tracing::debug!(cache_key = %key, "Listing cache miss");
            }
            Err(e) => self.record_degraded("get", &key, &e),
        }

        let incidents = self.store.list_incidents(&query).await?;

        let serialized = serde_json::to_vec(&incidents)?;
        if let Err(e) = self.cache.set(&key, serialized, self.config.listing_ttl).await {
            self.record_degraded("set", &key, &e);
        }

        Ok(incidents)
    }

    /// Fetch a single incident. Never consults or fills the cache.
    pub async fn get_incident(&self, id: i64) -> Result<Incident> {
        self.store
            .get_incident(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))
    }

    /// Change an incident's status, then clear cached listings
    pub async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<Incident> {
        // NotFound returns here, before any invalidation
        let incident = self
            .settle_write(self.store.update_status(id, status).await)
            .await?;
        tracing::info!(incident_id = id, status = %status, "Incident status updated");

        self.invalidate_listings().await;
        Ok(incident)
    }

    /// Number of cache failures that were swallowed since startup
    pub fn cache_degraded_events(&self) -> u64 {
        self.degraded_events.load(Ordering::Relaxed)
    }

    pub async fn health(&self) -> Result<HealthReport> {
        let incidents = self
            .store
            .count_incidents(&IncidentQuery::default())
            .await?;

        let cache_reachable = match self.cache.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Listing cache unreachable");
                false
            }
        };

        Ok(HealthReport {
            incidents,
            cache_reachable,
            cache_degraded_events: self.cache_degraded_events(),
        })
    }

    /// Flush the store before the process exits
    pub async fn shutdown(&self) -> Result<()> {
        self.store.shutdown().await
    }

    /// A store failure on a write leaves its outcome unknown, so listings are
    /// cleared before the error is returned. Other errors pass straight through.
    async fn settle_write(&self, result: Result<Incident>) -> Result<Incident> {
        if let Err(AppError::Database(reason)) = &result {
            tracing::warn!(error = %reason, "Store write failed, clearing cached listings");
            self.invalidate_listings().await;
        }
        result
    }

    async fn invalidate_listings(&self) {
        match self.cache.invalidate_prefix(LISTING_PREFIX).await {
            Ok(removed) => {
                tracing::debug!(removed, "Invalidated cached listings");
            }
            Err(e) => self.record_degraded("invalidate", LISTING_PREFIX, &e),
        }
    }

    fn record_degraded(&self, operation: &str, key: &str, error: &AppError) {
        self.degraded_events.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            operation,
            cache_key = %key,
            error = %error,
            "Listing cache degraded, continuing without it"
        );
    }
}

fn validate_paging(query: &IncidentQuery) -> Result<()> {
    if query.page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_string()));
    }
    if query.limit < 1 || query.limit > MAX_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(())
}
