pub mod store;
pub mod sled_store;
pub mod factory;

pub use store::*;
pub use sled_store::SledStore;
pub use factory::{create_store, create_in_memory_store};

use crate::error::Result;
use crate::models::{Incident, IncidentSource, IncidentStatus, NewIncident};
use async_trait::async_trait;

/// Trait for incident storage operations
///
/// Implementations do not validate drafts; callers hand in normalized input.
/// Each create and update is atomic for its record.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Persist a draft and return the stored record with its assigned `id` and `created_at`
    async fn create_incident(&self, draft: NewIncident) -> Result<Incident>;

    /// Get an incident by ID, `None` if it does not exist
    async fn get_incident(&self, id: i64) -> Result<Option<Incident>>;

    /// List one page of incidents, newest first
    async fn list_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>>;

    /// Count incidents matching the query filters, ignoring paging
    async fn count_incidents(&self, query: &IncidentQuery) -> Result<u64>;

    /// Change the status of an existing incident
    async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<Incident>;

    /// Flush pending writes before the process exits
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 1000;

/// Paging and filters for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IncidentQuery {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
    pub incident_type: Option<IncidentStatus>,
    pub source: Option<IncidentSource>,
}

impl Default for IncidentQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            incident_type: None,
            source: None,
        }
    }
}

impl IncidentQuery {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, incident_type: IncidentStatus) -> Self {
        self.incident_type = Some(incident_type);
        self
    }

    pub fn with_source(mut self, source: IncidentSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Number of matching records that precede this page
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) as usize * self.limit as usize
    }

    /// Both filters must hold when both are set
    pub fn matches(&self, incident: &Incident) -> bool {
        let type_match = self
            .incident_type
            .map_or(true, |t| incident.incident_type == t);
        let source_match = self.source.map_or(true, |s| incident.source == s);

        type_match && source_match
    }

    /// Sort newest first and cut out this page.
    ///
    /// Ties on `created_at` are ordered by descending `id`, so paging is stable.
    pub fn paginate(&self, mut incidents: Vec<Incident>) -> Vec<Incident> {
        incidents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        incidents
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect()
    }
}
