use crate::error::{AppError, Result};
use crate::models::{Incident, IncidentStatus, NewIncident};
use crate::state::{IncidentQuery, IncidentStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// In-memory incident store (for development and testing)
#[derive(Clone)]
pub struct InMemoryStore {
    incidents: Arc<DashMap<i64, Incident>>,
    last_id: Arc<AtomicI64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            incidents: Arc::new(DashMap::new()),
            last_id: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Insert a record as-is, keeping its `id` and `created_at`.
    ///
    /// Used to seed fixtures with controlled timestamps.
    pub fn insert_raw(&self, incident: Incident) {
        self.last_id.fetch_max(incident.id, Ordering::SeqCst);
        self.incidents.insert(incident.id, incident);
    }

    fn matching(&self, query: &IncidentQuery) -> Vec<Incident> {
        self.incidents
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IncidentStore for InMemoryStore {
    async fn create_incident(&self, draft: NewIncident) -> Result<Incident> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let incident = Incident::from_draft(id, draft);

        self.incidents.insert(id, incident.clone());

        tracing::debug!(incident_id = id, "Incident saved");
        Ok(incident)
    }

    async fn get_incident(&self, id: i64) -> Result<Option<Incident>> {
        Ok(self.incidents.get(&id).map(|entry| entry.clone()))
    }

    async fn list_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>> {
        Ok(query.paginate(self.matching(query)))
    }

    async fn count_incidents(&self, query: &IncidentQuery) -> Result<u64> {
        let count = self
            .incidents
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .count();

        Ok(count as u64)
    }

    async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<Incident> {
        // The shard lock is held for the read-modify-write.
        match self.incidents.get_mut(&id) {
            Some(mut entry) => {
                entry.incident_type = status;
                tracing::debug!(incident_id = id, status = %status, "Incident status updated");
                Ok(entry.clone())
            }
            None => Err(AppError::NotFound(format!("Incident {} not found", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncidentSource;
    use chrono::{Duration, TimeZone, Utc};

    fn draft(message: &str, status: IncidentStatus, source: IncidentSource) -> NewIncident {
        NewIncident::new(message, status, source)
    }

    #[tokio::test]
    async fn test_create_and_get_incident() {
        let store = InMemoryStore::new();

        let created = store
            .create_incident(draft(
                "Power outage reported",
                IncidentStatus::New,
                IncidentSource::Monitoring,
            ))
            .await
            .unwrap();
        assert_eq!(created.id, 1);

        let retrieved = store.get_incident(created.id).await.unwrap();
        assert_eq!(retrieved, Some(created));
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();
        for i in 0..3 {
            let incident = store
                .create_incident(draft(
                    &format!("Incident number {}", i),
                    IncidentStatus::New,
                    IncidentSource::Operator,
                ))
                .await
                .unwrap();
            ids.push(incident.id);
        }
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_incident_is_none() {
        let store = InMemoryStore::new();
        assert!(store.get_incident(999_999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status() {
        let store = InMemoryStore::new();
        let created = store
            .create_incident(draft(
                "Queue backlog growing",
                IncidentStatus::New,
                IncidentSource::Partner,
            ))
            .await
            .unwrap();

        let updated = store
            .update_status(created.id, IncidentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(updated.incident_type, IncidentStatus::Completed);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.message, created.message);

        let retrieved = store.get_incident(created.id).await.unwrap().unwrap();
        assert_eq!(retrieved.incident_type, IncidentStatus::Completed);
    }

    #[tokio::test]
    async fn test_update_missing_incident() {
        let store = InMemoryStore::new();
        let result = store.update_status(999_999, IncidentStatus::Completed).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_incidents_with_filters() {
        let store = InMemoryStore::new();

        for i in 0..6 {
            let status = if i % 2 == 0 {
                IncidentStatus::Failed
            } else {
                IncidentStatus::New
            };
            let source = if i < 3 {
                IncidentSource::Operator
            } else {
                IncidentSource::Partner
            };
            store
                .create_incident(draft(&format!("Incident {}", i), status, source))
                .await
                .unwrap();
        }

        let failed = store
            .list_incidents(&IncidentQuery::default().with_type(IncidentStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 3); // 0, 2, 4
        assert!(failed.iter().all(|i| i.incident_type == IncidentStatus::Failed));

        let failed_partner = store
            .list_incidents(
                &IncidentQuery::default()
                    .with_type(IncidentStatus::Failed)
                    .with_source(IncidentSource::Partner),
            )
            .await
            .unwrap();
        assert_eq!(failed_partner.len(), 1); // 4
        assert_eq!(failed_partner[0].message, "Incident 4");

        let count = store
            .count_incidents(&IncidentQuery::default().with_source(IncidentSource::Operator))
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let store = InMemoryStore::new();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        // Inserted out of order on purpose
        for (id, minutes) in [(1, 5), (2, 1), (3, 10)] {
            store.insert_raw(Incident {
                id,
                message: format!("Incident {}", id),
                incident_type: IncidentStatus::New,
                source: IncidentSource::Monitoring,
                created_at: base + Duration::minutes(minutes),
            });
        }

        let listed = store.list_incidents(&IncidentQuery::default()).await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        // New ids continue after seeded ones
        let next = store
            .create_incident(draft("Fresh incident", IncidentStatus::New, IncidentSource::Operator))
            .await
            .unwrap();
        assert_eq!(next.id, 4);
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .create_incident(draft(
                    &format!("Incident {}", i),
                    IncidentStatus::New,
                    IncidentSource::Monitoring,
                ))
                .await
                .unwrap();
        }

        let page = store.list_incidents(&IncidentQuery::page(2, 5)).await.unwrap();
        assert!(page.is_empty());
    }
}
