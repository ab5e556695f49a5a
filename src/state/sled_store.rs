use crate::error::{AppError, Result};
use crate::models::{Incident, IncidentStatus, NewIncident};
use crate::state::{IncidentQuery, IncidentStore};
use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent incident store using Sled embedded database
///
/// Records live in `incidents`, keyed by id. `incidents_by_created` holds one
/// empty-valued entry per record keyed by `created_at` then id, so walking it
/// in reverse yields the listing order without sorting.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    incidents_tree: sled::Tree,
    created_index: sled::Tree,
}

impl SledStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref();
        let db = sled::open(&path).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let incidents_tree = db.open_tree("incidents").map_err(|e| {
            AppError::Database(format!("Failed to open incidents tree: {}", e))
        })?;

        let created_index = db.open_tree("incidents_by_created").map_err(|e| {
            AppError::Database(format!("Failed to open created_at index: {}", e))
        })?;

        let store = Self {
            db: Arc::new(db),
            incidents_tree,
            created_index,
        };
        store.rebuild_index_if_stale()?;

        tracing::info!("Initialized Sled store at {:?}", path_str);
        Ok(store)
    }

    /// Serialize incident to bytes
    fn serialize_incident(incident: &Incident) -> Result<Vec<u8>> {
        bincode::serialize(incident).map_err(|e| {
            AppError::Database(format!("Failed to serialize incident: {}", e))
        })
    }

    /// Deserialize incident from bytes
    fn deserialize_incident(bytes: &[u8]) -> Result<Incident> {
        bincode::deserialize(bytes).map_err(|e| {
            AppError::Database(format!("Failed to deserialize incident: {}", e))
        })
    }

    /// Big-endian so the tree iterates in id order
    fn incident_key(id: i64) -> [u8; 8] {
        id.to_be_bytes()
    }

    /// `created_at` seconds with the sign bit flipped, then the id, both big-endian
    fn index_key(incident: &Incident) -> [u8; 16] {
        let secs = (incident.created_at.timestamp() as u64) ^ (1 << 63);
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&secs.to_be_bytes());
        key[8..].copy_from_slice(&incident.id.to_be_bytes());
        key
    }

    fn id_from_index_key(key: &[u8]) -> Result<i64> {
        let id_bytes: [u8; 8] = key
            .get(8..16)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| AppError::Database("Malformed created_at index key".to_string()))?;
        Ok(i64::from_be_bytes(id_bytes))
    }

    /// Next identifier; sled persists the generator, so ids are never reused
    fn next_id(&self) -> Result<i64> {
        let raw = self.db.generate_id().map_err(|e| {
            AppError::Database(format!("Failed to generate incident id: {}", e))
        })?;

        i64::try_from(raw + 1)
            .map_err(|_| AppError::Database("Incident id space exhausted".to_string()))
    }

    /// Repopulate the index when it does not cover every record, e.g. a
    /// database written before the index existed
    fn rebuild_index_if_stale(&self) -> Result<()> {
        if self.created_index.len() == self.incidents_tree.len() {
            return Ok(());
        }

        self.created_index.clear().map_err(|e| {
            AppError::Database(format!("Failed to clear created_at index: {}", e))
        })?;

        let mut rebuilt = 0usize;
        for item in self.incidents_tree.iter() {
            let (_, bytes) = item.map_err(|e| {
                AppError::Database(format!("Failed to scan incidents: {}", e))
            })?;
            let incident = Self::deserialize_incident(&bytes)?;
            self.created_index
                .insert(Self::index_key(&incident), Vec::<u8>::new())
                .map_err(|e| {
                    AppError::Database(format!("Failed to index incident: {}", e))
                })?;
            rebuilt += 1;
        }

        tracing::warn!(rebuilt, "Rebuilt created_at index for Sled store");
        Ok(())
    }

    fn load(&self, id: i64) -> Result<Option<Incident>> {
        match self.incidents_tree.get(Self::incident_key(id)) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_incident(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Database(format!(
                "Failed to get incident: {}",
                e
            ))),
        }
    }

    fn matching(&self, query: &IncidentQuery) -> Result<Vec<Incident>> {
        let mut incidents = Vec::new();
        for item in self.incidents_tree.iter() {
            let (_, bytes) = item.map_err(|e| {
                AppError::Database(format!("Failed to scan incidents: {}", e))
            })?;
            let incident = Self::deserialize_incident(&bytes)?;
            if query.matches(&incident) {
                incidents.push(incident);
            }
        }
        Ok(incidents)
    }

    /// The write is already committed when this runs. A failed flush is
    /// logged and left to sled's background flusher and to `shutdown`.
    async fn flush_committed(&self, incident_id: i64) {
        if let Err(e) = self.incidents_tree.flush_async().await {
            tracing::warn!(incident_id, error = %e, "Failed to flush committed incident");
        }
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(|e| {
            AppError::Database(format!("Failed to flush database: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for SledStore {
    async fn create_incident(&self, draft: NewIncident) -> Result<Incident> {
        let incident = Incident::from_draft(self.next_id()?, draft);
        let value = Self::serialize_incident(&incident)?;
        let record_key = Self::incident_key(incident.id);
        let index_key = Self::index_key(&incident);

        // Record and index entry become visible together
        let committed: std::result::Result<(), TransactionError<()>> =
            (&self.incidents_tree, &self.created_index).transaction(|(records, index)| {
                records.insert(&record_key[..], value.as_slice())?;
                index.insert(&index_key[..], Vec::<u8>::new())?;
                Ok::<_, ConflictableTransactionError<()>>(())
            });

        match committed {
            Ok(()) => {}
            Err(TransactionError::Storage(e)) => {
                return Err(AppError::Database(format!("Failed to save incident: {}", e)));
            }
            Err(TransactionError::Abort(())) => {
                return Err(AppError::Database("Incident write aborted".to_string()));
            }
        }

        self.flush_committed(incident.id).await;

        tracing::debug!(incident_id = incident.id, "Incident saved to Sled");
        Ok(incident)
    }

    async fn get_incident(&self, id: i64) -> Result<Option<Incident>> {
        self.load(id)
    }

    async fn list_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>> {
        let limit = query.limit as usize;
        let offset = query.offset();
        let mut page = Vec::with_capacity(limit.min(64));
        if limit == 0 {
            return Ok(page);
        }

        // Newest first; stops once the page is full
        let mut skipped = 0usize;
        for item in self.created_index.iter().rev() {
            let (index_key, _) = item.map_err(|e| {
                AppError::Database(format!("Failed to scan created_at index: {}", e))
            })?;

            let Some(incident) = self.load(Self::id_from_index_key(&index_key)?)? else {
                continue;
            };
            if !query.matches(&incident) {
                continue;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }

            page.push(incident);
            if page.len() == limit {
                break;
            }
        }

        Ok(page)
    }

    async fn count_incidents(&self, query: &IncidentQuery) -> Result<u64> {
        if query.incident_type.is_none() && query.source.is_none() {
            return Ok(self.incidents_tree.len() as u64);
        }
        Ok(self.matching(query)?.len() as u64)
    }

    async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<Incident> {
        let key = Self::incident_key(id);

        // Compare-and-swap so a concurrent writer to the same record is never lost.
        // `created_at` never changes, so the index entry stays valid.
        loop {
            let current = self
                .incidents_tree
                .get(key)
                .map_err(|e| AppError::Database(format!("Failed to get incident: {}", e)))?
                .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))?;

            let mut incident = Self::deserialize_incident(&current)?;
            incident.incident_type = status;
            let value = Self::serialize_incident(&incident)?;

            let swapped = self
                .incidents_tree
                .compare_and_swap(key, Some(&current), Some(value))
                .map_err(|e| {
                    AppError::Database(format!("Failed to update incident: {}", e))
                })?;

            if swapped.is_ok() {
                self.flush_committed(id).await;

                tracing::debug!(incident_id = id, status = %status, "Incident status updated in Sled");
                return Ok(incident);
            }

            tracing::debug!(incident_id = id, "Concurrent update detected, retrying");
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.flush().await?;
        tracing::info!("Sled store flushed");
        Ok(())
    }
}
