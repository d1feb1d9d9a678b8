//! Corpus manager: owns the canonical incident store and keeps the dense and
//! sparse indices consistent
//!
//! Mutations are serialised by an async lock and published index-first: the
//! vector upsert and sparse snapshot land before the id becomes visible via
//! `all_ids()`, so an observed id is always present in both indices. The
//! sparse index is derived state and can be rebuilt from this store after a
//! crash.

pub mod feedback;

pub use feedback::FeedbackSink;

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::{Mutex, Semaphore};

use crate::error::{Error, Result};
use crate::providers::{Embedder, IndexMetadata, VectorIndex};
use crate::sparse::{SparseDoc, SparseIndex, SparsePatch};
use crate::types::Incident;

/// Result of an idempotent upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
    /// Identical record already present; no index traffic
    Unchanged,
}

/// Owns the canonical incident records
pub struct CorpusManager {
    incidents: DashMap<String, Incident>,
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorIndex>,
    sparse: Arc<SparseIndex>,
    write_lock: Mutex<()>,
    storage_path: Option<PathBuf>,
}

impl CorpusManager {
    /// Create a manager over the given providers
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorIndex>,
        sparse: Arc<SparseIndex>,
        storage_path: Option<PathBuf>,
    ) -> Self {
        Self {
            incidents: DashMap::new(),
            embedder,
            vector,
            sparse,
            write_lock: Mutex::new(()),
            storage_path,
        }
    }

    /// Load the canonical store from disk and rebuild the sparse index.
    ///
    /// The external vector index is durable and assumed in sync; use
    /// `rebuild_indices` to force a re-embed.
    pub fn load(&self) -> Result<usize> {
        let Some(path) = &self.storage_path else {
            return Ok(0);
        };
        if !path.exists() {
            return Ok(0);
        }

        let data = std::fs::read_to_string(path)?;
        let records: Vec<Incident> = serde_json::from_str(&data)?;
        let mut loaded = 0;

        for mut incident in records {
            incident.normalise();
            if let Err(e) = incident.validate() {
                tracing::warn!(error = %e, "skipping invalid record in corpus file");
                continue;
            }
            self.incidents.insert(incident.id.clone(), incident);
            loaded += 1;
        }

        self.sparse.rebuild(&self.all());
        tracing::info!(loaded, "corpus loaded from {}", path.display());
        Ok(loaded)
    }

    /// Admit a new incident. Duplicate ids are rejected; schema-invalid
    /// records never touch either index.
    pub async fn add(&self, mut incident: Incident) -> Result<()> {
        incident.normalise();
        incident.validate()?;

        let _guard = self.write_lock.lock().await;
        if self.incidents.contains_key(&incident.id) {
            return Err(Error::DuplicateId(incident.id));
        }

        self.publish(&incident).await?;
        self.incidents.insert(incident.id.clone(), incident);
        self.persist();
        Ok(())
    }

    /// Update an existing incident. The embedding is recomputed only when the
    /// searchable text changed.
    pub async fn update(&self, mut incident: Incident) -> Result<()> {
        incident.normalise();
        incident.validate()?;

        let _guard = self.write_lock.lock().await;
        let existing = self
            .incidents
            .get(&incident.id)
            .map(|e| e.clone())
            .ok_or_else(|| Error::NotFound(incident.id.clone()))?;

        if existing.same_text(&incident) {
            // Metadata-only change: refresh the sparse doc (tags feed the
            // anchor set) and the stored record
            self.sparse
                .patch(SparsePatch::Upsert(SparseDoc::from_incident(&incident)));
        } else {
            self.publish(&incident).await?;
        }

        self.incidents.insert(incident.id.clone(), incident);
        self.persist();
        Ok(())
    }

    /// Idempotent admission used by the ingestion pipeline
    pub async fn upsert(&self, mut incident: Incident) -> Result<UpsertOutcome> {
        incident.normalise();
        incident.validate()?;

        match self.incidents.get(&incident.id).map(|e| e.clone()) {
            None => {
                self.add(incident).await?;
                Ok(UpsertOutcome::Added)
            }
            Some(existing) if existing == incident => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                self.update(incident).await?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// Tombstone an incident: removed from the store, the vector index, and
    /// the sparse snapshot
    pub async fn remove(&self, id: &str) -> Result<Incident> {
        let id = id.trim().to_uppercase();
        let _guard = self.write_lock.lock().await;

        let (_, incident) = self
            .incidents
            .remove(&id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        self.vector.delete(&id).await?;
        self.sparse.patch(SparsePatch::Delete(id));
        self.persist();
        Ok(incident)
    }

    /// Fetch an incident by id (case-insensitive)
    pub fn get(&self, id: &str) -> Option<Incident> {
        self.incidents
            .get(&id.trim().to_uppercase())
            .map(|e| e.clone())
    }

    /// Whether an id is admitted
    pub fn contains(&self, id: &str) -> bool {
        self.incidents.contains_key(&id.trim().to_uppercase())
    }

    /// All admitted ids, sorted
    pub fn all_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.incidents.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// All admitted incidents
    pub fn all(&self) -> Vec<Incident> {
        self.incidents.iter().map(|e| e.value().clone()).collect()
    }

    /// Number of admitted incidents
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    /// Whether the corpus is empty
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// Re-embed and re-index every record. Recovery path for a crash between
    /// vector upsert and snapshot publish.
    pub async fn rebuild_indices(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let incidents = self.all();

        let semaphore = Arc::new(Semaphore::new(num_cpus::get().min(4)));
        let embeds = incidents.iter().map(|incident| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| Error::Internal("embed semaphore closed".to_string()))?;
                let vector = self.embedder.embed(&incident.training_text()).await?;
                self.vector
                    .upsert(&incident.id, &vector, IndexMetadata::from_incident(incident))
                    .await
            }
        });
        for result in join_all(embeds).await {
            result?;
        }

        self.sparse.rebuild(&incidents);
        tracing::info!(count = incidents.len(), "indices rebuilt from corpus");
        Ok(incidents.len())
    }

    /// Two-phase publish: vector upsert, then sparse snapshot swap
    async fn publish(&self, incident: &Incident) -> Result<()> {
        let vector = self.embedder.embed(&incident.training_text()).await?;
        self.vector
            .upsert(&incident.id, &vector, IndexMetadata::from_incident(incident))
            .await?;
        self.sparse
            .patch(SparsePatch::Upsert(SparseDoc::from_incident(incident)));
        Ok(())
    }

    fn persist(&self) {
        let Some(path) = &self.storage_path else {
            return;
        };
        let mut records = self.all();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let write = || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(&records)?)?;
            Ok(())
        };
        if let Err(e) = write() {
            tracing::error!(error = %e, "failed to persist corpus");
        }
    }
}
