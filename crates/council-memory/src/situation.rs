use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use council_models::memory_record::{MemoryRecord, MemoryRole};
use tracing::debug;
use uuid::Uuid;

use crate::embedder::{cosine_similarity, Embedder};
use crate::error::MemoryError;
use crate::sqlite::MemoryDb;

/// A stored record returned by `recall`, with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalledMemory {
    pub record: MemoryRecord,
    pub similarity: f32,
}

/// Append-only, similarity-searchable store of past situations for one role.
///
/// Recall is a brute-force cosine scan. When a `MemoryDb` is attached, every record is
/// written through to SQLite before it becomes visible in memory.
pub struct SituationMemory {
    role: MemoryRole,
    embedder: Arc<dyn Embedder>,
    records: RwLock<Vec<MemoryRecord>>,
    db: Option<Arc<Mutex<MemoryDb>>>,
}

impl SituationMemory {
    /// An empty, purely in-process memory.
    pub fn new(role: MemoryRole, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            role,
            embedder,
            records: RwLock::new(Vec::new()),
            db: None,
        }
    }

    /// A memory backed by `db`, preloaded with the role's persisted records.
    pub fn open(
        role: MemoryRole,
        embedder: Arc<dyn Embedder>,
        db: Arc<Mutex<MemoryDb>>,
    ) -> Result<Self, MemoryError> {
        let records = {
            let guard = db
                .lock()
                .map_err(|e| MemoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
            guard.load_records(role)?
        };
        let expected = embedder.dimension();
        if let Some(stale) = records.iter().find(|r| r.embedding.len() != expected) {
            return Err(MemoryError::Embedding(format!(
                "{role} memories were stored with dimension {}, but the embedder produces {expected}",
                stale.embedding.len()
            )));
        }
        debug!(role = %role, records = records.len(), "Loaded situation memory");

        Ok(Self {
            role,
            embedder,
            records: RwLock::new(records),
            db: Some(db),
        })
    }

    pub fn role(&self) -> MemoryRole {
        self.role
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed `situation` and append a new record holding `lesson`.
    pub fn remember(&self, situation: &str, lesson: &str) -> Result<MemoryRecord, MemoryError> {
        let embedding = self.embedder.embed(situation)?;
        let record = MemoryRecord {
            id: Uuid::new_v4(),
            role: self.role,
            situation: situation.to_string(),
            lesson: lesson.to_string(),
            embedding,
            created_at: Utc::now(),
        };

        if let Some(db) = &self.db {
            let guard = db
                .lock()
                .map_err(|e| MemoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
            guard.insert_record(&record)?;
        }

        let mut records = self
            .records
            .write()
            .map_err(|e| MemoryError::Unavailable(format!("memory lock poisoned: {e}")))?;
        records.push(record.clone());
        debug!(role = %self.role, total = records.len(), "Remembered situation");

        Ok(record)
    }

    /// The `k` records most similar to `situation`, best first.
    ///
    /// Equal similarities rank the more recently remembered record first. Returns an
    /// empty list when the store is empty or `k` is zero.
    pub fn recall(&self, situation: &str, k: usize) -> Result<Vec<RecalledMemory>, MemoryError> {
        let records = self
            .records
            .read()
            .map_err(|e| MemoryError::Unavailable(format!("memory lock poisoned: {e}")))?;
        if k == 0 || records.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(situation)?;
        let mut scored: Vec<(usize, f32)> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, cosine_similarity(&query, &r.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.0.cmp(&a.0)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, similarity)| RecalledMemory {
                record: records[i].clone(),
                similarity,
            })
            .collect())
    }
}
