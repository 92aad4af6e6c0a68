//! In-memory labeled embedding store.
//!
//! Append-only and insertion-ordered: entries are never mutated or removed,
//! and a label may appear any number of times (every enrolled sample of an
//! identity participates in matching). The store owns its entries; callers
//! only ever receive clones.

use crate::error::PipelineError;
use common::validation::safe_unix_timestamp;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// One enrolled embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledEmbedding {
    /// Identity label
    pub label: String,

    /// Face descriptor vector
    pub embedding: Vec<f32>,

    /// Enrollment timestamp (Unix timestamp in seconds)
    pub enrolled_at: u64,
}

/// Label-indexed embedding collection behind a single lock.
///
/// Writes are atomic with respect to snapshots: a reader sees a new entry
/// wholly or not at all, and concurrent enrolls each add exactly one entry.
pub struct EmbeddingStore {
    dim: usize,
    entries: RwLock<Vec<LabeledEmbedding>>,
}

impl EmbeddingStore {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Dimensionality every stored vector must have
    pub fn embedding_dim(&self) -> usize {
        self.dim
    }

    /// Append a new entry. Duplicate labels and vectors are accepted;
    /// a vector of the wrong dimensionality is a collaborator bug and is
    /// rejected rather than silently truncated or padded.
    pub fn enroll(&self, label: String, embedding: Vec<f32>) -> Result<(), PipelineError> {
        if embedding.len() != self.dim {
            return Err(PipelineError::InternalFailure(format!(
                "extractor returned a {}-dim embedding, store expects {}",
                embedding.len(),
                self.dim
            )));
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|e| PipelineError::InternalFailure(format!("store lock poisoned: {e}")))?;
        entries.push(LabeledEmbedding {
            label,
            embedding,
            enrolled_at: safe_unix_timestamp(),
        });

        Ok(())
    }

    /// Number of enrolled entries
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Consistent point-in-time view for a single resolve pass
    pub fn snapshot(&self) -> Vec<LabeledEmbedding> {
        self.read_entries().clone()
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, Vec<LabeledEmbedding>> {
        // A writer can only poison the lock after its entry is fully pushed
        // (or not at all), so the recovered view is still consistent
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
