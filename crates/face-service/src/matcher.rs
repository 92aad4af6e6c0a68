//! Nearest-neighbor identity resolution over a store snapshot.
//!
//! Exact linear scan, sized for stores of tens to low thousands of entries.
//! A store far beyond that needs partitioning or an ANN index in front of
//! this contract, not a change to it.

use crate::store::LabeledEmbedding;
use serde::Serialize;

/// Default acceptance threshold for Euclidean distance
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Outcome of resolving a query embedding against the enrolled set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MatchResult {
    /// Nearest entry within the acceptance threshold
    Identified {
        label: String,
        distance: f32,
    },
    /// Store empty, or nearest entry beyond the threshold
    Unknown,
}

/// Euclidean distance between two equal-length vectors.
///
/// Dimensionality is enforced at store ingestion; unequal lengths here are
/// a programming error, not a runtime case.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Resolve `query` against a snapshot.
///
/// The nearest entry wins; an exact distance tie keeps the entry that
/// appears first in snapshot order. The minimum distance must be within
/// `threshold` (inclusive) to identify. An empty snapshot resolves to
/// `Unknown` - a defined base case, never an error.
pub fn resolve(entries: &[LabeledEmbedding], query: &[f32], threshold: f32) -> MatchResult {
    let mut best: Option<(&LabeledEmbedding, f32)> = None;

    for entry in entries {
        let distance = euclidean_distance(&entry.embedding, query);
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((entry, distance)),
        }
    }

    match best {
        Some((entry, distance)) if distance <= threshold => MatchResult::Identified {
            label: entry.label.clone(),
            distance,
        },
        _ => MatchResult::Unknown,
    }
}
