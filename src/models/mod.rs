use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single observed (user, item, rating, timestamp) interaction.
///
/// Indices are dense and zero-based; 1-based external identifiers are
/// remapped at load time. The full unfiltered set is persisted alongside
/// the embeddings so popularity statistics survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user: usize,
    pub item: usize,
    pub rating: f32,
    pub timestamp: i64,
}

/// One entry of a ranked recommendation list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: usize,
    pub score: f32,
}

/// Aggregate behavior-store statistics exposed to collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub user_count: usize,
    pub event_count: usize,
    pub kind_histogram: HashMap<String, u64>,
    pub horizon_days: i64,
    pub embedding_dim: usize,
}
