// ============================================
// Dynamic Fusion & Recommender
// ============================================
//
// Turns vectors into ordered recommendation lists through three tiers:
// 1. Dynamic: the behavior tracker's fused user vector, when available
// 2. Static: unweighted mean of the history items' embeddings
// 3. Popularity: log-dampened count/quality composite for true cold start
//
// Excluded items are masked with an unrankable sentinel score before
// top-k selection; ties are broken by ascending item id for determinism.
//
// The recommender is an explicit service object constructed once by the
// host and shared by handle; there is no global instance.

use crate::behavior::BehaviorTracker;
use crate::models::{Interaction, ScoredItem};
use crate::utils::cosine_similarity;
use chrono::Utc;
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Similarity assigned to excluded items so they can never be ranked
const EXCLUDED_SCORE: f32 = -1.0;

/// Popularity score weights: 0.6·ln(count) + 0.4·mean_rating.
/// The log dampens raw popularity so quality still matters.
const POPULARITY_COUNT_WEIGHT: f32 = 0.6;
const POPULARITY_RATING_WEIGHT: f32 = 0.4;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Popularity ranking requires the ratings dataset to be loaded")]
    RatingsNotLoaded,
}

pub type Result<T> = std::result::Result<T, RecommendError>;

pub struct Recommender {
    user_embeddings: Array2<f32>,
    item_embeddings: Arc<Array2<f32>>,
    ratings: Option<Vec<Interaction>>,
    tracker: Option<Arc<BehaviorTracker>>,
    /// Minimum events for a behavior-only dynamic vector
    min_events: usize,
}

impl Recommender {
    pub fn new(user_embeddings: Array2<f32>, item_embeddings: Arc<Array2<f32>>) -> Self {
        Recommender {
            user_embeddings,
            item_embeddings,
            ratings: None,
            tracker: None,
            min_events: 1,
        }
    }

    /// Attach the persisted ratings dataset used for popularity statistics.
    pub fn with_ratings(mut self, ratings: Vec<Interaction>) -> Self {
        self.ratings = Some(ratings);
        self
    }

    /// Attach a behavior tracker to enable the dynamic path.
    pub fn with_tracker(mut self, tracker: Arc<BehaviorTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_min_events(mut self, min_events: usize) -> Self {
        self.min_events = min_events;
        self
    }

    pub fn item_embeddings(&self) -> &Arc<Array2<f32>> {
        &self.item_embeddings
    }

    /// Pretrained user factor, when the user index is in the trained range.
    fn pretrained_user(&self, user_id: usize) -> Option<Array1<f32>> {
        if user_id < self.user_embeddings.nrows() {
            Some(self.user_embeddings.row(user_id).to_owned())
        } else {
            None
        }
    }

    /// Ranked recommendations for a user.
    ///
    /// `user_history` is the list of item ids the user has already seen;
    /// `user_id` enables the dynamic path and pretrained fusion when known.
    pub fn recommend(
        &self,
        user_history: &[usize],
        top_k: usize,
        exclude_seen: bool,
        user_id: Option<usize>,
        use_dynamic: bool,
    ) -> Result<Vec<ScoredItem>> {
        // Dynamic path: behavior-derived vector, fused with the pretrained
        // factor when one exists
        if use_dynamic {
            if let (Some(tracker), Some(uid)) = (&self.tracker, user_id) {
                let pretrained = self.pretrained_user(uid);
                if let Some(user_vector) =
                    tracker.compute_user_vector(uid, Utc::now(), self.min_events, pretrained.as_ref())
                {
                    debug!(user_id = uid, "Serving dynamic recommendations");
                    let mut exclude: Vec<usize> = Vec::new();
                    if exclude_seen {
                        exclude.extend_from_slice(user_history);
                        exclude.extend(tracker.seen_items(uid));
                    }
                    return Ok(self.rank_by_similarity(&user_vector, top_k, &exclude));
                }
            }
        }

        // Static path: mean of the history items' embeddings
        if !user_history.is_empty() {
            let dim = self.item_embeddings.ncols();
            let mut user_vector = Array1::<f32>::zeros(dim);
            let mut count = 0usize;
            for &item_id in user_history {
                if item_id < self.item_embeddings.nrows() {
                    user_vector += &self.item_embeddings.row(item_id);
                    count += 1;
                }
            }
            if count > 0 {
                user_vector /= count as f32;
                debug!(history_len = count, "Serving static recommendations");
                let exclude: &[usize] = if exclude_seen { user_history } else { &[] };
                return Ok(self.rank_by_similarity(&user_vector, top_k, exclude));
            }
        }

        // True cold start
        debug!("Serving popularity fallback");
        self.popularity(top_k)
    }

    /// Items most similar to the given item, excluding itself.
    pub fn find_similar(&self, item_id: usize, top_k: usize) -> Vec<ScoredItem> {
        if item_id >= self.item_embeddings.nrows() {
            return Vec::new();
        }
        let target = self.item_embeddings.row(item_id).to_owned();
        self.rank_by_similarity(&target, top_k, &[item_id])
    }

    /// Popularity ranking: score = 0.6·ln(count) + 0.4·mean_rating over the
    /// persisted (unfiltered) ratings dataset.
    pub fn popularity(&self, top_k: usize) -> Result<Vec<ScoredItem>> {
        let ratings = self.ratings.as_ref().ok_or(RecommendError::RatingsNotLoaded)?;

        let mut counts: HashMap<usize, (u64, f64)> = HashMap::new();
        for r in ratings {
            let entry = counts.entry(r.item).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += r.rating as f64;
        }

        let mut scored: Vec<ScoredItem> = counts
            .into_iter()
            .map(|(item_id, (count, sum))| {
                let mean = (sum / count as f64) as f32;
                let score = POPULARITY_COUNT_WEIGHT * (count as f32).ln()
                    + POPULARITY_RATING_WEIGHT * mean;
                ScoredItem { item_id, score }
            })
            .collect();

        sort_descending(&mut scored);
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Cosine-rank every item against `query`, masking excluded items.
    fn rank_by_similarity(
        &self,
        query: &Array1<f32>,
        top_k: usize,
        exclude: &[usize],
    ) -> Vec<ScoredItem> {
        let mut scored: Vec<ScoredItem> = self
            .item_embeddings
            .rows()
            .into_iter()
            .enumerate()
            .map(|(item_id, row)| ScoredItem {
                item_id,
                score: cosine_similarity(query.view(), row),
            })
            .collect();

        for &item_id in exclude {
            if let Some(entry) = scored.get_mut(item_id) {
                entry.score = EXCLUDED_SCORE;
            }
        }

        sort_descending(&mut scored);
        scored.truncate(top_k);
        scored
    }
}

/// Descending by score, ties broken by ascending item id for determinism.
fn sort_descending(scored: &mut [ScoredItem]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.item_id.cmp(&b.item_id))
    });
}
