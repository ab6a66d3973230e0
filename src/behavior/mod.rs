// ============================================
// Behavior Tracking Module
// ============================================
//
// Serving-time half of the personalization engine:
// 1. Typed, timestamped per-user/per-item events with an injectable
//    weight table
// 2. Linear time decay over a fixed horizon
// 3. Dynamic user vectors: decayed, weighted aggregation of item
//    embeddings, optionally fused with a pretrained factor
//
// Durability is an append-only JSONL log behind a single writer; a log
// failure never loses the in-memory event (degraded durability only).

pub mod log;
pub mod tracker;

pub use log::EventLog;
pub use tracker::BehaviorTracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("Unknown item {0}: no embedding row for it")]
    UnknownItem(usize),

    #[error("Invalid rating {0}: must be a finite score on the 0-10 scale")]
    InvalidRating(f32),
}

pub type Result<T> = std::result::Result<T, BehaviorError>;

/// Stored behavior kind. Rating signals are pre-classified into three
/// weight tiers before storage, so `Rate` itself never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    Like,
    Favorite,
    RateHigh,
    RateMedium,
    RateLow,
    Click,
    View,
    Watch,
    Share,
    Comment,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Like => "like",
            BehaviorKind::Favorite => "favorite",
            BehaviorKind::RateHigh => "rate_high",
            BehaviorKind::RateMedium => "rate_medium",
            BehaviorKind::RateLow => "rate_low",
            BehaviorKind::Click => "click",
            BehaviorKind::View => "view",
            BehaviorKind::Watch => "watch",
            BehaviorKind::Share => "share",
            BehaviorKind::Comment => "comment",
        }
    }
}

/// Behavior kind -> weight in [0, 1]. Fixed, injectable configuration.
#[derive(Debug, Clone)]
pub struct BehaviorWeights {
    weights: HashMap<BehaviorKind, f64>,
    /// Used for kinds absent from the table
    default_weight: f64,
}

impl Default for BehaviorWeights {
    fn default() -> Self {
        let weights = HashMap::from([
            (BehaviorKind::Like, 1.0),
            (BehaviorKind::Favorite, 0.8),
            (BehaviorKind::RateHigh, 0.7),
            (BehaviorKind::RateMedium, 0.5),
            (BehaviorKind::RateLow, 0.3),
            (BehaviorKind::Watch, 0.6),
            (BehaviorKind::Share, 0.6),
            (BehaviorKind::Comment, 0.5),
            (BehaviorKind::Click, 0.3),
            (BehaviorKind::View, 0.3),
        ]);
        BehaviorWeights {
            weights,
            default_weight: 0.3,
        }
    }
}

impl BehaviorWeights {
    pub fn with_override(mut self, kind: BehaviorKind, weight: f64) -> Self {
        self.weights.insert(kind, weight);
        self
    }

    pub fn weight(&self, kind: BehaviorKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(self.default_weight)
    }
}

/// Incoming behavior signal, validated at the boundary.
///
/// `Rate` carries a score on the 0-10 scale and is classified into a
/// weight tier before storage; the other payloads are kept as event
/// detail for history queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorSignal {
    Click,
    View,
    Watch { duration_secs: u32 },
    Like,
    Favorite,
    Rate { score: f32 },
    Share,
    Comment { text: String },
}

impl BehaviorSignal {
    /// Classify into the stored kind plus retained detail.
    pub(crate) fn classify(self) -> Result<(BehaviorKind, Option<EventDetail>)> {
        match self {
            BehaviorSignal::Click => Ok((BehaviorKind::Click, None)),
            BehaviorSignal::View => Ok((BehaviorKind::View, None)),
            BehaviorSignal::Like => Ok((BehaviorKind::Like, None)),
            BehaviorSignal::Favorite => Ok((BehaviorKind::Favorite, None)),
            BehaviorSignal::Share => Ok((BehaviorKind::Share, None)),
            BehaviorSignal::Watch { duration_secs } => Ok((
                BehaviorKind::Watch,
                Some(EventDetail::Watch { duration_secs }),
            )),
            BehaviorSignal::Comment { text } => {
                Ok((BehaviorKind::Comment, Some(EventDetail::Comment { text })))
            }
            BehaviorSignal::Rate { score } => {
                if !score.is_finite() || !(0.0..=10.0).contains(&score) {
                    return Err(BehaviorError::InvalidRating(score));
                }
                let kind = if score >= 8.0 {
                    BehaviorKind::RateHigh
                } else if score >= 5.0 {
                    BehaviorKind::RateMedium
                } else {
                    BehaviorKind::RateLow
                };
                Ok((kind, Some(EventDetail::Rate { score })))
            }
        }
    }
}

/// Typed event detail retained alongside the classified kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDetail {
    Rate { score: f32 },
    Watch { duration_secs: u32 },
    Comment { text: String },
}

/// One stored behavior event. Append-only; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub user_id: usize,
    pub item_id: usize,
    pub kind: BehaviorKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<EventDetail>,
}

/// Linear time decay: max(0, 1 - elapsed_days / horizon_days).
///
/// Pure in (event_time, now, horizon); monotonically non-increasing in
/// elapsed time, clamped to [0, 1], exactly 0 once the horizon is reached.
pub fn linear_decay(event_time: DateTime<Utc>, now: DateTime<Utc>, horizon_days: i64) -> f64 {
    if horizon_days <= 0 {
        return 0.0;
    }
    let elapsed_secs = (now - event_time).num_seconds();
    if elapsed_secs <= 0 {
        return 1.0;
    }
    let elapsed_days = elapsed_secs as f64 / 86_400.0;
    (1.0 - elapsed_days / horizon_days as f64).max(0.0)
}
