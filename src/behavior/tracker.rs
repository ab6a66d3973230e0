// ============================================
// Behavior Tracker
// ============================================
//
// Records typed, timestamped per-user/per-item events and turns them
// into a dynamic user vector:
// 1. Every event weighs its item's embedding by behavior weight x decay
// 2. The weighted sum is normalized into the "behavior vector"
// 3. When a pretrained user factor exists, the two are fused with a
//    coefficient chosen by behavior volume - more behavioral evidence
//    shifts weight away from the stale offline factor
//
// Events referencing items without an embedding row are rejected at
// record time, never silently aggregated with a zero vector.

use super::{
    linear_decay, BehaviorError, BehaviorEvent, BehaviorKind, BehaviorSignal, BehaviorWeights,
    EventLog, Result,
};
use crate::models::EngineStats;
use crate::utils::l2_normalize;
use chrono::{DateTime, Duration, Utc};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Fusion coefficient tiers: weight of the pretrained factor by event count
const ALPHA_FEW: f32 = 0.7; // <= FEW_EVENTS events
const ALPHA_SOME: f32 = 0.5; // <= SOME_EVENTS events
const ALPHA_MANY: f32 = 0.3; // more
const FEW_EVENTS: usize = 10;
const SOME_EVENTS: usize = 20;

type EventMap = HashMap<usize, HashMap<usize, Vec<BehaviorEvent>>>;

pub struct BehaviorTracker {
    item_embeddings: Arc<Array2<f32>>,
    horizon_days: i64,
    weights: BehaviorWeights,
    /// {user_id: {item_id: [events]}}; reads concurrent, writes serialized
    events: RwLock<EventMap>,
    log: Option<EventLog>,
}

impl BehaviorTracker {
    /// In-memory tracker without durability.
    pub fn new(item_embeddings: Arc<Array2<f32>>, horizon_days: i64) -> Self {
        BehaviorTracker {
            item_embeddings,
            horizon_days,
            weights: BehaviorWeights::default(),
            events: RwLock::new(HashMap::new()),
            log: None,
        }
    }

    pub fn with_weights(mut self, weights: BehaviorWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Attach a durable event log and replay its contents into memory.
    pub fn with_log<P: AsRef<Path>>(mut self, path: P) -> std::io::Result<Self> {
        let log = EventLog::open(path)?;
        let replayed = log.replay()?;

        let mut events = self.events.write().expect("behavior store poisoned");
        let mut dropped = 0usize;
        for event in replayed {
            // Items can disappear between runs if the catalog shrank;
            // enforce the known-item invariant on replay too
            if event.item_id >= self.item_embeddings.nrows() {
                dropped += 1;
                continue;
            }
            events
                .entry(event.user_id)
                .or_default()
                .entry(event.item_id)
                .or_default()
                .push(event);
        }
        if dropped > 0 {
            warn!(dropped, "Dropped replayed events referencing unknown items");
        }
        drop(events);

        self.log = Some(log);
        Ok(self)
    }

    pub fn horizon_days(&self) -> i64 {
        self.horizon_days
    }

    pub fn embedding_dim(&self) -> usize {
        self.item_embeddings.ncols()
    }

    /// Record one behavior event, stamped with the current time.
    pub fn record(&self, user_id: usize, item_id: usize, signal: BehaviorSignal) -> Result<()> {
        self.record_at(user_id, item_id, signal, Utc::now())
    }

    pub(crate) fn record_at(
        &self,
        user_id: usize,
        item_id: usize,
        signal: BehaviorSignal,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        if item_id >= self.item_embeddings.nrows() {
            return Err(BehaviorError::UnknownItem(item_id));
        }
        let (kind, detail) = signal.classify()?;

        let event = BehaviorEvent {
            user_id,
            item_id,
            kind,
            timestamp,
            detail,
        };

        {
            let mut events = self.events.write().expect("behavior store poisoned");
            events
                .entry(user_id)
                .or_default()
                .entry(item_id)
                .or_default()
                .push(event.clone());
        }

        // A persistence failure must not lose the in-memory event:
        // subsequent reads in this process stay correct, durability is
        // degraded until the next successful append or compaction
        if let Some(log) = &self.log {
            if let Err(e) = log.append(&event) {
                warn!(
                    user_id,
                    item_id,
                    error = %e,
                    "Failed to persist behavior event; continuing in memory"
                );
            }
        }

        debug!(user_id, item_id, kind = kind.as_str(), "Behavior recorded");
        Ok(())
    }

    /// Compute the dynamic user vector at `now`.
    ///
    /// Returns `None` when the user has no events at all, or fewer than
    /// `min_events` without a pretrained factor to fall back on. The
    /// returned vector is L2-normalized.
    pub fn compute_user_vector(
        &self,
        user_id: usize,
        now: DateTime<Utc>,
        min_events: usize,
        pretrained: Option<&Array1<f32>>,
    ) -> Option<Array1<f32>> {
        let events = self.events.read().expect("behavior store poisoned");
        let user_events = events.get(&user_id)?;

        let event_count: usize = user_events.values().map(|v| v.len()).sum();
        if event_count == 0 {
            return None;
        }
        if pretrained.is_none() && event_count < min_events {
            return None;
        }

        let dim = self.item_embeddings.ncols();
        let mut behavior_vector = Array1::<f32>::zeros(dim);
        let mut total_weight = 0.0f64;

        for (&item_id, item_events) in user_events.iter() {
            let item_row = self.item_embeddings.row(item_id);
            for event in item_events {
                let weight = self.weights.weight(event.kind)
                    * linear_decay(event.timestamp, now, self.horizon_days);
                if weight <= 0.0 {
                    continue;
                }
                let w = weight as f32;
                behavior_vector.zip_mut_with(&item_row, |b, &v| *b += w * v);
                total_weight += weight;
            }
        }
        drop(events);

        if total_weight > 0.0 {
            behavior_vector /= total_weight as f32;
            l2_normalize(&mut behavior_vector);
        }

        let pretrained = match pretrained {
            None => return Some(behavior_vector),
            Some(p) => p,
        };

        let alpha = if event_count <= FEW_EVENTS {
            ALPHA_FEW
        } else if event_count <= SOME_EVENTS {
            ALPHA_SOME
        } else {
            ALPHA_MANY
        };

        let mut pretrained = pretrained.to_owned();
        l2_normalize(&mut pretrained);

        let mut fused = pretrained * alpha + behavior_vector * (1.0 - alpha);
        l2_normalize(&mut fused);
        Some(fused)
    }

    /// Item ids the user has any recorded behavior on.
    pub fn seen_items(&self, user_id: usize) -> Vec<usize> {
        let events = self.events.read().expect("behavior store poisoned");
        events
            .get(&user_id)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Reverse-chronological event history, optionally filtered by kind.
    pub fn history(
        &self,
        user_id: usize,
        limit: usize,
        kind_filter: Option<BehaviorKind>,
    ) -> Vec<BehaviorEvent> {
        let events = self.events.read().expect("behavior store poisoned");
        let user_events = match events.get(&user_id) {
            Some(m) => m,
            None => return Vec::new(),
        };

        let mut history: Vec<BehaviorEvent> = user_events
            .values()
            .flatten()
            .filter(|e| kind_filter.map_or(true, |k| e.kind == k))
            .cloned()
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit);
        history
    }

    /// Physically delete events older than the horizon, removing
    /// now-empty per-item and per-user buckets, then compact the log.
    /// Returns the number of purged events.
    pub fn cleanup(&self, horizon_days: Option<i64>) -> usize {
        let horizon = horizon_days.unwrap_or(self.horizon_days);
        let cutoff = Utc::now() - Duration::days(horizon);

        let mut events = self.events.write().expect("behavior store poisoned");
        let mut removed = 0usize;
        events.retain(|_, user_events| {
            user_events.retain(|_, list| {
                let before = list.len();
                list.retain(|e| e.timestamp >= cutoff);
                removed += before - list.len();
                !list.is_empty()
            });
            !user_events.is_empty()
        });

        if removed > 0 {
            if let Some(log) = &self.log {
                let survivors: Vec<BehaviorEvent> = events
                    .values()
                    .flat_map(|m| m.values())
                    .flatten()
                    .cloned()
                    .collect();
                if let Err(e) = log.compact(&survivors) {
                    warn!(error = %e, "Failed to compact behavior event log");
                }
            }
        }

        info!(removed, horizon_days = horizon, "Behavior cleanup complete");
        removed
    }

    pub fn statistics(&self) -> EngineStats {
        let events = self.events.read().expect("behavior store poisoned");

        let mut event_count = 0usize;
        let mut kind_histogram: HashMap<String, u64> = HashMap::new();
        for user_events in events.values() {
            for list in user_events.values() {
                event_count += list.len();
                for event in list {
                    *kind_histogram.entry(event.kind.as_str().to_string()).or_insert(0) += 1;
                }
            }
        }

        EngineStats {
            user_count: events.len(),
            event_count,
            kind_histogram,
            horizon_days: self.horizon_days,
            embedding_dim: self.item_embeddings.ncols(),
        }
    }
}
