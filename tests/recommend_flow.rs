// End-to-end flow over a small synthetic catalog: train embeddings on a
// block-structured interaction set, persist and reload them, then serve
// recommendations through every fallback tier.

use recommendation_core::{
    graph::InteractionGraph, BehaviorSignal, BehaviorTracker, EmbeddingStore, Interaction,
    PropagationModel, Recommender, Trainer, TrainerConfig,
};
use std::sync::Arc;

/// Two taste clusters: users 0-2 rate items 0-2 highly, users 3-5 rate
/// items 3-5 highly; a sprinkling of low ratings crosses the clusters.
fn synthetic_interactions() -> Vec<Interaction> {
    let mut data = Vec::new();
    for u in 0..3 {
        for i in 0..3 {
            data.push(Interaction { user: u, item: i, rating: 5.0, timestamp: 1_000 + i as i64 });
        }
        data.push(Interaction { user: u, item: 4, rating: 1.0, timestamp: 2_000 });
    }
    for u in 3..6 {
        for i in 3..6 {
            data.push(Interaction { user: u, item: i, rating: 4.5, timestamp: 3_000 + i as i64 });
        }
        data.push(Interaction { user: u, item: 0, rating: 2.0, timestamp: 4_000 });
    }
    data
}

fn train_embeddings(data: &[Interaction]) -> (InteractionGraph, PropagationModel) {
    let graph = InteractionGraph::build(data, 4.0);
    let mut model = PropagationModel::new(graph.num_users, graph.num_items, 16, 2, 42);
    let trainer = Trainer::new(TrainerConfig {
        epochs: 30,
        learning_rate: 0.05,
        batch_size: 8,
        validation_split: 0.25,
        ..TrainerConfig::default()
    });
    trainer
        .fit(&mut model, &graph, data)
        .expect("training should succeed on the synthetic set");
    (graph, model)
}

#[test]
fn trained_embeddings_survive_store_round_trip() {
    let data = synthetic_interactions();
    let (graph, model) = train_embeddings(&data);
    let (user_emb, item_emb) = model.forward(&graph);

    let dir = tempfile::tempdir().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.save(&user_emb, &item_emb).unwrap();
    store.save_ratings(&data).unwrap();

    let (loaded_user, loaded_item) = store.load().unwrap().expect("artifact was just saved");
    assert_eq!(loaded_user, user_emb);
    assert_eq!(loaded_item, item_emb);
    assert_eq!(store.load_ratings().unwrap().unwrap().len(), data.len());
}

#[test]
fn recommendations_respect_taste_clusters() {
    let data = synthetic_interactions();
    let (graph, model) = train_embeddings(&data);
    let (user_emb, item_emb) = model.forward(&graph);

    let rec = Recommender::new(user_emb, Arc::new(item_emb)).with_ratings(data);

    // A user with history inside cluster A should be recommended the
    // remaining cluster-A item ahead of cluster-B items
    let results = rec.recommend(&[0, 1], 4, true, None, false).unwrap();
    assert!(!results.iter().any(|s| s.item_id == 0 || s.item_id == 1));
    assert_eq!(results[0].item_id, 2, "expected the third cluster-A item first");
}

#[test]
fn cold_start_serves_popularity() {
    let data = synthetic_interactions();
    let (graph, model) = train_embeddings(&data);
    let (user_emb, item_emb) = model.forward(&graph);

    let rec = Recommender::new(user_emb, Arc::new(item_emb)).with_ratings(data);

    let cold = rec.recommend(&[], 3, true, None, true).unwrap();
    let popular = rec.popularity(3).unwrap();
    assert_eq!(cold, popular);
    assert!(cold.len() <= 3);
}

#[test]
fn behavior_events_steer_dynamic_recommendations() {
    let data = synthetic_interactions();
    let (graph, model) = train_embeddings(&data);
    let (user_emb, item_emb) = model.forward(&graph);
    let item_emb = Arc::new(item_emb);

    let dir = tempfile::tempdir().unwrap();
    let tracker = Arc::new(
        BehaviorTracker::new(item_emb.clone(), 30)
            .with_log(dir.path().join("events.log"))
            .unwrap(),
    );

    // User 0 (trained on cluster A) binges cluster B
    for item in 3..6 {
        tracker.record(0, item, BehaviorSignal::Like).unwrap();
        tracker.record(0, item, BehaviorSignal::Watch { duration_secs: 3600 }).unwrap();
        tracker
            .record(0, item, BehaviorSignal::Rate { score: 9.5 })
            .unwrap();
    }

    let rec = Recommender::new(user_emb, item_emb)
        .with_ratings(data)
        .with_tracker(tracker.clone());

    let results = rec.recommend(&[], 3, true, Some(0), true).unwrap();
    // Behavior items are excluded from the list
    assert!(results.iter().all(|s| !(3..6).contains(&s.item_id)));

    // Tracker state survives a restart through the event log
    let item_emb = rec.item_embeddings().clone();
    drop(rec);
    drop(tracker);
    let revived = BehaviorTracker::new(item_emb, 30)
        .with_log(dir.path().join("events.log"))
        .unwrap();
    let stats = revived.statistics();
    assert_eq!(stats.event_count, 9);
    assert_eq!(revived.seen_items(0).len(), 3);
}

#[test]
fn behavior_statistics_reflect_recorded_kinds() {
    let item_emb = Arc::new(ndarray::Array2::<f32>::ones((4, 8)));
    let tracker = BehaviorTracker::new(item_emb, 30);

    tracker.record(7, 0, BehaviorSignal::Click).unwrap();
    tracker.record(7, 1, BehaviorSignal::Rate { score: 8.0 }).unwrap();
    tracker.record(8, 2, BehaviorSignal::Comment { text: "great".into() }).unwrap();

    let stats = tracker.statistics();
    assert_eq!(stats.user_count, 2);
    assert_eq!(stats.event_count, 3);
    assert_eq!(stats.kind_histogram.get("rate_high"), Some(&1));
    assert_eq!(stats.embedding_dim, 8);
}
