// Offline embedding training job.
//
// Reads the tab-separated ratings dataset, builds the bipartite
// interaction graph, trains the propagation model and activates a new
// embedding version together with the full ratings dataset used for
// popularity statistics.

use anyhow::{bail, Context, Result};
use recommendation_core::{
    graph::{self, InteractionGraph},
    EmbeddingStore, EngineConfig, PropagationModel, Trainer, TrainerConfig,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Seed for embedding initialization
const INIT_SEED: u64 = 42;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::from_env();

    let ratings_path = match std::env::args().nth(1).or_else(|| std::env::var("RATINGS_PATH").ok()) {
        Some(path) => path,
        None => bail!("Usage: train-embeddings <ratings.tsv> (or set RATINGS_PATH)"),
    };

    info!(
        ratings_path = %ratings_path,
        model_dir = %config.model.model_dir,
        embedding_dim = config.model.embedding_dim,
        num_layers = config.model.num_layers,
        "Starting embedding training job"
    );

    let interactions =
        graph::load_interactions(&ratings_path).context("Failed to load ratings dataset")?;
    let graph = InteractionGraph::build(&interactions, config.training.min_rating);

    let mut model = PropagationModel::new(
        graph.num_users,
        graph.num_items,
        config.model.embedding_dim,
        config.model.num_layers,
        INIT_SEED,
    );

    let trainer = Trainer::new(TrainerConfig {
        epochs: config.training.epochs,
        learning_rate: config.training.learning_rate,
        batch_size: config.training.batch_size,
        validation_split: config.training.validation_split,
        ..TrainerConfig::default()
    });
    let report = trainer
        .fit(&mut model, &graph, &interactions)
        .context("Training failed")?;

    // One clean forward pass to extract the final embeddings
    let (user_emb, item_emb) = model.forward(&graph);

    let store = EmbeddingStore::new(&config.model.model_dir);
    store
        .save(&user_emb, &item_emb)
        .context("Failed to save embeddings")?;
    // The full unfiltered dataset backs popularity statistics at serving time
    store
        .save_ratings(&interactions)
        .context("Failed to save ratings dataset")?;

    info!(
        final_train_loss = report.train_losses.last().copied().unwrap_or(f32::NAN),
        final_val_loss = report.val_losses.last().copied().unwrap_or(f32::NAN),
        "Training job complete"
    );
    Ok(())
}
