pub mod behavior;
pub mod config;
pub mod embedding;
pub mod graph;
pub mod models;
pub mod recommend;
pub mod utils;

pub use behavior::{BehaviorKind, BehaviorSignal, BehaviorTracker, BehaviorWeights};
pub use config::EngineConfig;
pub use embedding::{EmbeddingStore, PropagationModel, Trainer, TrainerConfig};
pub use graph::InteractionGraph;
pub use models::{EngineStats, Interaction, ScoredItem};
pub use recommend::Recommender;
