// ============================================
// Graph Embedding Module
// ============================================
//
// Offline half of the personalization engine:
// 1. PropagationModel - layer-averaged graph convolution over the
//    bipartite interaction graph (no learned layer weights)
// 2. Trainer - rating regression with L2 penalty over observed triples
// 3. EmbeddingStore - versioned persistence of the trained matrices and
//    the raw ratings dataset used for popularity statistics

pub mod propagation;
pub mod store;
pub mod trainer;

pub use propagation::PropagationModel;
pub use store::EmbeddingStore;
pub use trainer::{Trainer, TrainerConfig, TrainReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Empty {partition} partition: check dataset size, min_rating and validation_split")]
    EmptyPartition { partition: &'static str },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt artifact {path}: {source}")]
    CorruptArtifact {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Shape mismatch in {artifact}: manifest says {expected}, decoded {actual}")]
    ShapeMismatch {
        artifact: &'static str,
        expected: String,
        actual: String,
    },
}
