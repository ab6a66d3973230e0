use serde::Deserialize;
use std::env;

/// Engine configuration, read from the environment with sane defaults.
///
/// The host application constructs one of these and wires the engine
/// components explicitly; there is no global instance.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub behavior: BehaviorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Directory holding versioned embedding artifacts
    pub model_dir: String,
    pub embedding_dim: usize,
    pub num_layers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
    /// Only interactions with rating >= min_rating become graph edges
    pub min_rating: f32,
    pub validation_split: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BehaviorConfig {
    /// Events older than this are worth zero and eligible for cleanup
    pub decay_days: i64,
    /// Minimum events before a behavior-only user vector is trusted
    pub min_events: usize,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        EngineConfig {
            model: ModelConfig {
                model_dir: env::var("MODEL_DIR").unwrap_or_else(|_| "data/model".to_string()),
                embedding_dim: env::var("EMBEDDING_DIM")
                    .unwrap_or_else(|_| "64".to_string())
                    .parse()
                    .expect("EMBEDDING_DIM must be a valid usize"),
                num_layers: env::var("NUM_LAYERS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .expect("NUM_LAYERS must be a valid usize"),
            },
            training: TrainingConfig {
                epochs: env::var("EPOCHS")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .expect("EPOCHS must be a valid usize"),
                learning_rate: env::var("LEARNING_RATE")
                    .unwrap_or_else(|_| "0.001".to_string())
                    .parse()
                    .expect("LEARNING_RATE must be a valid f32"),
                batch_size: env::var("BATCH_SIZE")
                    .unwrap_or_else(|_| "1024".to_string())
                    .parse()
                    .expect("BATCH_SIZE must be a valid usize"),
                min_rating: env::var("MIN_RATING")
                    .unwrap_or_else(|_| "4.0".to_string())
                    .parse()
                    .expect("MIN_RATING must be a valid f32"),
                validation_split: env::var("VALIDATION_SPLIT")
                    .unwrap_or_else(|_| "0.2".to_string())
                    .parse()
                    .expect("VALIDATION_SPLIT must be a valid f32"),
            },
            behavior: BehaviorConfig {
                decay_days: env::var("DECAY_DAYS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("DECAY_DAYS must be a valid i64"),
                min_events: env::var("MIN_EVENTS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .expect("MIN_EVENTS must be a valid usize"),
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            model: ModelConfig {
                model_dir: "data/model".to_string(),
                embedding_dim: 64,
                num_layers: 3,
            },
            training: TrainingConfig {
                epochs: 50,
                learning_rate: 0.001,
                batch_size: 1024,
                min_rating: 4.0,
                validation_split: 0.2,
            },
            behavior: BehaviorConfig {
                decay_days: 30,
                min_events: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.model.embedding_dim, 64);
        assert_eq!(config.model.num_layers, 3);
        assert_eq!(config.training.min_rating, 4.0);
        assert_eq!(config.behavior.decay_days, 30);
    }
}
