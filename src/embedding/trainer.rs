// ============================================
// Embedding Trainer
// ============================================
//
// Supervised regression over observed (user, item, rating) triples:
// squared error between the predicted dot product and the observed
// rating, plus an L2 penalty proportional to the Frobenius norm of both
// embedding matrices. Data is shuffled once with a fixed seed and split
// into train/validation partitions before batching; validation runs
// without gradient updates.
//
// The propagation operator is linear and symmetric, so gradients on the
// final embeddings are carried back to the input embeddings by applying
// the same layer-averaged operator.

use super::{PropagationModel, TrainError};
use crate::graph::InteractionGraph;
use crate::models::Interaction;
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
    pub validation_split: f32,
    /// Weight of the Frobenius-norm penalty on both embedding matrices
    pub l2_weight: f32,
    /// Seed for the one-time shuffle before the train/validation split
    pub shuffle_seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            epochs: 50,
            learning_rate: 0.001,
            batch_size: 1024,
            validation_split: 0.2,
            l2_weight: 0.001,
            shuffle_seed: 42,
        }
    }
}

/// Per-epoch average losses, returned to the caller for reporting.
#[derive(Debug, Clone, Default)]
pub struct TrainReport {
    pub train_losses: Vec<f32>,
    pub val_losses: Vec<f32>,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Optimize the model's embeddings in place.
    ///
    /// Only interactions at or above the graph's rating threshold are used
    /// as regression targets, mirroring the edges the graph retains.
    pub fn fit(
        &self,
        model: &mut PropagationModel,
        graph: &InteractionGraph,
        interactions: &[Interaction],
    ) -> Result<TrainReport, TrainError> {
        let mut data: Vec<Interaction> = interactions
            .iter()
            .filter(|r| r.rating >= graph.min_rating)
            .copied()
            .collect();

        let mut rng = StdRng::seed_from_u64(self.config.shuffle_seed);
        data.shuffle(&mut rng);

        let split_idx =
            ((data.len() as f32) * (1.0 - self.config.validation_split)).floor() as usize;
        let (train_data, val_data) = data.split_at(split_idx);

        let train_batches = train_data.chunks(self.config.batch_size).count();
        let val_batches = val_data.chunks(self.config.batch_size).count();
        if train_batches == 0 {
            return Err(TrainError::EmptyPartition { partition: "train" });
        }
        if val_batches == 0 {
            return Err(TrainError::EmptyPartition {
                partition: "validation",
            });
        }

        info!(
            train_size = train_data.len(),
            val_size = val_data.len(),
            epochs = self.config.epochs,
            learning_rate = self.config.learning_rate,
            batch_size = self.config.batch_size,
            "Starting embedding training"
        );

        let mut report = TrainReport::default();
        let num_users = model.num_users();

        for epoch in 0..self.config.epochs {
            let mut total_loss = 0.0f32;

            for batch in train_data.chunks(self.config.batch_size) {
                let (user_final, item_final) = model.forward(graph);

                // Squared-error loss and its gradient on the final embeddings
                let mut grad_final =
                    Array2::<f32>::zeros((graph.num_nodes(), model.embedding_dim()));
                let mut batch_loss = 0.0f32;
                let inv_batch = 1.0 / batch.len() as f32;

                for r in batch {
                    let u_row = user_final.row(r.user);
                    let i_row = item_final.row(r.item);
                    let err = u_row.dot(&i_row) - r.rating;
                    batch_loss += err * err;

                    let coef = 2.0 * err * inv_batch;
                    grad_final
                        .row_mut(r.user)
                        .zip_mut_with(&i_row, |g, &v| *g += coef * v);
                    grad_final
                        .row_mut(num_users + r.item)
                        .zip_mut_with(&u_row, |g, &v| *g += coef * v);
                }
                batch_loss *= inv_batch;

                // Carry the gradient back through the (symmetric) propagation
                let grad_init = model.propagate_mean(&grad_final, graph);
                let grad_users = grad_init.slice(s![..num_users, ..]);
                let grad_items = grad_init.slice(s![num_users.., ..]);

                // Frobenius-norm penalty: d/dE of w·||E|| is w·E/||E||
                let user_norm = frobenius_norm(&model.user_embedding);
                let item_norm = frobenius_norm(&model.item_embedding);
                batch_loss += self.config.l2_weight * (user_norm + item_norm);

                let lr = self.config.learning_rate;
                let l2 = self.config.l2_weight;
                if user_norm > 0.0 {
                    let reg = &model.user_embedding * (l2 / user_norm);
                    model.user_embedding -= &((&grad_users.to_owned() + &reg) * lr);
                } else {
                    model.user_embedding -= &(&grad_users.to_owned() * lr);
                }
                if item_norm > 0.0 {
                    let reg = &model.item_embedding * (l2 / item_norm);
                    model.item_embedding -= &((&grad_items.to_owned() + &reg) * lr);
                } else {
                    model.item_embedding -= &(&grad_items.to_owned() * lr);
                }

                total_loss += batch_loss;
            }

            let avg_train_loss = total_loss / train_batches as f32;

            // Validation pass, no updates
            let (user_final, item_final) = model.forward(graph);
            let mut val_loss = 0.0f32;
            for batch in val_data.chunks(self.config.batch_size) {
                let mut batch_loss = 0.0f32;
                for r in batch {
                    let err = user_final.row(r.user).dot(&item_final.row(r.item)) - r.rating;
                    batch_loss += err * err;
                }
                val_loss += batch_loss / batch.len() as f32;
            }
            let avg_val_loss = val_loss / val_batches as f32;

            report.train_losses.push(avg_train_loss);
            report.val_losses.push(avg_val_loss);

            if epoch == 0 || (epoch + 1) % 10 == 0 {
                info!(
                    epoch = epoch + 1,
                    train_loss = avg_train_loss,
                    val_loss = avg_val_loss,
                    "Training progress"
                );
            }
        }

        info!("Embedding training complete");
        Ok(report)
    }
}

fn frobenius_norm(m: &Array2<f32>) -> f32 {
    m.iter().map(|v| v * v).sum::<f32>().sqrt()
}
