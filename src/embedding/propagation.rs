// ============================================
// Layer-Averaged Propagation Model
// ============================================
//
// Message-passing network over the bipartite interaction graph:
// 1. User and item embeddings are concatenated into one node matrix
// 2. K symmetric-normalized neighborhood aggregation steps, each step
//    purely re-weights and sums neighbor embeddings (no learned weights)
// 3. The input embedding and all K propagated layers are averaged
//    element-wise, which captures higher-order structure without the
//    over-smoothing of taking only the deepest layer
//
// Prediction for a (user, item) pair is the dot product of their final
// embeddings.

use crate::graph::InteractionGraph;
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Standard deviation of the zero-mean initial embedding distribution
const INIT_STD: f32 = 0.1;

pub struct PropagationModel {
    num_users: usize,
    num_items: usize,
    embedding_dim: usize,
    num_layers: usize,
    pub(crate) user_embedding: Array2<f32>,
    pub(crate) item_embedding: Array2<f32>,
}

impl PropagationModel {
    /// Create a model with embeddings drawn from N(0, INIT_STD²).
    pub fn new(
        num_users: usize,
        num_items: usize,
        embedding_dim: usize,
        num_layers: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0f32, INIT_STD).expect("valid normal distribution");

        let user_embedding =
            Array2::from_shape_fn((num_users, embedding_dim), |_| normal.sample(&mut rng));
        let item_embedding =
            Array2::from_shape_fn((num_items, embedding_dim), |_| normal.sample(&mut rng));

        PropagationModel {
            num_users,
            num_items,
            embedding_dim,
            num_layers,
            user_embedding,
            item_embedding,
        }
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// One normalized aggregation step: out[dst] += x[src] / sqrt(deg(src)·deg(dst)).
    ///
    /// Isolated nodes propagate to nothing and receive nothing, so their
    /// output row is zero; layer averaging still retains their share of the
    /// input embedding.
    fn propagate_step(x: &Array2<f32>, graph: &InteractionGraph, deg: &[f32]) -> Array2<f32> {
        let mut out = Array2::zeros(x.raw_dim());
        for &(src, dst) in &graph.edges {
            let norm = (deg[src] * deg[dst]).sqrt();
            if norm == 0.0 {
                continue;
            }
            let scale = 1.0 / norm;
            let src_row = x.row(src);
            let mut dst_row = out.row_mut(dst);
            dst_row.zip_mut_with(&src_row, |o, &v| *o += v * scale);
        }
        out
    }

    /// Apply the layer-averaged propagation operator to a node matrix:
    /// mean of the input and its K propagated layers.
    ///
    /// The operator is linear and symmetric, so the trainer reuses it to
    /// carry output-side gradients back to the input embeddings.
    pub(crate) fn propagate_mean(&self, x: &Array2<f32>, graph: &InteractionGraph) -> Array2<f32> {
        let deg = graph.degrees();
        let mut acc = x.clone();
        let mut layer = x.clone();
        for _ in 0..self.num_layers {
            layer = Self::propagate_step(&layer, graph, &deg);
            acc += &layer;
        }
        acc / (self.num_layers as f32 + 1.0)
    }

    /// Full forward pass: final user and item embedding matrices.
    pub fn forward(&self, graph: &InteractionGraph) -> (Array2<f32>, Array2<f32>) {
        let mut all = Array2::zeros((self.num_users + self.num_items, self.embedding_dim));
        all.slice_mut(s![..self.num_users, ..])
            .assign(&self.user_embedding);
        all.slice_mut(s![self.num_users.., ..])
            .assign(&self.item_embedding);

        let final_emb = self.propagate_mean(&all, graph);

        let user_final = final_emb.slice(s![..self.num_users, ..]).to_owned();
        let item_final = final_emb.slice(s![self.num_users.., ..]).to_owned();
        (user_final, item_final)
    }

    /// Predicted ratings for (user, item) pairs against precomputed final embeddings.
    pub fn predict(
        user_final: &Array2<f32>,
        item_final: &Array2<f32>,
        pairs: &[(usize, usize)],
    ) -> Vec<f32> {
        pairs
            .iter()
            .map(|&(u, i)| user_final.row(u).dot(&item_final.row(i)))
            .collect()
    }
}
