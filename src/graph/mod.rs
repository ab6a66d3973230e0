// ============================================
// Interaction Graph Builder
// ============================================
//
// Turns raw (user, item, rating, timestamp) tuples into a bipartite
// user-item graph for embedding propagation:
// 1. Interactions below the rating threshold are dropped
// 2. Users and items share one node address space, items offset by num_users
// 3. Every retained interaction contributes one edge per direction
//
// Counts are derived as max observed index + 1, so sparse ID spaces are
// not compacted; callers supply dense IDs or accept wasted embedding rows.
// Duplicate interactions are kept and increase propagation weight.

use crate::models::Interaction;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Failed to read interactions file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed interaction record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Bipartite interaction graph in a shared node address space.
///
/// Node indices `[0, num_users)` are users, `[num_users, num_users + num_items)`
/// are items. Edges are directed and stored once per direction.
#[derive(Debug, Clone)]
pub struct InteractionGraph {
    pub num_users: usize,
    pub num_items: usize,
    pub min_rating: f32,
    /// (src, dst) pairs in the shared address space
    pub edges: Vec<(usize, usize)>,
}

impl InteractionGraph {
    /// Build the graph from raw interactions, keeping only rating >= min_rating.
    pub fn build(interactions: &[Interaction], min_rating: f32) -> Self {
        let num_users = interactions.iter().map(|r| r.user + 1).max().unwrap_or(0);
        let num_items = interactions.iter().map(|r| r.item + 1).max().unwrap_or(0);

        let mut edges = Vec::new();
        let mut retained = 0usize;
        for r in interactions {
            if r.rating < min_rating {
                continue;
            }
            let item_node = num_users + r.item;
            edges.push((r.user, item_node));
            edges.push((item_node, r.user));
            retained += 1;
        }

        info!(
            num_users,
            num_items,
            retained_interactions = retained,
            directed_edges = edges.len(),
            "Interaction graph built"
        );

        InteractionGraph {
            num_users,
            num_items,
            min_rating,
            edges,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_users + self.num_items
    }

    /// Per-node degree over the directed edge list.
    ///
    /// Both directions are present for every retained interaction, so
    /// out-degree equals in-degree for every node.
    pub fn degrees(&self) -> Vec<f32> {
        let mut deg = vec![0.0f32; self.num_nodes()];
        for &(src, _) in &self.edges {
            deg[src] += 1.0;
        }
        deg
    }
}

/// Load tab-separated `(user_id, item_id, rating, timestamp)` records with
/// 1-based identifiers, remapping them to dense 0-based indices.
pub fn load_interactions<P: AsRef<Path>>(path: P) -> Result<Vec<Interaction>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut interactions = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 4 {
            return Err(GraphError::MalformedRecord {
                line: idx + 1,
                reason: format!("expected 4 tab-separated fields, got {}", fields.len()),
            });
        }

        let user_raw: usize = parse_field(fields[0], idx + 1)?;
        let item_raw: usize = parse_field(fields[1], idx + 1)?;
        let rating: f32 = parse_field(fields[2], idx + 1)?;
        let timestamp: i64 = parse_field(fields[3], idx + 1)?;

        if user_raw == 0 || item_raw == 0 {
            return Err(GraphError::MalformedRecord {
                line: idx + 1,
                reason: "identifiers are 1-based, got 0".to_string(),
            });
        }

        interactions.push(Interaction {
            user: user_raw - 1,
            item: item_raw - 1,
            rating,
            timestamp,
        });
    }

    info!(
        count = interactions.len(),
        "Loaded interaction dataset"
    );

    Ok(interactions)
}

fn parse_field<T: std::str::FromStr>(raw: &str, line: usize) -> Result<T> {
    raw.trim().parse().map_err(|_| GraphError::MalformedRecord {
        line,
        reason: format!("unparseable field {raw:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction(user: usize, item: usize, rating: f32) -> Interaction {
        Interaction {
            user,
            item,
            rating,
            timestamp: 0,
        }
    }

    #[test]
    fn test_build_filters_by_rating() {
        let data = vec![
            interaction(0, 0, 5.0),
            interaction(0, 1, 2.0),
            interaction(1, 1, 4.0),
        ];
        let graph = InteractionGraph::build(&data, 4.0);

        assert_eq!(graph.num_users, 2);
        assert_eq!(graph.num_items, 2);
        // Two retained interactions, one edge per direction each
        assert_eq!(graph.edges.len(), 4);
        assert!(graph.edges.contains(&(0, 2)));
        assert!(graph.edges.contains(&(2, 0)));
        assert!(graph.edges.contains(&(1, 3)));
        assert!(graph.edges.contains(&(3, 1)));
    }

    #[test]
    fn test_build_keeps_duplicates() {
        let data = vec![interaction(0, 0, 5.0), interaction(0, 0, 5.0)];
        let graph = InteractionGraph::build(&data, 4.0);
        assert_eq!(graph.edges.len(), 4);
        assert_eq!(graph.degrees()[0], 2.0);
    }

    #[test]
    fn test_sparse_id_space_not_compacted() {
        // Only user 4 and item 9 observed: counts still span the full range
        let data = vec![interaction(4, 9, 5.0)];
        let graph = InteractionGraph::build(&data, 4.0);
        assert_eq!(graph.num_users, 5);
        assert_eq!(graph.num_items, 10);
        assert_eq!(graph.num_nodes(), 15);
    }

    #[test]
    fn test_degrees() {
        let data = vec![
            interaction(0, 0, 5.0),
            interaction(0, 1, 5.0),
            interaction(1, 0, 5.0),
        ];
        let graph = InteractionGraph::build(&data, 4.0);
        let deg = graph.degrees();
        assert_eq!(deg[0], 2.0); // user 0 -> items 0, 1
        assert_eq!(deg[1], 1.0); // user 1 -> item 0
        assert_eq!(deg[2], 2.0); // item 0 <- users 0, 1
        assert_eq!(deg[3], 1.0); // item 1 <- user 0
    }

    #[test]
    fn test_load_interactions_remaps_to_zero_based() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "1\t3\t5.0\t100").unwrap();
        writeln!(file, "2\t1\t3.5\t200").unwrap();

        let data = load_interactions(file.path()).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].user, 0);
        assert_eq!(data[0].item, 2);
        assert_eq!(data[1].user, 1);
        assert_eq!(data[1].item, 0);
        assert_eq!(data[1].rating, 3.5);
    }

    #[test]
    fn test_load_interactions_rejects_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "1\t2\tnot_a_number\t100").unwrap();

        let err = load_interactions(file.path()).unwrap_err();
        assert!(matches!(err, GraphError::MalformedRecord { line: 1, .. }));
    }
}
