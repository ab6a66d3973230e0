// ============================================
// Embedding Store
// ============================================
//
// Versioned persistence for the trained embedding matrices and the raw
// ratings dataset:
// - each save writes a fresh version directory (v{unix_millis}) holding
//   user_embeddings.json, item_embeddings.json and manifest.json
// - the CURRENT pointer file is updated only after every artifact is
//   fully written, so readers never observe a partial matrix
// - load verifies the manifest's shape stamp against the decoded
//   matrices and fails fast on disagreement
//
// load() returns None (not an error) when no version has been activated
// yet, so callers can distinguish "not yet trained" from "training failed".

use super::StoreError;
use crate::models::Interaction;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CURRENT_POINTER: &str = "CURRENT";
const MANIFEST_FILE: &str = "manifest.json";
const USER_EMB_FILE: &str = "user_embeddings.json";
const ITEM_EMB_FILE: &str = "item_embeddings.json";
const RATINGS_FILE: &str = "ratings.json";

pub type Result<T> = std::result::Result<T, StoreError>;

/// Shape stamp written alongside each embedding version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub embedding_dim: usize,
    pub num_users: usize,
    pub num_items: usize,
    pub trained_at: DateTime<Utc>,
}

/// Row-major matrix artifact, shape [rows, cols].
#[derive(Debug, Serialize, Deserialize)]
struct MatrixArtifact {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl MatrixArtifact {
    fn from_array(m: &Array2<f32>) -> Self {
        MatrixArtifact {
            rows: m.nrows(),
            cols: m.ncols(),
            data: m.iter().copied().collect(),
        }
    }

    fn into_array(self, artifact: &'static str) -> Result<Array2<f32>> {
        let (rows, cols) = (self.rows, self.cols);
        Array2::from_shape_vec((rows, cols), self.data).map_err(|_| StoreError::ShapeMismatch {
            artifact,
            expected: format!("{rows}x{cols}"),
            actual: "inconsistent element count".to_string(),
        })
    }
}

pub struct EmbeddingStore {
    dir: PathBuf,
}

impl EmbeddingStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        EmbeddingStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn pointer_path(&self) -> PathBuf {
        self.dir.join(CURRENT_POINTER)
    }

    /// Directory of the currently activated version, if any.
    fn current_version_dir(&self) -> Option<PathBuf> {
        let pointer = self.pointer_path();
        if !pointer.exists() {
            return None;
        }
        match fs::read_to_string(&pointer) {
            Ok(name) => Some(self.dir.join(name.trim())),
            Err(e) => {
                warn!(error = %e, "Failed to read CURRENT pointer");
                None
            }
        }
    }

    /// Write a new embedding version and activate it.
    pub fn save(&self, user_emb: &Array2<f32>, item_emb: &Array2<f32>) -> Result<()> {
        let version = format!("v{}", Utc::now().timestamp_millis());
        let version_dir = self.dir.join(&version);
        fs::create_dir_all(&version_dir)?;

        let manifest = Manifest {
            version: version.clone(),
            embedding_dim: user_emb.ncols(),
            num_users: user_emb.nrows(),
            num_items: item_emb.nrows(),
            trained_at: Utc::now(),
        };

        write_json(&version_dir.join(USER_EMB_FILE), &MatrixArtifact::from_array(user_emb))?;
        write_json(&version_dir.join(ITEM_EMB_FILE), &MatrixArtifact::from_array(item_emb))?;
        write_json(&version_dir.join(MANIFEST_FILE), &manifest)?;

        // Activate only after every artifact is on disk
        fs::write(self.pointer_path(), &version)?;

        info!(
            version = %version,
            num_users = manifest.num_users,
            num_items = manifest.num_items,
            embedding_dim = manifest.embedding_dim,
            "Embedding version saved and activated"
        );
        Ok(())
    }

    /// Load the activated embedding version, verifying shapes against the manifest.
    pub fn load(&self) -> Result<Option<(Array2<f32>, Array2<f32>)>> {
        let version_dir = match self.current_version_dir() {
            Some(dir) => dir,
            None => return Ok(None),
        };

        let manifest: Manifest = read_json(&version_dir.join(MANIFEST_FILE))?;
        let user_emb = read_json::<MatrixArtifact>(&version_dir.join(USER_EMB_FILE))?
            .into_array("user_embeddings")?;
        let item_emb = read_json::<MatrixArtifact>(&version_dir.join(ITEM_EMB_FILE))?
            .into_array("item_embeddings")?;

        check_shape(
            "user_embeddings",
            (manifest.num_users, manifest.embedding_dim),
            user_emb.dim(),
        )?;
        check_shape(
            "item_embeddings",
            (manifest.num_items, manifest.embedding_dim),
            item_emb.dim(),
        )?;

        info!(
            version = %manifest.version,
            num_users = manifest.num_users,
            num_items = manifest.num_items,
            "Loaded pretrained embeddings"
        );
        Ok(Some((user_emb, item_emb)))
    }

    /// Persist the full unfiltered ratings dataset for popularity statistics.
    pub fn save_ratings(&self, interactions: &[Interaction]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_json(&self.dir.join(RATINGS_FILE), &interactions)?;
        info!(count = interactions.len(), "Ratings dataset saved");
        Ok(())
    }

    pub fn load_ratings(&self) -> Result<Option<Vec<Interaction>>> {
        let path = self.dir.join(RATINGS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let interactions: Vec<Interaction> = read_json(&path)?;
        info!(count = interactions.len(), "Ratings dataset loaded");
        Ok(Some(interactions))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), value).map_err(|e| {
        StoreError::CorruptArtifact {
            path: path.display().to_string(),
            source: e,
        }
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = fs::File::open(path)?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
        StoreError::CorruptArtifact {
            path: path.display().to_string(),
            source: e,
        }
    })
}

fn check_shape(
    artifact: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<()> {
    if expected != actual {
        return Err(StoreError::ShapeMismatch {
            artifact,
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        });
    }
    Ok(())
}
