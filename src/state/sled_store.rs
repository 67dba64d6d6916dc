use crate::error::{AppError, Result};
use crate::state::ArtifactRepository;
use async_trait::async_trait;
use sled::Db;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Artifact stored under one key of a Sled embedded database
#[derive(Clone)]
pub struct SledArtifactRepository {
    db: Arc<Db>,
    artifacts_tree: sled::Tree,
    key: String,
    path: PathBuf,
}

impl SledArtifactRepository {
    /// Open (or create) the Sled database at the specified path
    pub fn new<P: AsRef<Path>>(path: P, key: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path).map_err(|e| {
            AppError::Storage(format!("Failed to open Sled database: {}", e))
        })?;

        let artifacts_tree = db.open_tree("artifacts").map_err(|e| {
            AppError::Storage(format!("Failed to open artifacts tree: {}", e))
        })?;

        tracing::info!("Initialized Sled artifact store at {:?}", path);

        Ok(Self {
            db: Arc::new(db),
            artifacts_tree,
            key: key.into(),
            path,
        })
    }

    /// Get database size in bytes
    pub fn size_on_disk(&self) -> Result<u64> {
        self.db.size_on_disk().map_err(|e| {
            AppError::Storage(format!("Failed to get database size: {}", e))
        })
    }
}

#[async_trait]
impl ArtifactRepository for SledArtifactRepository {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        let value = self.artifacts_tree.get(self.key.as_bytes()).map_err(|e| {
            AppError::Storage(format!("Failed to read artifact: {}", e))
        })?;

        Ok(value.map(|ivec| ivec.to_vec()))
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        self.artifacts_tree
            .insert(self.key.as_bytes(), bytes)
            .map_err(|e| AppError::Storage(format!("Failed to write artifact: {}", e)))?;

        self.artifacts_tree.flush_async().await.map_err(|e| {
            AppError::Storage(format!("Failed to flush artifact: {}", e))
        })?;

        tracing::debug!(key = %self.key, bytes = bytes.len(), "Artifact written to Sled");
        Ok(())
    }

    fn location(&self) -> String {
        format!("sled://{}#{}", self.path.display(), self.key)
    }
}
