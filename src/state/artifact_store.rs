use crate::error::{AppError, Result};
use crate::state::ArtifactRepository;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Artifact kept in a single file on local disk
#[derive(Debug, Clone)]
pub struct FileArtifactRepository {
    path: PathBuf,
}

impl FileArtifactRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ArtifactRepository for FileArtifactRepository {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read artifact {:?}: {}",
                self.path, e
            ))),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Storage(format!("Failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        // Stage next to the target, then rename over it
        let staging = self.staging_path();
        let mut file = tokio::fs::File::create(&staging).await.map_err(|e| {
            AppError::Storage(format!("Failed to create {:?}: {}", staging, e))
        })?;
        file.write_all(bytes).await.map_err(|e| {
            AppError::Storage(format!("Failed to write {:?}: {}", staging, e))
        })?;
        file.sync_all().await.map_err(|e| {
            AppError::Storage(format!("Failed to sync {:?}: {}", staging, e))
        })?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(AppError::Storage(format!(
                "Failed to publish artifact {:?}: {}",
                self.path, e
            )));
        }

        tracing::debug!(path = ?self.path, bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Artifact held in process memory (for testing and ephemeral deployments)
#[derive(Debug, Default)]
pub struct InMemoryArtifactRepository {
    bytes: RwLock<Option<Vec<u8>>>,
}

impl InMemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactRepository for InMemoryArtifactRepository {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.bytes.read().clone())
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        *self.bytes.write() = Some(bytes.to_vec());
        Ok(())
    }

    fn location(&self) -> String {
        "memory://ticket_classifier".to_string()
    }
}
