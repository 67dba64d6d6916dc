use crate::config::{StorageBackend, StorageConfig};
use crate::error::{AppError, Result};
use crate::state::{
    ArtifactRepository, FileArtifactRepository, InMemoryArtifactRepository,
    SledArtifactRepository,
};
use std::sync::Arc;

/// Create an artifact repository based on configuration
pub fn create_artifact_repository(config: &StorageConfig) -> Result<Arc<dyn ArtifactRepository>> {
    match config.backend {
        StorageBackend::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("File backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing file artifact backend");
            Ok(Arc::new(FileArtifactRepository::new(path)))
        }

        StorageBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, key = %config.key, "Initializing Sled artifact backend");
            Ok(Arc::new(SledArtifactRepository::new(path, config.key.clone())?))
        }

        StorageBackend::Memory => Ok(create_in_memory_repository()),
    }
}

/// Create an in-memory repository (for testing and development)
pub fn create_in_memory_repository() -> Arc<dyn ArtifactRepository> {
    tracing::info!("Initializing in-memory artifact backend");
    Arc::new(InMemoryArtifactRepository::new())
}
