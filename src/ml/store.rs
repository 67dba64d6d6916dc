use crate::error::{AppError, Result};
use crate::ml::classifier::CategoryClassifier;
use crate::ml::features::TfidfVectorizer;
use crate::ml::metrics::ML_METRICS;
use crate::ml::models::{ModelMetadata, ModelStatus};
use crate::state::ArtifactRepository;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Bumped whenever the serialized layout of [`ModelArtifact`] changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A fitted vectorizer together with the classifier trained on its output.
///
/// The two are always published and loaded as one unit.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub vectorizer: TfidfVectorizer,
    pub classifier: CategoryClassifier,

    /// Sorted class labels; classifier output indices point into this list
    pub classes: Vec<String>,

    pub metadata: ModelMetadata,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    artifact: &'a ModelArtifact,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    artifact: ModelArtifact,
}

impl ModelArtifact {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&EnvelopeRef {
            version: ARTIFACT_FORMAT_VERSION,
            artifact: self,
        })?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // The version leads the envelope, so it can be checked before the body
        let version: u32 = bincode::deserialize(bytes)?;
        if version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::Serialization(format!(
                "Unsupported artifact format version {} (expected {})",
                version, ARTIFACT_FORMAT_VERSION
            )));
        }

        let envelope: Envelope = bincode::deserialize(bytes)?;
        debug_assert_eq!(envelope.version, ARTIFACT_FORMAT_VERSION);
        Ok(envelope.artifact)
    }

    /// Label for a classifier output index
    pub fn class_label(&self, index: usize) -> Result<&str> {
        self.classes.get(index).map(String::as_str).ok_or_else(|| {
            AppError::Internal(format!(
                "Classifier produced index {} but only {} classes are known",
                index,
                self.classes.len()
            ))
        })
    }
}

/// Holds the current artifact: one durable slot plus an in-process cache.
///
/// The first `load` reads the durable tier and caches the result; later loads
/// return the cached artifact. `save` writes durably before replacing the
/// cache, so a failed save leaves both tiers on the previous artifact.
/// Readers holding an `Arc` from an earlier load keep a consistent artifact
/// while a new one is published.
pub struct ModelStore {
    repository: Arc<dyn ArtifactRepository>,
    cache: RwLock<Option<Arc<ModelArtifact>>>,
    publish_lock: Mutex<()>,
}

impl ModelStore {
    pub fn new(repository: Arc<dyn ArtifactRepository>) -> Self {
        Self {
            repository,
            cache: RwLock::new(None),
            publish_lock: Mutex::new(()),
        }
    }

    /// Current artifact, or `None` if nothing has ever been saved
    pub async fn load(&self) -> Result<Option<Arc<ModelArtifact>>> {
        let cached = self.cache.read().clone();
        if let Some(artifact) = cached {
            ML_METRICS.record_model_load("cache");
            return Ok(Some(artifact));
        }

        let bytes = match self.repository.read().await? {
            Some(bytes) => bytes,
            None => {
                ML_METRICS.record_model_load("absent");
                debug!(location = %self.repository.location(), "No stored model artifact");
                return Ok(None);
            }
        };

        let artifact = Arc::new(ModelArtifact::from_bytes(&bytes)?);
        ML_METRICS.record_model_load("durable");
        info!(
            location = %self.repository.location(),
            classes = artifact.classes.len(),
            "Loaded model artifact"
        );

        // A concurrent save may have filled the cache meanwhile; keep that one
        let mut cache = self.cache.write();
        Ok(Some(Arc::clone(cache.get_or_insert(artifact))))
    }

    /// Persist a new artifact and make it current
    pub async fn save(&self, artifact: ModelArtifact) -> Result<Arc<ModelArtifact>> {
        let bytes = artifact.to_bytes()?;
        let artifact = Arc::new(artifact);

        let _guard = self.publish_lock.lock().await;
        self.repository.write(&bytes).await?;
        *self.cache.write() = Some(Arc::clone(&artifact));

        info!(
            location = %self.repository.location(),
            bytes = bytes.len(),
            "Published model artifact"
        );
        Ok(artifact)
    }

    /// Drop the cached artifact so the next load re-reads the durable tier
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    pub fn location(&self) -> String {
        self.repository.location()
    }

    pub async fn status(&self) -> Result<ModelStatus> {
        let artifact = self.load().await?;
        Ok(ModelStatus {
            trained: artifact.is_some(),
            location: self.location(),
            classes: artifact
                .as_ref()
                .map(|a| a.classes.clone())
                .unwrap_or_default(),
            metadata: artifact.map(|a| a.metadata.clone()),
        })
    }
}
