pub mod store;
pub mod artifact_store;
pub mod sled_store;
pub mod factory;

pub use store::*;
pub use artifact_store::{FileArtifactRepository, InMemoryArtifactRepository};
pub use sled_store::SledArtifactRepository;
pub use factory::{create_artifact_repository, create_in_memory_repository};

use crate::error::Result;
use crate::models::{CorpusTicket, LabeledTicket};
use async_trait::async_trait;
use uuid::Uuid;

/// Read interface onto the external ticket store
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// All tickets carrying a non-blank category
    async fn fetch_labeled_corpus(&self) -> Result<Vec<LabeledTicket>>;

    /// Up to `limit` tickets other than `exclude_id`, newest first
    async fn fetch_recent_corpus(&self, exclude_id: &Uuid, limit: usize)
        -> Result<Vec<CorpusTicket>>;
}

/// Durable home of the serialized model artifact (a single fixed slot)
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Read the stored artifact bytes, if any
    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored artifact; readers see either the old or the new bytes
    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Human-readable location reported in training summaries
    fn location(&self) -> String;
}
