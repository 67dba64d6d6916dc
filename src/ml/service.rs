use crate::config::Config;
use crate::error::Result;
use crate::ml::models::{
    CategoryPrediction, CorpusWindow, ModelStatus, SimilarTicket, TopK, TrainingSummary,
};
use crate::ml::prediction::PredictionService;
use crate::ml::similarity::SimilarityEngine;
use crate::ml::store::ModelStore;
use crate::ml::training::TrainingPipeline;
use crate::models::Ticket;
use crate::state::{create_artifact_repository, ArtifactRepository, TicketSource};
use std::sync::Arc;
use tracing::info;

/// Ticket ML service: training, category prediction and similarity search
/// over one shared model store
pub struct TicketMlService {
    store: Arc<ModelStore>,
    training: TrainingPipeline,
    prediction: PredictionService,
    similarity: SimilarityEngine,
    config: Config,
}

impl TicketMlService {
    /// Create a service whose durable tier is built from `config.storage`
    pub fn from_config(config: Config, source: Arc<dyn TicketSource>) -> Result<Self> {
        let repository = create_artifact_repository(&config.storage)?;
        Ok(Self::new(config, source, repository))
    }

    pub fn new(
        config: Config,
        source: Arc<dyn TicketSource>,
        repository: Arc<dyn ArtifactRepository>,
    ) -> Self {
        let store = Arc::new(ModelStore::new(repository));
        let training = TrainingPipeline::new(
            Arc::clone(&source),
            Arc::clone(&store),
            config.vectorizer.clone(),
            config.training.clone(),
        );
        let prediction = PredictionService::new(Arc::clone(&store));
        let similarity = SimilarityEngine::new(source, Arc::clone(&store));

        info!(location = %store.location(), "Ticket ML service ready");

        Self {
            store,
            training,
            prediction,
            similarity,
            config,
        }
    }

    pub async fn train(&self) -> Result<TrainingSummary> {
        self.training.train().await
    }

    pub async fn predict(&self, ticket: &Ticket) -> Result<CategoryPrediction> {
        self.prediction.predict(ticket).await
    }

    pub async fn find_similar(
        &self,
        ticket: &Ticket,
        top_k: TopK,
        max_corpus: CorpusWindow,
    ) -> Result<Vec<SimilarTicket>> {
        self.similarity.find_similar(ticket, top_k, max_corpus).await
    }

    /// Similarity search with the configured default `top_k` and corpus window
    pub async fn find_similar_default(&self, ticket: &Ticket) -> Result<Vec<SimilarTicket>> {
        let similarity = &self.config.similarity;
        let top_k = TopK::clamped(similarity.default_top_k as i64, similarity.max_top_k);
        let max_corpus = CorpusWindow::clamped(similarity.max_corpus as i64);
        self.find_similar(ticket, top_k, max_corpus).await
    }

    /// Clamp a caller-supplied `top_k` into the configured range
    pub fn top_k(&self, requested: i64) -> TopK {
        TopK::clamped(requested, self.config.similarity.max_top_k)
    }

    pub async fn model_status(&self) -> Result<ModelStatus> {
        self.store.status().await
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
