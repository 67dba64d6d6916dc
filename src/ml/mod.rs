//! Machine learning for support tickets
//!
//! This module provides:
//! - TF-IDF text features over word n-grams
//! - Category classification with per-class probabilities
//! - Versioned model artifacts behind a cached store
//! - Similar-ticket search by cosine similarity
//!
//! The model store caches the artifact per process. A model trained by another
//! process sharing the same durable tier is only picked up after
//! `ModelStore::invalidate` or a restart.

pub mod classifier;
pub mod features;
pub mod metrics;
pub mod models;
pub mod prediction;
pub mod service;
pub mod similarity;
pub mod store;
pub mod training;

pub use classifier::{CategoryClassifier, Classifier, LabelOnlyClassifier, SoftmaxRegression};
pub use features::{build_text, cosine_similarity, SparseVector, TfidfVectorizer};
pub use metrics::{gather_metrics, init_ml_metrics, ML_METRICS};
pub use models::{
    CategoryPrediction, ClassMetrics, CorpusWindow, ModelMetadata, ModelMetrics, ModelStatus,
    ModelType, SimilarTicket, TopK, TrainingSummary,
};
pub use prediction::PredictionService;
pub use service::TicketMlService;
pub use similarity::SimilarityEngine;
pub use store::{ModelArtifact, ModelStore, ARTIFACT_FORMAT_VERSION};
pub use training::TrainingPipeline;
