use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Durable artifact storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Text feature extraction
    #[serde(default)]
    pub vectorizer: VectorizerConfig,

    /// Classifier fitting
    #[serde(default)]
    pub training: TrainingConfig,

    /// Similar-ticket search bounds
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables, e.g. TICKET_ML_STORAGE__BACKEND
            .add_source(
                config::Environment::with_prefix("TICKET_ML")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Artifact backend
    #[serde(default)]
    pub backend: StorageBackend,

    /// Artifact file (file backend) or database directory (sled backend)
    #[serde(default = "default_artifact_path")]
    pub path: Option<PathBuf>,

    /// Key under which the sled backend stores the artifact
    #[serde(default = "default_artifact_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_artifact_path(),
            key: default_artifact_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// N-gram range (min, max)
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),

    /// Minimum number of documents a term must appear in
    #[serde(default = "default_min_doc_freq")]
    pub min_doc_freq: usize,

    /// Lowercase text before tokenizing
    #[serde(default = "default_true")]
    pub lowercase: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            ngram_range: default_ngram_range(),
            min_doc_freq: default_min_doc_freq(),
            lowercase: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Which classifier variant to fit
    #[serde(default)]
    pub classifier: ClassifierKind,

    /// Inverse regularization strength (C)
    #[serde(default = "default_regularization")]
    pub regularization: f64,

    /// Maximum optimizer iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Gradient max-norm below which optimization stops early
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Weight classes inversely to their frequency
    #[serde(default = "default_true")]
    pub balanced_class_weights: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierKind::default(),
            regularization: default_regularization(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            balanced_class_weights: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    #[default]
    Probabilistic,
    LabelOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Result count when the caller gives none
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Upper clamp for the result count
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Number of recent tickets compared against
    #[serde(default = "default_max_corpus")]
    pub max_corpus: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            max_corpus: default_max_corpus(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Register the Prometheus metric families at startup. Metrics are
    /// still recorded on first use when this is off; it only controls
    /// eager registration.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

// Default value functions
fn default_artifact_path() -> Option<PathBuf> {
    Some(PathBuf::from("./data/ml/ticket_classifier.bin"))
}

fn default_artifact_key() -> String {
    "ticket_classifier".to_string()
}

fn default_ngram_range() -> (usize, usize) {
    (1, 2)
}

fn default_min_doc_freq() -> usize {
    1
}

fn default_regularization() -> f64 {
    1.0
}

fn default_max_iterations() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    20
}

fn default_max_corpus() -> usize {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
