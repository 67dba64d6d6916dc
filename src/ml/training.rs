use crate::config::{TrainingConfig, VectorizerConfig};
use crate::error::{AppError, Result};
use crate::ml::classifier::{CategoryClassifier, Classifier};
use crate::ml::features::{build_text, TfidfVectorizer};
use crate::ml::metrics::ML_METRICS;
use crate::ml::models::{ModelMetadata, ModelMetrics, TrainingSummary};
use crate::ml::store::{ModelArtifact, ModelStore};
use crate::models::LabeledTicket;
use crate::state::TicketSource;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const MODEL_NAME: &str = "ticket_classifier";

/// Fits a vectorizer and classifier on every labeled ticket and publishes them
pub struct TrainingPipeline {
    source: Arc<dyn TicketSource>,
    store: Arc<ModelStore>,
    vectorizer_config: VectorizerConfig,
    training_config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(
        source: Arc<dyn TicketSource>,
        store: Arc<ModelStore>,
        vectorizer_config: VectorizerConfig,
        training_config: TrainingConfig,
    ) -> Self {
        Self {
            source,
            store,
            vectorizer_config,
            training_config,
        }
    }

    /// Train on the full labeled corpus and replace the stored artifact.
    ///
    /// Fails with `InsufficientTrainingData` when there are no labeled tickets
    /// or only one category; the previously stored artifact is left untouched.
    pub async fn train(&self) -> Result<TrainingSummary> {
        let started = Instant::now();
        let result = self.run().await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(summary) => {
                ML_METRICS.record_training("trained", elapsed);
                ML_METRICS.training_samples.set(summary.n_samples as f64);
            }
            Err(AppError::InsufficientTrainingData { samples, classes }) => {
                ML_METRICS.record_training("skipped", elapsed);
                warn!(samples, classes, "Not enough labeled tickets to train");
            }
            Err(e) => {
                ML_METRICS.record_training("failed", elapsed);
                warn!("Training failed: {}", e);
            }
        }

        result
    }

    async fn run(&self) -> Result<TrainingSummary> {
        let corpus: Vec<LabeledTicket> = self
            .source
            .fetch_labeled_corpus()
            .await?
            .into_iter()
            .filter(|t| !t.category.trim().is_empty())
            .collect();

        let classes: Vec<String> = corpus
            .iter()
            .map(|t| t.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if corpus.is_empty() || classes.len() < 2 {
            return Err(AppError::InsufficientTrainingData {
                samples: corpus.len(),
                classes: classes.len(),
            });
        }

        info!(
            samples = corpus.len(),
            classes = classes.len(),
            classifier = ?self.training_config.classifier,
            "Training ticket classifier"
        );

        let vectorizer_config = self.vectorizer_config.clone();
        let training_config = self.training_config.clone();
        let artifact = tokio::task::spawn_blocking(move || {
            fit_artifact(&corpus, classes, vectorizer_config, &training_config)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Training task failed: {}", e)))??;

        let summary = TrainingSummary {
            n_samples: artifact.metadata.n_training_samples,
            n_classes: artifact.classes.len(),
            classes: artifact.classes.clone(),
            model_path: self.store.location(),
            metrics: artifact.metadata.training_metrics.clone(),
        };

        self.store.save(artifact).await?;

        info!(
            samples = summary.n_samples,
            accuracy = summary.metrics.accuracy,
            location = %summary.model_path,
            "Ticket classifier trained"
        );

        Ok(summary)
    }
}

/// Fit vectorizer and classifier on an already validated corpus
fn fit_artifact(
    corpus: &[LabeledTicket],
    classes: Vec<String>,
    vectorizer_config: VectorizerConfig,
    training_config: &TrainingConfig,
) -> Result<ModelArtifact> {
    let texts: Vec<String> = corpus
        .iter()
        .map(|t| build_text(Some(&t.title), Some(&t.description)))
        .collect();
    let labels: Vec<usize> = corpus
        .iter()
        .map(|t| {
            classes
                .binary_search(&t.category)
                .map_err(|_| AppError::Internal(format!("Unknown class {}", t.category)))
        })
        .collect::<Result<_>>()?;

    let vectorizer = TfidfVectorizer::fit(vectorizer_config, &texts)?;
    if vectorizer.n_features() == 0 {
        return Err(AppError::Training(
            "Empty vocabulary; tickets contain no usable terms".to_string(),
        ));
    }

    let features = vectorizer.transform_batch(&texts);
    let classifier = CategoryClassifier::fit(
        &features,
        &labels,
        classes.len(),
        vectorizer.n_features(),
        training_config,
    )?;

    let predictions = classifier.predict_batch(&features)?;
    let training_metrics = ModelMetrics::from_predictions(&labels, &predictions, &classes);
    let (iterations, converged) = classifier.optimizer_report();

    let metadata = ModelMetadata {
        name: MODEL_NAME.to_string(),
        model_type: classifier.model_type(),
        trained_at: chrono::Utc::now(),
        n_training_samples: corpus.len(),
        n_features: vectorizer.n_features(),
        iterations,
        converged,
        training_metrics,
        hyperparameters: hyperparameters(vectorizer.config(), training_config),
    };

    Ok(ModelArtifact {
        vectorizer,
        classifier,
        classes,
        metadata,
    })
}

fn hyperparameters(
    vectorizer: &VectorizerConfig,
    training: &TrainingConfig,
) -> HashMap<String, String> {
    let mut params = HashMap::new();
    params.insert(
        "ngram_range".to_string(),
        format!("{}-{}", vectorizer.ngram_range.0, vectorizer.ngram_range.1),
    );
    params.insert("min_doc_freq".to_string(), vectorizer.min_doc_freq.to_string());
    params.insert("regularization".to_string(), training.regularization.to_string());
    params.insert("max_iterations".to_string(), training.max_iterations.to_string());
    params.insert("tolerance".to_string(), training.tolerance.to_string());
    params.insert(
        "balanced_class_weights".to_string(),
        training.balanced_class_weights.to_string(),
    );
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ticket, TicketCategory};
    use crate::state::{InMemoryArtifactRepository, InMemoryTicketSource};

    fn pipeline(tickets: Vec<Ticket>) -> (TrainingPipeline, Arc<ModelStore>) {
        let source = Arc::new(InMemoryTicketSource::from_tickets(tickets).unwrap());
        let store = Arc::new(ModelStore::new(Arc::new(InMemoryArtifactRepository::new())));
        let pipeline = TrainingPipeline::new(
            source,
            store.clone(),
            VectorizerConfig::default(),
            TrainingConfig::default(),
        );
        (pipeline, store)
    }

    #[tokio::test]
    async fn test_train_reports_summary() {
        let (pipeline, store) = pipeline(vec![
            Ticket::new("Invoice not received", "").with_category(TicketCategory::Billing),
            Ticket::new("Error 500 on dashboard", "").with_category(TicketCategory::Bug),
            Ticket::new("Add export to CSV", "").with_category(TicketCategory::Feature),
            Ticket::new("Untriaged", "no label"),
        ]);

        let summary = pipeline.train().await.unwrap();
        assert_eq!(summary.n_samples, 3);
        assert_eq!(summary.n_classes, 3);
        assert_eq!(summary.classes, vec!["billing", "bug", "feature"]);
        assert_eq!(summary.model_path, "memory://ticket_classifier");

        let artifact = store.load().await.unwrap().unwrap();
        assert_eq!(artifact.classes, summary.classes);
        assert_eq!(artifact.metadata.n_training_samples, 3);
    }

    #[tokio::test]
    async fn test_single_class_is_insufficient() {
        let (pipeline, store) = pipeline(vec![
            Ticket::new("Invoice not received", "").with_category(TicketCategory::Billing),
            Ticket::new("Payment failed", "").with_category(TicketCategory::Billing),
        ]);

        let result = pipeline.train().await;
        assert!(matches!(
            result,
            Err(AppError::InsufficientTrainingData {
                samples: 2,
                classes: 1
            })
        ));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_corpus_is_insufficient() {
        let (pipeline, _) = pipeline(vec![Ticket::new("Unlabeled", "")]);

        assert!(matches!(
            pipeline.train().await,
            Err(AppError::InsufficientTrainingData {
                samples: 0,
                classes: 0
            })
        ));
    }

    #[test]
    fn test_empty_vocabulary_rejected() {
        let corpus = vec![
            LabeledTicket {
                title: "a".to_string(),
                description: String::new(),
                category: "billing".to_string(),
            },
            LabeledTicket {
                title: "b".to_string(),
                description: String::new(),
                category: "bug".to_string(),
            },
        ];
        let classes = vec!["billing".to_string(), "bug".to_string()];

        let result = fit_artifact(
            &corpus,
            classes,
            VectorizerConfig::default(),
            &TrainingConfig::default(),
        );
        assert!(matches!(result, Err(AppError::Training(_))));
    }
}
