use crate::error::{AppError, Result};
use crate::ml::classifier::{most_probable, CategoryClassifier, Classifier};
use crate::ml::features::build_text;
use crate::ml::metrics::ML_METRICS;
use crate::ml::models::CategoryPrediction;
use crate::ml::store::{ModelArtifact, ModelStore};
use crate::models::Ticket;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Predicts a ticket's category with the current model
pub struct PredictionService {
    store: Arc<ModelStore>,
}

impl PredictionService {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self { store }
    }

    /// Predict a category; `ModelNotTrained` until a model has been saved
    pub async fn predict(&self, ticket: &Ticket) -> Result<CategoryPrediction> {
        let artifact = match self.store.load().await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => {
                ML_METRICS.record_prediction("untrained");
                return Err(AppError::ModelNotTrained);
            }
            Err(e) => {
                ML_METRICS.record_prediction("failed");
                return Err(e);
            }
        };

        let text = build_text(Some(&ticket.title), Some(&ticket.description));
        match predict_text(&artifact, &text) {
            Ok(prediction) => {
                ML_METRICS.record_prediction("predicted");
                debug!(
                    ticket_id = %ticket.id,
                    category = %prediction.category,
                    confidence = ?prediction.confidence,
                    "Predicted ticket category"
                );
                Ok(prediction)
            }
            Err(e) => {
                ML_METRICS.record_prediction("failed");
                Err(e)
            }
        }
    }
}

/// Classify prepared text with a loaded artifact
pub fn predict_text(artifact: &ModelArtifact, text: &str) -> Result<CategoryPrediction> {
    let features = artifact.vectorizer.transform(text);

    match &artifact.classifier {
        CategoryClassifier::Probabilistic(model) => {
            let probs = model.predict_proba(&features);
            let (index, confidence) = most_probable(&probs)
                .ok_or_else(|| AppError::Internal("Classifier has no classes".to_string()))?;

            let probabilities = artifact
                .classes
                .iter()
                .cloned()
                .zip(probs.iter().copied())
                .collect::<BTreeMap<_, _>>();

            Ok(CategoryPrediction {
                category: artifact.class_label(index)?.to_string(),
                confidence: Some(confidence),
                probabilities,
            })
        }
        CategoryClassifier::LabelOnly(model) => {
            let index = model.predict(&features)?;
            Ok(CategoryPrediction {
                category: artifact.class_label(index)?.to_string(),
                confidence: None,
                probabilities: BTreeMap::new(),
            })
        }
    }
}
