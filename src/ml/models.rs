use crate::error::{AppError, Result};
use crate::models::{TicketCategory, TicketStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Outcome of a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Number of labeled tickets the model was fit on
    pub n_samples: usize,

    /// Number of distinct categories
    pub n_classes: usize,

    /// Sorted, de-duplicated category labels
    pub classes: Vec<String>,

    /// Where the artifact was persisted
    pub model_path: String,

    /// Fit quality on the training set
    pub metrics: ModelMetrics,
}

/// Category prediction for one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPrediction {
    /// Predicted category label
    pub category: String,

    /// Probability of the predicted label (0.0 - 1.0), absent for label-only models
    pub confidence: Option<f64>,

    /// All class probabilities (empty for label-only models)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub probabilities: BTreeMap<String, f64>,
}

impl CategoryPrediction {
    /// Parse the label back into the ticket store's category enum
    pub fn as_ticket_category(&self) -> Option<TicketCategory> {
        self.category.parse().ok()
    }
}

/// One ranked neighbour returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTicket {
    pub id: Uuid,
    pub title: String,
    pub status: TicketStatus,
    pub category: Option<TicketCategory>,

    /// Cosine similarity (0.0 - 1.0)
    pub similarity: f64,
}

/// Number of similar tickets to return, bounded to `[1, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopK(usize);

impl TopK {
    pub const DEFAULT: usize = 5;
    pub const MAX: usize = 20;

    /// Validate against the default bounds
    pub fn new(value: usize) -> Result<Self> {
        Self::bounded(value, Self::MAX)
    }

    /// Validate against a configured upper bound
    pub fn bounded(value: usize, max: usize) -> Result<Self> {
        if value == 0 || value > max {
            return Err(AppError::MalformedInput(format!(
                "top_k must be within [1, {}], got {}",
                max, value
            )));
        }
        Ok(Self(value))
    }

    /// Clamp any integer into `[1, max]`
    pub fn clamped(value: i64, max: usize) -> Self {
        let max = max.max(1);
        Self(value.clamp(1, max as i64) as usize)
    }

    /// Parse a raw query value; unparsable input falls back to `default`
    pub fn parse_or_default(raw: Option<&str>, default: usize, max: usize) -> Self {
        let value = raw
            .and_then(|r| r.trim().parse::<i64>().ok())
            .unwrap_or(default as i64);
        Self::clamped(value, max)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for TopK {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Number of recent tickets the similarity search compares against (at least 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusWindow(usize);

impl CorpusWindow {
    pub const DEFAULT: usize = 500;

    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(AppError::MalformedInput(
                "max_corpus must be at least 1".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn clamped(value: i64) -> Self {
        Self(value.max(1) as usize)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for CorpusWindow {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Per-class metrics keyed by label
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    /// Compute accuracy and macro-averaged scores from class indices
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize], classes: &[String]) -> Self {
        let n_samples = y_true.len();
        if n_samples == 0 || classes.is_empty() {
            return Self::default();
        }

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count();
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = BTreeMap::new();
        for (class_idx, label) in classes.iter().enumerate() {
            let mut tp = 0;
            let mut fp = 0;
            let mut fn_count = 0;
            for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                match (t == class_idx, p == class_idx) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_count += 1,
                    (false, false) => {}
                }
            }

            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_count);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                label.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score,
                    support: tp + fn_count,
                },
            );
        }

        let k = classes.len() as f64;
        Self {
            accuracy,
            precision: per_class.values().map(|m| m.precision).sum::<f64>() / k,
            recall: per_class.values().map(|m| m.recall).sum::<f64>() / k,
            f1_score: per_class.values().map(|m| m.f1_score).sum::<f64>() / k,
            per_class_metrics: per_class,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Optimizer iterations actually run
    pub iterations: usize,

    /// Whether the optimizer met its tolerance before the iteration cap
    pub converged: bool,

    /// Training metrics
    pub training_metrics: ModelMetrics,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Multinomial logistic regression with class probabilities
    SoftmaxRegression,

    /// Logistic regression that only yields labels
    LogisticRegressionLabelOnly,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::SoftmaxRegression => write!(f, "Softmax Regression"),
            ModelType::LogisticRegressionLabelOnly => write!(f, "Logistic Regression (label only)"),
        }
    }
}

/// Snapshot of the model store for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub trained: bool,
    pub location: String,
    pub classes: Vec<String>,
    pub metadata: Option<ModelMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_validation() {
        assert_eq!(TopK::new(1).unwrap().get(), 1);
        assert_eq!(TopK::new(20).unwrap().get(), 20);
        assert!(matches!(TopK::new(0), Err(AppError::MalformedInput(_))));
        assert!(matches!(TopK::new(21), Err(AppError::MalformedInput(_))));
        assert_eq!(TopK::default().get(), 5);
    }

    #[test]
    fn test_top_k_clamping() {
        assert_eq!(TopK::clamped(-3, 20).get(), 1);
        assert_eq!(TopK::clamped(100_000, 20).get(), 20);
        assert_eq!(TopK::clamped(7, 20).get(), 7);
        assert_eq!(TopK::clamped(7, 0).get(), 1);
    }

    #[test]
    fn test_top_k_parse_or_default() {
        assert_eq!(TopK::parse_or_default(Some("3"), 5, 20).get(), 3);
        assert_eq!(TopK::parse_or_default(Some("abc"), 5, 20).get(), 5);
        assert_eq!(TopK::parse_or_default(None, 5, 20).get(), 5);
        assert_eq!(TopK::parse_or_default(Some("99"), 5, 20).get(), 20);
    }

    #[test]
    fn test_corpus_window() {
        assert_eq!(CorpusWindow::default().get(), 500);
        assert!(CorpusWindow::new(0).is_err());
        assert_eq!(CorpusWindow::clamped(-1).get(), 1);
    }

    #[test]
    fn test_metrics_from_predictions() {
        let classes = vec!["billing".to_string(), "bug".to_string()];
        let metrics = ModelMetrics::from_predictions(&[0, 0, 1, 1], &[0, 1, 1, 1], &classes);

        assert_eq!(metrics.accuracy, 0.75);
        let billing = &metrics.per_class_metrics["billing"];
        assert_eq!(billing.precision, 1.0);
        assert_eq!(billing.recall, 0.5);
        assert_eq!(billing.support, 2);
        let bug = &metrics.per_class_metrics["bug"];
        assert!((bug.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(bug.recall, 1.0);
    }

    #[test]
    fn test_prediction_category_parse() {
        let prediction = CategoryPrediction {
            category: "billing".to_string(),
            confidence: Some(0.8),
            probabilities: BTreeMap::new(),
        };
        assert_eq!(prediction.as_ticket_category(), Some(TicketCategory::Billing));
    }

    #[test]
    fn test_model_type_display() {
        assert_eq!(ModelType::SoftmaxRegression.to_string(), "Softmax Regression");
    }
}
