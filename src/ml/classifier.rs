use crate::config::{ClassifierKind, TrainingConfig};
use crate::error::{AppError, Result};
use crate::ml::features::SparseVector;
use crate::ml::models::ModelType;
use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};

/// Trait for category classifiers over TF-IDF vectors
pub trait Classifier: Send + Sync {
    /// Predict the class index for one vector
    fn predict(&self, features: &SparseVector) -> Result<usize>;

    /// Predict class indices for many vectors
    fn predict_batch(&self, features: &[SparseVector]) -> Result<Vec<usize>> {
        features.iter().map(|x| self.predict(x)).collect()
    }

    /// Get model type
    fn model_type(&self) -> ModelType;
}

/// Per-class sample weights `n / (k * n_c)`, so every class carries equal total weight
pub fn balanced_class_weights(labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &label in labels {
        counts[label] += 1;
    }

    let n = labels.len() as f64;
    counts
        .iter()
        .map(|&count| {
            if count == 0 {
                0.0
            } else {
                n / (n_classes as f64 * count as f64)
            }
        })
        .collect()
}

/// Multinomial logistic regression with class probabilities.
///
/// Minimizes `C * sum_i w_i * CE(x_i, y_i) + 0.5 * |W|^2` with an unpenalized
/// intercept, using Nesterov-accelerated gradient descent from a zero start.
/// Identical inputs always produce identical weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    /// Coefficients (n_classes × n_features)
    weights: Array2<f64>,

    /// Per-class intercept
    intercept: Array1<f64>,

    /// Optimizer iterations run
    iterations: usize,

    /// Gradient fell under tolerance before the iteration cap
    converged: bool,
}

impl SoftmaxRegression {
    pub fn fit(
        features: &[SparseVector],
        labels: &[usize],
        n_classes: usize,
        n_features: usize,
        config: &TrainingConfig,
    ) -> Result<Self> {
        validate_inputs(features, labels, n_classes)?;
        if config.regularization <= 0.0 {
            return Err(AppError::Configuration(format!(
                "regularization must be positive, got {}",
                config.regularization
            )));
        }

        let class_weights = if config.balanced_class_weights {
            balanced_class_weights(labels, n_classes)
        } else {
            vec![1.0; n_classes]
        };
        let sample_weights: Vec<f64> = labels.iter().map(|&y| class_weights[y]).collect();

        // Rows are unit-norm, so with the intercept each sample's softmax
        // loss is 1-smooth; this step size is therefore always safe.
        let c = config.regularization;
        let step = 1.0 / (c * sample_weights.iter().sum::<f64>() + 1.0);

        let mut model = Self {
            weights: Array2::zeros((n_classes, n_features)),
            intercept: Array1::zeros(n_classes),
            iterations: 0,
            converged: false,
        };
        let mut look_w = model.weights.clone();
        let mut look_b = model.intercept.clone();
        let mut t = 1.0f64;

        for iteration in 1..=config.max_iterations {
            let (grad_w, grad_b) =
                Self::gradient(&look_w, &look_b, features, labels, &sample_weights, c);

            let grad_norm = grad_w
                .iter()
                .chain(grad_b.iter())
                .fold(0.0f64, |acc, g| acc.max(g.abs()));

            model.iterations = iteration;
            if grad_norm < config.tolerance {
                model.weights = look_w;
                model.intercept = look_b;
                model.converged = true;
                break;
            }

            let next_w = &look_w - &(grad_w * step);
            let next_b = &look_b - &(grad_b * step);

            let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
            let momentum = (t - 1.0) / t_next;

            look_w = &next_w + &((&next_w - &model.weights) * momentum);
            look_b = &next_b + &((&next_b - &model.intercept) * momentum);

            model.weights = next_w;
            model.intercept = next_b;
            t = t_next;
        }

        if model.weights.iter().any(|w| !w.is_finite()) {
            return Err(AppError::Training(
                "Softmax regression diverged".to_string(),
            ));
        }

        Ok(model)
    }

    fn gradient(
        weights: &Array2<f64>,
        intercept: &Array1<f64>,
        features: &[SparseVector],
        labels: &[usize],
        sample_weights: &[f64],
        c: f64,
    ) -> (Array2<f64>, Array1<f64>) {
        let mut grad_w = weights.clone();
        let mut grad_b = Array1::zeros(intercept.len());

        for ((x, &y), &w) in features.iter().zip(labels).zip(sample_weights) {
            let probs = softmax(&linear_scores(weights, intercept, x));
            for (k, &p) in probs.iter().enumerate() {
                let residual = c * w * (p - if k == y { 1.0 } else { 0.0 });
                if residual == 0.0 {
                    continue;
                }
                grad_b[k] += residual;
                let mut row = grad_w.row_mut(k);
                for (j, value) in x.iter() {
                    row[j] += residual * value;
                }
            }
        }

        (grad_w, grad_b)
    }

    /// Class probabilities, summing to 1
    pub fn predict_proba(&self, features: &SparseVector) -> Array1<f64> {
        softmax(&linear_scores(&self.weights, &self.intercept, features))
    }

    pub fn n_classes(&self) -> usize {
        self.intercept.len()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

impl Classifier for SoftmaxRegression {
    fn predict(&self, features: &SparseVector) -> Result<usize> {
        argmax(&self.predict_proba(features))
            .ok_or_else(|| AppError::Internal("Classifier has no classes".to_string()))
    }

    fn model_type(&self) -> ModelType {
        ModelType::SoftmaxRegression
    }
}

/// Logistic regression that only yields labels (smartcore backend).
///
/// smartcore does not expose probabilities or sample weights, so this variant
/// is fit without class balancing and reports no confidence.
#[derive(Serialize, Deserialize)]
pub struct LabelOnlyClassifier {
    model: LogisticRegression<f64, i32, DenseMatrix<f64>, Vec<i32>>,
    n_features: usize,
}

impl LabelOnlyClassifier {
    pub fn fit(
        features: &[SparseVector],
        labels: &[usize],
        n_classes: usize,
        n_features: usize,
    ) -> Result<Self> {
        validate_inputs(features, labels, n_classes)?;

        let x = to_dense_matrix(features, n_features);
        let y: Vec<i32> = labels.iter().map(|&label| label as i32).collect();

        let model = LogisticRegression::fit(&x, &y, LogisticRegressionParameters::default())
            .map_err(|e| {
                AppError::Training(format!("Failed to train logistic regression: {}", e))
            })?;

        Ok(Self { model, n_features })
    }
}

impl Classifier for LabelOnlyClassifier {
    fn predict(&self, features: &SparseVector) -> Result<usize> {
        let x = to_dense_matrix(std::slice::from_ref(features), self.n_features);
        let predictions = self
            .model
            .predict(&x)
            .map_err(|e| AppError::Internal(format!("Prediction failed: {}", e)))?;

        predictions
            .first()
            .map(|&label| label as usize)
            .ok_or_else(|| AppError::Internal("Prediction returned no label".to_string()))
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegressionLabelOnly
    }
}

impl std::fmt::Debug for LabelOnlyClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelOnlyClassifier")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

/// A fitted classifier tagged with what it can report
#[derive(Debug, Serialize, Deserialize)]
pub enum CategoryClassifier {
    /// Reports per-class probabilities
    Probabilistic(SoftmaxRegression),

    /// Reports a label only
    LabelOnly(LabelOnlyClassifier),
}

impl CategoryClassifier {
    /// Fit the configured variant
    pub fn fit(
        features: &[SparseVector],
        labels: &[usize],
        n_classes: usize,
        n_features: usize,
        config: &TrainingConfig,
    ) -> Result<Self> {
        match config.classifier {
            ClassifierKind::Probabilistic => Ok(CategoryClassifier::Probabilistic(
                SoftmaxRegression::fit(features, labels, n_classes, n_features, config)?,
            )),
            ClassifierKind::LabelOnly => Ok(CategoryClassifier::LabelOnly(
                LabelOnlyClassifier::fit(features, labels, n_classes, n_features)?,
            )),
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            CategoryClassifier::Probabilistic(model) => model,
            CategoryClassifier::LabelOnly(model) => model,
        }
    }

    pub fn supports_probabilities(&self) -> bool {
        matches!(self, CategoryClassifier::Probabilistic(_))
    }

    /// (iterations, converged); label-only fitting does not report these
    pub fn optimizer_report(&self) -> (usize, bool) {
        match self {
            CategoryClassifier::Probabilistic(model) => (model.iterations(), model.converged()),
            CategoryClassifier::LabelOnly(_) => (0, true),
        }
    }
}

impl Classifier for CategoryClassifier {
    fn predict(&self, features: &SparseVector) -> Result<usize> {
        self.inner().predict(features)
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }
}

fn validate_inputs(features: &[SparseVector], labels: &[usize], n_classes: usize) -> Result<()> {
    if features.is_empty() || features.len() != labels.len() {
        return Err(AppError::Training(format!(
            "Expected matching non-empty features and labels, got {} and {}",
            features.len(),
            labels.len()
        )));
    }
    if n_classes < 2 {
        return Err(AppError::Training(format!(
            "At least two classes are required, got {}",
            n_classes
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&label| label >= n_classes) {
        return Err(AppError::Training(format!(
            "Label index {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

fn linear_scores(weights: &Array2<f64>, intercept: &Array1<f64>, x: &SparseVector) -> Array1<f64> {
    let mut scores = intercept.clone();
    Zip::from(&mut scores)
        .and(weights.rows())
        .for_each(|score, row| {
            for (j, value) in x.iter() {
                if j < row.len() {
                    *score += row[j] * value;
                }
            }
        });
    scores
}

fn softmax(scores: &Array1<f64>) -> Array1<f64> {
    let max = scores.fold(f64::NEG_INFINITY, |acc, &s| acc.max(s));
    let exp = scores.mapv(|s| (s - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Index of the largest value; the first one wins ties
fn argmax(values: &Array1<f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Select the most probable class and its probability
pub fn most_probable(probabilities: &Array1<f64>) -> Option<(usize, f64)> {
    argmax(probabilities).map(|idx| (idx, probabilities[idx]))
}

fn to_dense_matrix(features: &[SparseVector], n_features: usize) -> DenseMatrix<f64> {
    let data: Vec<f64> = features
        .iter()
        .flat_map(|x| x.to_dense(n_features))
        .collect();
    DenseMatrix::new(features.len(), n_features, data, false)
}
