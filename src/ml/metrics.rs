//! Prometheus metrics for training, prediction and similarity search

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};

/// ML subsystem metrics collection
pub struct MlMetrics {
    /// Training runs by outcome (trained, skipped, failed)
    pub training_runs: CounterVec,

    /// Training duration in seconds
    pub training_duration: Histogram,

    /// Samples the current model was trained on
    pub training_samples: Gauge,

    /// Predictions by outcome (predicted, untrained, failed)
    pub predictions: CounterVec,

    /// Similarity searches by outcome (ranked, untrained, empty, failed)
    pub similarity_searches: CounterVec,

    /// Similarity search duration in seconds
    pub similarity_duration: Histogram,

    /// Model loads by the tier that answered (cache, durable, absent)
    pub model_loads: CounterVec,
}

impl MlMetrics {
    pub fn new() -> Self {
        Self {
            training_runs: register_counter_vec!(
                "ticket_ml_training_runs_total",
                "Total number of training runs",
                &["outcome"]
            )
            .unwrap(),

            training_duration: register_histogram!(
                "ticket_ml_training_duration_seconds",
                "Training duration in seconds",
                vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
            )
            .unwrap(),

            training_samples: register_gauge!(
                "ticket_ml_training_samples",
                "Number of samples in the current model"
            )
            .unwrap(),

            predictions: register_counter_vec!(
                "ticket_ml_predictions_total",
                "Total number of category predictions",
                &["outcome"]
            )
            .unwrap(),

            similarity_searches: register_counter_vec!(
                "ticket_ml_similarity_searches_total",
                "Total number of similarity searches",
                &["outcome"]
            )
            .unwrap(),

            similarity_duration: register_histogram!(
                "ticket_ml_similarity_duration_seconds",
                "Similarity search duration in seconds",
                vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
            )
            .unwrap(),

            model_loads: register_counter_vec!(
                "ticket_ml_model_loads_total",
                "Total number of model loads by answering tier",
                &["tier"]
            )
            .unwrap(),
        }
    }

    pub fn record_training(&self, outcome: &str, duration_secs: f64) {
        self.training_runs.with_label_values(&[outcome]).inc();
        self.training_duration.observe(duration_secs);
    }

    pub fn record_prediction(&self, outcome: &str) {
        self.predictions.with_label_values(&[outcome]).inc();
    }

    pub fn record_similarity(&self, outcome: &str, duration_secs: f64) {
        self.similarity_searches.with_label_values(&[outcome]).inc();
        self.similarity_duration.observe(duration_secs);
    }

    pub fn record_model_load(&self, tier: &str) {
        self.model_loads.with_label_values(&[tier]).inc();
    }
}

impl Default for MlMetrics {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// Global ML metrics instance
    pub static ref ML_METRICS: MlMetrics = MlMetrics::new();
}

/// Initialize ML metrics (idempotent)
pub fn init_ml_metrics() {
    lazy_static::initialize(&ML_METRICS);
}

/// Render the default registry in the Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registered_once() {
        init_ml_metrics();
        init_ml_metrics();

        ML_METRICS.record_prediction("predicted");
        ML_METRICS.record_model_load("cache");

        let text = gather_metrics();
        assert!(text.contains("ticket_ml_predictions_total"));
        assert!(text.contains("ticket_ml_model_loads_total"));
    }
}
