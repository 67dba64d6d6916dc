use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Labeled corpus is empty or carries fewer than two categories
    #[error("Insufficient training data: {samples} samples across {classes} categories")]
    InsufficientTrainingData { samples: usize, classes: usize },

    /// No model artifact has been trained yet
    #[error("Model not trained")]
    ModelNotTrained,

    /// Durable artifact storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Out-of-range request parameters
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Ticket store read errors
    #[error("Ticket source error: {0}")]
    Source(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model fitting errors
    #[error("Training error: {0}")]
    Training(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::InsufficientTrainingData { .. } => "INSUFFICIENT_TRAINING_DATA",
            AppError::ModelNotTrained => "MODEL_NOT_TRAINED",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::MalformedInput(_) => "MALFORMED_INPUT",
            AppError::Source(_) => "SOURCE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error aborts the invocation rather than describing a
    /// legitimate outcome the caller is expected to handle
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AppError::InsufficientTrainingData { .. }
                | AppError::ModelNotTrained
                | AppError::MalformedInput(_)
                | AppError::Validation(_)
        )
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from sled::Error
impl From<sled::Error> for AppError {
    fn from(err: sled::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
