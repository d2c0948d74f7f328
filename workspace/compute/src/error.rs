use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Closed set of ways a prediction can fail, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionErrorKind {
    DatasetLoadFailure,
    ModelLoadFailure,
    MalformedInput,
    InferenceFailure,
}

impl PredictionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionErrorKind::DatasetLoadFailure => "dataset_load_failure",
            PredictionErrorKind::ModelLoadFailure => "model_load_failure",
            PredictionErrorKind::MalformedInput => "malformed_input",
            PredictionErrorKind::InferenceFailure => "inference_failure",
        }
    }
}

/// Error types for the prediction pipelines
#[derive(Error, Debug)]
pub enum PredictionError {
    /// The labelled dataset could not be read or is unusable for training
    #[error("Dataset load error: {0}")]
    DatasetLoad(String),

    /// The pre-trained image model could not be read or does not match the network
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Request input that cannot be turned into model features
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Training or the forward pass failed
    #[error("Inference error: {0}")]
    Inference(String),
}

impl PredictionError {
    pub fn kind(&self) -> PredictionErrorKind {
        match self {
            PredictionError::DatasetLoad(_) => PredictionErrorKind::DatasetLoadFailure,
            PredictionError::ModelLoad(_) => PredictionErrorKind::ModelLoadFailure,
            PredictionError::MalformedInput(_) => PredictionErrorKind::MalformedInput,
            PredictionError::Inference(_) => PredictionErrorKind::InferenceFailure,
        }
    }
}

// Polars is only used to read the training dataset, so every polars failure is a dataset failure.
impl From<polars::error::PolarsError> for PredictionError {
    fn from(error: polars::error::PolarsError) -> Self {
        let prediction_error = match error {
            polars::error::PolarsError::NoData(_) => {
                PredictionError::DatasetLoad(format!("No data: {}", error))
            }
            polars::error::PolarsError::ColumnNotFound(_) => {
                PredictionError::DatasetLoad(format!("Column not found: {}", error))
            }
            polars::error::PolarsError::SchemaMismatch(_) => {
                PredictionError::DatasetLoad(format!("Schema mismatch: {}", error))
            }
            polars::error::PolarsError::ComputeError(_) => {
                PredictionError::DatasetLoad(format!("Compute error: {}", error))
            }
            _ => PredictionError::DatasetLoad(error.to_string()),
        };
        error!(err = ?prediction_error, "Failed to read dataset");
        prediction_error
    }
}

/// Type alias for Result with PredictionError
pub type Result<T> = std::result::Result<T, PredictionError>;
