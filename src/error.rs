use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failures an experiment can end in. Every variant is recoverable at the
/// request boundary and maps onto a JSON error object.
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("featureIds is required and must not be empty")]
    EmptyFeatureSet,

    #[error("Unknown featureIds: {invalid:?}")]
    UnknownFeatures { invalid: Vec<String>, valid: Vec<String> },

    #[error("Invalid input: {0}")]
    MalformedInput(String),

    #[error("Data file not found: {}", .0.display())]
    DataNotFound(PathBuf),

    #[error("Insufficient data: only {rows} valid rows (need at least {required})")]
    InsufficientData { rows: usize, required: usize },

    #[error("No valid feature rows for prediction")]
    NoInferenceRows,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExperimentResult<T> = Result<T, ExperimentError>;

/// Wire shape of a failed request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_features: Option<Vec<String>>,
}

impl ExperimentError {
    pub fn to_response(&self) -> ErrorResponse {
        let valid_features = match self {
            ExperimentError::UnknownFeatures { valid, .. } => Some(valid.clone()),
            _ => None,
        };
        ErrorResponse {
            error: self.to_string(),
            valid_features,
        }
    }
}
