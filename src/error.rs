//! Error types for the immopredict crate

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for immopredict operations
pub type Result<T> = std::result::Result<T, ImmoError>;

/// Coarse classification of an error, used at the request boundary to decide
/// how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Artifacts absent, unreadable or inconsistent. Fatal for serving.
    Configuration,
    /// A request carried something the pipeline cannot use.
    InputValidation,
    /// The model produced a value that is not a finite number.
    NumericInvalidity,
    /// Malformed tables during exploration or fitting.
    Data,
    /// Filesystem failures.
    Io,
}

/// Main error type
#[derive(Error, Debug)]
pub enum ImmoError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Required artifact not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Target value {value} is outside the domain of the {transform} transform")]
    InvalidTarget { value: f64, transform: String },

    #[error("Prediction is not a finite number: {0}")]
    NonFinitePrediction(f64),
}

impl ImmoError {
    /// Classify the error for the request boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImmoError::ConfigError(_) | ImmoError::ArtifactMissing(_) => ErrorKind::Configuration,
            ImmoError::MissingColumns(_) | ImmoError::InvalidInput(_) | ImmoError::ShapeError { .. } => {
                ErrorKind::InputValidation
            }
            ImmoError::NonFinitePrediction(_) => ErrorKind::NumericInvalidity,
            ImmoError::DataError(_) | ImmoError::SerializationError(_) | ImmoError::InvalidTarget { .. } => {
                ErrorKind::Data
            }
            ImmoError::IoError(_) => ErrorKind::Io,
        }
    }
}

impl From<polars::error::PolarsError> for ImmoError {
    fn from(err: polars::error::PolarsError) -> Self {
        ImmoError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ImmoError {
    fn from(err: serde_json::Error) -> Self {
        ImmoError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ImmoError {
    fn from(err: ndarray::ShapeError) -> Self {
        ImmoError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImmoError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_missing_columns_lists_names() {
        let err = ImmoError::MissingColumns(vec!["n_rooms".to_string(), "has_lift".to_string()]);
        assert_eq!(err.to_string(), "Missing required column(s): n_rooms, has_lift");
        assert_eq!(err.kind(), ErrorKind::InputValidation);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ImmoError = io_err.into();
        assert!(matches!(err, ImmoError::IoError(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ImmoError::NonFinitePrediction(f64::NAN).kind(), ErrorKind::NumericInvalidity);
        assert_eq!(ImmoError::ArtifactMissing("models/encoder.json".into()).kind(), ErrorKind::Configuration);
    }
}
