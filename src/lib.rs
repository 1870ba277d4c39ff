//! immopredict - price estimation for real-estate listings
//!
//! This crate provides the preprocessing core of a price-estimation
//! service and the layers around it:
//! - Column type classification, partitioning, cleaning and auditing
//! - A fitted feature encoder (imputation, standardization, one-hot)
//! - Recorded forward/inverse target transforms
//! - Model artifacts, the offline fit phase and evaluation
//! - A prediction service with an HTTP server and CLI
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - Classification, imputation, outliers, text, encoding
//! - [`target`] - Target transform pairing
//!
//! ## Model lifecycle
//! - [`artifacts`] - Model directory files with atomic writes
//! - [`training`] - Fit phase and evaluation metrics
//! - [`inference`] - Record normalization, predictor boundary, prediction service
//!
//! ## Services
//! - [`server`] - HTTP server
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod preprocessing;
pub mod target;

// Model lifecycle
pub mod artifacts;
pub mod inference;
pub mod training;

// Services
pub mod cli;
pub mod server;

// Utilities
pub mod utils;

pub use error::{ErrorKind, ImmoError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{ErrorKind, ImmoError, Result};

    // Preprocessing
    pub use crate::preprocessing::{
        audit, classify, clean, describe_columns, normalize_text, partition_columns, split_by_type,
        AuditReport, CleaningConfig, ColumnDescriptor, ColumnPartition, EncoderConfig, FeatureEncoder,
        FeatureGroups, FittedEncoder, ImputeStrategy, Imputer, OutlierDetector, OutlierMethod, ScalerType,
        SemanticType,
    };

    // Target
    pub use crate::target::TargetTransform;

    // Artifacts
    pub use crate::artifacts::{ArtifactStore, FeatureSchema, ModelArtifacts, ModelConfig};

    // Fit phase
    pub use crate::training::{
        evaluate, fit_artifacts, EvaluationReport, FitConfig, FitReport, FittedArtifacts, RegressionMetrics,
        TrainingData, TrainingPaths,
    };

    // Inference
    pub use crate::inference::{
        normalize_record, FeatureRecord, FeatureValue, LinearPredictor, PredictionResponse, PredictionResult,
        PredictionService, Predictor,
    };

    // Utilities
    pub use crate::utils::{load_data, DataLoader};
}
