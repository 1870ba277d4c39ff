//! Inference
//!
//! Request records are normalized into the fitted input columns, encoded,
//! passed to an opaque [`Predictor`] and mapped back to currency through the
//! recorded target transform.

mod predictor;
mod record;
mod service;

pub use predictor::{LinearPredictor, Predictor};
pub use record::{normalize_record, FeatureRecord, FeatureValue};
pub use service::{PredictionResponse, PredictionResult, PredictionService};
