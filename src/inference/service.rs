//! Prediction service
//!
//! Built once at process start and shared read-only between request
//! handlers. Nothing in here mutates after construction.

use super::predictor::{LinearPredictor, Predictor};
use super::record::{normalize_record, FeatureRecord};
use crate::artifacts::{ArtifactStore, FeatureSchema, ModelArtifacts, ModelConfig};
use crate::error::{ImmoError, Result};
use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Raw model output and its inverse-transformed value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    /// Output in the transformed target space
    pub raw_output: f64,
    /// Currency value, `None` when the inverse transform is not finite
    pub value: Option<f64>,
}

impl PredictionResult {
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// The currency value, or a numeric invalidity error
    pub fn into_price(self) -> Result<f64> {
        self.value.ok_or(ImmoError::NonFinitePrediction(self.raw_output))
    }
}

/// Wire form of a prediction: a price or an error message, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success {
        prediction: f64,
        raw_prediction: f64,
        status: String,
    },
    Error {
        error: String,
    },
}

impl PredictionResponse {
    pub fn success(prediction: f64, raw_prediction: f64) -> Self {
        PredictionResponse::Success {
            prediction,
            raw_prediction,
            status: "success".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PredictionResponse::Error { error: message.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PredictionResponse::Success { .. })
    }
}

/// Encoder, target pairing and predictor of one model directory
#[derive(Debug)]
pub struct PredictionService {
    artifacts: ModelArtifacts,
    predictor: Box<dyn Predictor>,
}

impl PredictionService {
    /// Combine loaded artifacts with a predictor. The predictor's declared
    /// width must match the encoder output.
    pub fn new(artifacts: ModelArtifacts, predictor: Box<dyn Predictor>) -> Result<Self> {
        let width = artifacts.encoder.output_width();
        if let Some(n) = predictor.n_features() {
            if n != width {
                return Err(ImmoError::ConfigError(format!(
                    "predictor expects {} features but the encoder produces {}",
                    n, width
                )));
            }
        }
        info!(
            inputs = artifacts.config.input_columns.len(),
            width,
            transform = %artifacts.config.target_transform,
            "prediction service ready"
        );
        Ok(Self { artifacts, predictor })
    }

    /// Load artifacts and a [`LinearPredictor`] from a model directory
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let store = ArtifactStore::new(dir.as_ref());
        let artifacts = ModelArtifacts::load(&store)?;
        let predictor = LinearPredictor::load(&store)?;
        Self::new(artifacts, Box::new(predictor))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.artifacts.config
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.artifacts.schema
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    /// Normalize and encode one record into a single-row matrix
    pub fn encode(&self, record: &FeatureRecord) -> Result<Array2<f64>> {
        let sentinel = self.artifacts.encoder.categorical_sentinel();
        let row = normalize_record(record, &self.artifacts.config, sentinel)?;
        self.artifacts.encoder.transform(&row)
    }

    /// Predict one record
    pub fn predict(&self, record: &FeatureRecord) -> Result<PredictionResult> {
        let start = Instant::now();
        let encoded = self.encode(record)?;
        let raw = self.predictor.predict(encoded.view())?;
        let raw_output = raw.first().copied().ok_or_else(|| ImmoError::ShapeError {
            expected: "1 prediction".to_string(),
            actual: "0 predictions".to_string(),
        })?;

        let value = self.artifacts.config.target_transform.inverse_checked(raw_output).ok();
        debug!(
            raw = raw_output,
            valid = value.is_some(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "predicted record"
        );
        Ok(PredictionResult { raw_output, value })
    }

    /// Currency estimate for one record; non-finite results are errors
    pub fn estimate(&self, record: &FeatureRecord) -> Result<f64> {
        self.predict(record)?.into_price()
    }

    /// Predict every row of a table that already carries the input columns
    pub fn predict_batch(&self, df: &DataFrame) -> Result<Vec<PredictionResult>> {
        let encoded = self.artifacts.encoder.transform(df)?;
        let raw = self.predictor.predict(encoded.view())?;
        if raw.len() != df.height() {
            return Err(ImmoError::ShapeError {
                expected: format!("{} predictions", df.height()),
                actual: format!("{} predictions", raw.len()),
            });
        }
        let transform = self.artifacts.config.target_transform;
        Ok(raw
            .iter()
            .map(|&r| PredictionResult {
                raw_output: r,
                value: transform.inverse_checked(r).ok(),
            })
            .collect())
    }

    /// Predict and fold any error into the wire response
    pub fn respond(&self, record: &FeatureRecord) -> PredictionResponse {
        match self.predict(record).and_then(|p| Ok((p.raw_output, p.into_price()?))) {
            Ok((raw, price)) => PredictionResponse::success(price, raw),
            Err(e) => {
                debug!(error = %e, kind = ?e.kind(), "prediction failed");
                PredictionResponse::error(e.to_string())
            }
        }
    }
}
