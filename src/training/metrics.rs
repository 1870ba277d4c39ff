//! Regression metrics and model evaluation

use crate::artifacts::ModelArtifacts;
use crate::error::{ImmoError, Result};
use crate::inference::Predictor;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Metrics for a regression model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute regression metrics
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(ImmoError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(ImmoError::DataError("cannot compute metrics on zero samples".to_string()));
        }

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| t - p).collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        // R2
        let mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(Self {
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: y_true.len(),
        })
    }
}

/// Evaluation of a predictor on a held-out split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Metrics against the forward-transformed target
    pub transformed: RegressionMetrics,
    /// Mean absolute error in currency
    pub currency_mae: f64,
    /// Rows whose inverse-transformed prediction was not finite
    pub invalid_predictions: usize,
}

/// Score a predictor on a test split
pub fn evaluate(
    artifacts: &ModelArtifacts,
    predictor: &dyn Predictor,
    x_test: &DataFrame,
    y_test: &[f64],
) -> Result<EvaluationReport> {
    let transform = artifacts.config.target_transform;
    let encoded = artifacts.encoder.transform(x_test)?;
    let raw: Array1<f64> = predictor.predict(encoded.view())?;
    let raw = raw.to_vec();

    let y_transformed = transform.forward_all(y_test)?;
    let transformed = RegressionMetrics::compute(&y_transformed, &raw)?;

    let mut abs_error = 0.0;
    let mut valid = 0usize;
    for (truth, r) in y_test.iter().zip(raw.iter()) {
        if let Ok(price) = transform.inverse_checked(*r) {
            abs_error += (truth - price).abs();
            valid += 1;
        }
    }
    let currency_mae = if valid > 0 { abs_error / valid as f64 } else { f64::NAN };

    let report = EvaluationReport {
        transformed,
        currency_mae,
        invalid_predictions: y_test.len() - valid,
    };
    info!(
        rows = y_test.len(),
        r2 = report.transformed.r2,
        rmse = report.transformed.rmse,
        currency_mae = report.currency_mae,
        "evaluated predictor"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = [1.0, 2.0, 3.0];
        let m = RegressionMetrics::compute(&y, &y).unwrap();
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
    }

    #[test]
    fn test_known_errors() {
        let m = RegressionMetrics::compute(&[1.0, 2.0, 3.0, 4.0], &[2.0, 2.0, 3.0, 2.0]).unwrap();
        assert!((m.mae - 0.75).abs() < 1e-12);
        assert!((m.rmse - (5.0f64 / 4.0).sqrt()).abs() < 1e-12);
        // ss_res = 5, ss_tot = 5
        assert!(m.r2.abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            RegressionMetrics::compute(&[1.0], &[1.0, 2.0]),
            Err(ImmoError::ShapeError { .. })
        ));
    }
}
