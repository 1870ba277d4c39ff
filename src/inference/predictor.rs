//! Predictor boundary
//!
//! The regression model itself is trained outside this crate. A predictor
//! consumes the encoded feature matrix and returns one raw output per row,
//! in the transformed target space.

use crate::artifacts::{ArtifactStore, MODEL_FILE};
use crate::error::{ImmoError, Result};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Opaque regression model over encoded features
pub trait Predictor: Send + Sync + Debug {
    /// Raw outputs, one per row of `features`
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Declared input width, if the model knows it
    fn n_features(&self) -> Option<usize> {
        None
    }
}

/// Linear model `x · coefficients + intercept`, stored as `model.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPredictor {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearPredictor {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    /// Predicts `value` for every row
    pub fn constant(width: usize, value: f64) -> Self {
        Self::new(vec![0.0; width], value)
    }

    pub fn load(store: &ArtifactStore) -> Result<Self> {
        let model: Self = store.load_json(MODEL_FILE)?;
        if model.coefficients.iter().chain([&model.intercept]).any(|v| !v.is_finite()) {
            return Err(ImmoError::ConfigError(format!(
                "{} contains non-finite parameters",
                store.path(MODEL_FILE).display()
            )));
        }
        Ok(model)
    }

    pub fn save(&self, store: &ArtifactStore) -> Result<()> {
        store.save_json(MODEL_FILE, self)?;
        Ok(())
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if features.ncols() != self.coefficients.len() {
            return Err(ImmoError::ShapeError {
                expected: format!("{} features", self.coefficients.len()),
                actual: format!("{} features", features.ncols()),
            });
        }
        let coefficients = Array1::from(self.coefficients.clone());
        Ok(features.dot(&coefficients) + self.intercept)
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_predict() {
        let model = LinearPredictor::new(vec![2.0, -1.0], 0.5);
        let x = array![[1.0, 1.0], [0.0, 3.0]];
        let y = model.predict(x.view()).unwrap();
        assert_eq!(y.to_vec(), vec![1.5, -2.5]);
        assert_eq!(model.n_features(), Some(2));
    }

    #[test]
    fn test_width_mismatch() {
        let model = LinearPredictor::constant(3, 12.0);
        let x = array![[1.0, 1.0]];
        assert!(matches!(model.predict(x.view()), Err(ImmoError::ShapeError { .. })));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&LinearPredictor::new(vec![1.0], 2.0)).unwrap();
        assert_eq!(json, r#"{"coefficients":[1.0],"intercept":2.0}"#);
    }
}
