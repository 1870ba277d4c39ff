//! Feature scaling

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// No scaling
    None,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// mean
    pub center: f64,
    /// population std
    pub scale: f64,
}

impl ScalerParams {
    pub const IDENTITY: ScalerParams = ScalerParams { center: 0.0, scale: 1.0 };

    /// Fit on training values. A zero or undefined spread scales by 1.
    pub fn fit(scaler_type: ScalerType, values: &[f64]) -> Self {
        match scaler_type {
            ScalerType::None => Self::IDENTITY,
            ScalerType::Standard => {
                let ca = Float64Chunked::from_slice(PlSmallStr::EMPTY, values);
                let (Some(mean), std) = (ca.mean(), ca.std(0)) else {
                    return Self::IDENTITY;
                };
                let std = std.unwrap_or(1.0);
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                }
            }
        }
    }

    #[inline]
    pub fn scale(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }

    #[inline]
    pub fn unscale(&self, value: f64) -> f64 {
        value * self.scale + self.center
    }
}
