//! Forward/inverse transforms of the price target
//!
//! The pairing is recorded in the model configuration as
//! `{"forward": "log1p", "inverse": "expm1"}` and checked on load, so a model
//! trained on `log1p(price)` is never inverted with `exp`.

use crate::error::{ImmoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target transform applied before fitting and inverted after prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "PairingRecord", into = "PairingRecord")]
pub enum TargetTransform {
    /// `ln(1 + y)` / `exp(x) - 1`
    #[default]
    Log1p,
    /// `ln(y)` / `exp(x)`
    Log,
    /// No transform
    Identity,
}

impl TargetTransform {
    pub fn forward_name(&self) -> &'static str {
        match self {
            TargetTransform::Log1p => "log1p",
            TargetTransform::Log => "log",
            TargetTransform::Identity => "identity",
        }
    }

    pub fn inverse_name(&self) -> &'static str {
        match self {
            TargetTransform::Log1p => "expm1",
            TargetTransform::Log => "exp",
            TargetTransform::Identity => "identity",
        }
    }

    /// Look up a transform by its forward name
    pub fn from_forward_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "log1p" => Ok(TargetTransform::Log1p),
            "log" => Ok(TargetTransform::Log),
            "identity" | "none" => Ok(TargetTransform::Identity),
            other => Err(ImmoError::ConfigError(format!("unknown target transform '{other}'"))),
        }
    }

    /// Apply the forward transform to a target value.
    ///
    /// Values outside the transform's domain, or that map to a non-finite
    /// result, are rejected.
    pub fn forward(&self, value: f64) -> Result<f64> {
        let out = match self {
            TargetTransform::Log1p => value.ln_1p(),
            TargetTransform::Log if value <= 0.0 => f64::NAN,
            TargetTransform::Log => value.ln(),
            TargetTransform::Identity => value,
        };

        if out.is_finite() {
            Ok(out)
        } else {
            Err(ImmoError::InvalidTarget {
                value,
                transform: self.forward_name().to_string(),
            })
        }
    }

    /// Apply the inverse transform. The result may be non-finite; see
    /// [`TargetTransform::inverse_checked`].
    pub fn inverse(&self, raw: f64) -> f64 {
        match self {
            TargetTransform::Log1p => raw.exp_m1(),
            TargetTransform::Log => raw.exp(),
            TargetTransform::Identity => raw,
        }
    }

    /// Apply the inverse transform and reject non-finite results
    pub fn inverse_checked(&self, raw: f64) -> Result<f64> {
        let value = self.inverse(raw);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ImmoError::NonFinitePrediction(value))
        }
    }

    /// Forward-transform a whole target column
    pub fn forward_all(&self, values: &[f64]) -> Result<Vec<f64>> {
        values.iter().map(|v| self.forward(*v)).collect()
    }
}

impl fmt::Display for TargetTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.forward_name(), self.inverse_name())
    }
}

/// Serialized form of a [`TargetTransform`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingRecord {
    pub forward: String,
    pub inverse: String,
}

impl From<TargetTransform> for PairingRecord {
    fn from(t: TargetTransform) -> Self {
        Self {
            forward: t.forward_name().to_string(),
            inverse: t.inverse_name().to_string(),
        }
    }
}

impl TryFrom<PairingRecord> for TargetTransform {
    type Error = ImmoError;

    fn try_from(record: PairingRecord) -> Result<Self> {
        let transform = TargetTransform::from_forward_name(&record.forward)?;
        if transform.inverse_name() != record.inverse.trim().to_lowercase() {
            return Err(ImmoError::ConfigError(format!(
                "target transform '{}' cannot be inverted with '{}', expected '{}'",
                record.forward,
                record.inverse,
                transform.inverse_name()
            )));
        }
        Ok(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for transform in [TargetTransform::Log1p, TargetTransform::Log, TargetTransform::Identity] {
            for price in [1.0, 95_000.0, 250_000.0, 3_750_000.0] {
                let back = transform.inverse_checked(transform.forward(price).unwrap()).unwrap();
                assert!((back - price).abs() <= price * 1e-12, "{transform} {price}");
            }
        }
    }

    #[test]
    fn test_domain_errors() {
        assert!(matches!(
            TargetTransform::Log.forward(0.0),
            Err(ImmoError::InvalidTarget { .. })
        ));
        assert!(TargetTransform::Log1p.forward(-1.0).is_err());
        assert!(TargetTransform::Log1p.forward(f64::NAN).is_err());
        assert!(TargetTransform::Log1p.forward(0.0).is_ok());
    }

    #[test]
    fn test_non_finite_inverse_is_an_error() {
        let err = TargetTransform::Log1p.inverse_checked(1e6).unwrap_err();
        assert!(matches!(err, ImmoError::NonFinitePrediction(v) if v.is_infinite()));
        assert!(TargetTransform::Log.inverse_checked(f64::NAN).is_err());
    }

    #[test]
    fn test_pairing_serialization() {
        let json = serde_json::to_string(&TargetTransform::Log1p).unwrap();
        assert_eq!(json, r#"{"forward":"log1p","inverse":"expm1"}"#);

        let back: TargetTransform = serde_json::from_str(r#"{"forward":"log","inverse":"exp"}"#).unwrap();
        assert_eq!(back, TargetTransform::Log);
    }

    #[test]
    fn test_mismatched_pairing_rejected() {
        let result: std::result::Result<TargetTransform, _> =
            serde_json::from_str(r#"{"forward":"log1p","inverse":"exp"}"#);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be inverted"));
    }
}
