//! Outlier detection
//!
//! Detection only: masks and bounds are reported, rows are never removed or
//! altered. Clipping or dropping flagged rows is left to the caller.

use super::values::{column, is_numeric_dtype, numeric_values, present_values};
use crate::error::{ImmoError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default IQR multiplier
pub const DEFAULT_IQR_FACTOR: f64 = 1.5;
/// Default absolute z-score threshold
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;

/// Method for outlier detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutlierMethod {
    /// Interquartile Range method
    Iqr { factor: f64 },
    /// Z-score (sample standard deviations from mean)
    ZScore { threshold: f64 },
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::Iqr {
            factor: DEFAULT_IQR_FACTOR,
        }
    }
}

/// Fitted bounds for a column. Values strictly outside `[lower, upper]` are
/// outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
    pub mean: f64,
    pub median: f64,
}

impl OutlierBounds {
    fn unbounded(mean: f64, median: f64) -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            mean,
            median,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Outlier detector over the numeric columns of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierDetector {
    method: OutlierMethod,
    columns: Option<Vec<String>>,
    bounds: BTreeMap<String, OutlierBounds>,
    is_fitted: bool,
}

impl OutlierDetector {
    pub fn new(method: OutlierMethod) -> Self {
        Self {
            method,
            columns: None,
            bounds: BTreeMap::new(),
            is_fitted: false,
        }
    }

    /// Create with IQR method
    pub fn iqr(factor: f64) -> Self {
        Self::new(OutlierMethod::Iqr { factor })
    }

    /// Create with Z-score method
    pub fn zscore(threshold: f64) -> Self {
        Self::new(OutlierMethod::ZScore { threshold })
    }

    /// Set specific columns to process
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Fit the detector to compute bounds. Without explicit columns every
    /// int/float column is used.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let columns: Vec<String> = match &self.columns {
            Some(cols) => cols.clone(),
            None => df
                .get_columns()
                .iter()
                .filter(|c| is_numeric_dtype(c.dtype()))
                .map(|c| c.name().to_string())
                .collect(),
        };

        for col_name in &columns {
            let values = numeric_values(column(df, col_name)?)?;
            let bounds = self.compute_bounds(&values)?;
            self.bounds.insert(col_name.clone(), bounds);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Boolean mask per fitted column, named `<column>_outlier`. Missing
    /// values are never flagged.
    pub fn detect(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ImmoError::ConfigError("outlier detector used before fit".to_string()));
        }

        let mut masks: Vec<Column> = Vec::with_capacity(self.bounds.len());
        for (col_name, bounds) in &self.bounds {
            let values = numeric_values(column(df, col_name)?)?;
            let mask = mask_outside(&values, bounds);
            masks.push(Series::new(format!("{col_name}_outlier").into(), mask).into());
        }

        Ok(DataFrame::new(masks)?)
    }

    /// Number of flagged values per fitted column
    pub fn count(&self, df: &DataFrame) -> Result<BTreeMap<String, usize>> {
        let masks = self.detect(df)?;
        let mut counts = BTreeMap::new();
        for (col_name, mask) in self.bounds.keys().zip(masks.get_columns()) {
            let flagged = mask
                .as_materialized_series()
                .bool()?
                .into_iter()
                .filter(|v| *v == Some(true))
                .count();
            counts.insert(col_name.clone(), flagged);
        }
        Ok(counts)
    }

    /// Get the computed bounds
    pub fn bounds(&self) -> &BTreeMap<String, OutlierBounds> {
        &self.bounds
    }

    fn compute_bounds(&self, values: &[Option<f64>]) -> Result<OutlierBounds> {
        let ca = present_values(values);
        let (Some(mean), Some(median)) = (ca.mean(), ca.median()) else {
            return Ok(OutlierBounds::unbounded(0.0, 0.0));
        };

        // Zero spread: nothing can be an outlier.
        if ca.min() == ca.max() {
            return Ok(OutlierBounds::unbounded(mean, median));
        }

        let bounds = match &self.method {
            OutlierMethod::Iqr { factor } => {
                let q1 = ca.quantile(0.25, QuantileMethod::Linear)?.unwrap_or(median);
                let q3 = ca.quantile(0.75, QuantileMethod::Linear)?.unwrap_or(median);
                let iqr = q3 - q1;
                OutlierBounds {
                    lower: q1 - factor * iqr,
                    upper: q3 + factor * iqr,
                    mean,
                    median,
                }
            }
            OutlierMethod::ZScore { threshold } => match ca.std(1) {
                Some(std) if std > 0.0 => OutlierBounds {
                    lower: mean - threshold * std,
                    upper: mean + threshold * std,
                    mean,
                    median,
                },
                _ => OutlierBounds::unbounded(mean, median),
            },
        };
        Ok(bounds)
    }
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::new(OutlierMethod::default())
    }
}

/// Flag values outside `[Q1 - factor*IQR, Q3 + factor*IQR]`
pub fn detect_outliers_iqr(series: &Series, factor: f64) -> Result<Vec<bool>> {
    detect_series(series, OutlierMethod::Iqr { factor })
}

/// Flag values whose absolute z-score exceeds `threshold`
pub fn detect_outliers_zscore(series: &Series, threshold: f64) -> Result<Vec<bool>> {
    detect_series(series, OutlierMethod::ZScore { threshold })
}

fn detect_series(series: &Series, method: OutlierMethod) -> Result<Vec<bool>> {
    let values = numeric_values(series)?;
    let bounds = OutlierDetector::new(method).compute_bounds(&values)?;
    Ok(mask_outside(&values, &bounds))
}

fn mask_outside(values: &[Option<f64>], bounds: &OutlierBounds) -> Vec<bool> {
    values
        .iter()
        .map(|v| v.map(|x| !bounds.contains(x)).unwrap_or(false))
        .collect()
}
