//! Missing value imputation strategies

use super::audit::{numeric_columns, string_columns};
use super::values::{column, is_numeric_dtype, numeric_values, present_values, text_values};
use crate::error::{ImmoError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Sentinel used by the cleaning helpers for missing categorical values
pub const MISSING_SENTINEL: &str = "missing";

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean (numeric only)
    Mean,
    /// Replace with median (numeric only)
    Median,
    /// Replace with mode / most frequent value
    MostFrequent,
    /// Replace with a constant value
    Constant(f64),
    /// Replace with a constant string (categorical)
    ConstantString(String),
}

impl ImputeStrategy {
    /// Fixed zero fill for numeric columns
    pub fn zero() -> Self {
        ImputeStrategy::Constant(0.0)
    }

    /// Fill value for a numeric column. `None` when the strategy has nothing
    /// to go on (every value missing) or produces text.
    pub fn numeric_fill(&self, values: &[Option<f64>]) -> Option<f64> {
        match self {
            ImputeStrategy::Mean => present_values(values).mean(),
            ImputeStrategy::Median => present_values(values).median(),
            ImputeStrategy::MostFrequent => most_frequent(&present_values(values)),
            ImputeStrategy::Constant(v) => Some(*v),
            ImputeStrategy::ConstantString(_) => None,
        }
    }

    /// Fill value for a text column. Statistical strategies other than the
    /// mode have no meaning for text and yield `None`.
    pub fn text_fill(&self, values: &[Option<String>]) -> Option<String> {
        match self {
            ImputeStrategy::ConstantString(v) => Some(v.clone()),
            ImputeStrategy::MostFrequent => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for v in values.iter().flatten() {
                    *counts.entry(v.as_str()).or_insert(0) += 1;
                }
                // BTreeMap iteration is sorted, so ties resolve to the smallest key.
                counts
                    .into_iter()
                    .fold(None, |best: Option<(&str, usize)>, (k, c)| match best {
                        Some((_, bc)) if bc >= c => best,
                        _ => Some((k, c)),
                    })
                    .map(|(k, _)| k.to_string())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    String(String),
}

/// Imputer for handling missing values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the imputer to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        for col_name in columns {
            let series = column(df, col_name)?;
            if let Some(fill_value) = self.compute_fill_value(series)? {
                self.fill_values.insert(col_name.to_string(), fill_value);
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data by imputing missing values.
    ///
    /// Columns without missing values are returned untouched.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ImmoError::ConfigError("imputer used before fit".to_string()));
        }

        let mut result = df.clone();

        for (col_name, fill_value) in &self.fill_values {
            if let Ok(col) = df.column(col_name) {
                let series = col.as_materialized_series();
                if let Some(filled) = Self::fill_series(series, fill_value)? {
                    result.with_column(filled)?;
                }
            }
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }

    fn compute_fill_value(&self, series: &Series) -> Result<Option<ImputeValue>> {
        let numeric_column = is_numeric_dtype(series.dtype()) || series.dtype() == &DataType::Boolean;
        let untyped = series.dtype() == &DataType::Null;

        match &self.strategy {
            ImputeStrategy::ConstantString(v) if numeric_column => Err(ImmoError::InvalidInput(format!(
                "cannot fill numeric column '{}' with text '{}'",
                series.name(),
                v
            ))),
            ImputeStrategy::ConstantString(_) => {
                let values = text_values(series)?;
                Ok(self.strategy.text_fill(&values).map(ImputeValue::String))
            }
            ImputeStrategy::MostFrequent if !numeric_column => {
                let values = text_values(series)?;
                Ok(self.strategy.text_fill(&values).map(ImputeValue::String))
            }
            strategy if !numeric_column && !untyped => Err(ImmoError::InvalidInput(format!(
                "cannot apply {:?} to column '{}' of type {}",
                strategy,
                series.name(),
                series.dtype()
            ))),
            _ => {
                let values = numeric_values(series)?;
                Ok(self.strategy.numeric_fill(&values).map(ImputeValue::Numeric))
            }
        }
    }

    fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Option<Series>> {
        match fill_value {
            ImputeValue::Numeric(val) => {
                let values = numeric_values(series)?;
                if values.iter().all(Option::is_some) {
                    return Ok(None);
                }
                let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(*val)).collect();
                Ok(Some(Series::new(series.name().clone(), filled)))
            }
            ImputeValue::String(val) => {
                if series.null_count() == 0 {
                    return Ok(None);
                }
                let values = text_values(series)?;
                let filled: Vec<String> = values
                    .into_iter()
                    .map(|v| v.unwrap_or_else(|| val.clone()))
                    .collect();
                Ok(Some(Series::new(series.name().clone(), filled)))
            }
        }
    }
}

/// Fill missing values of numeric columns (default: every int/float column).
///
/// Present values are never altered; columns with nothing missing keep
/// their original dtype.
pub fn impute_numeric(df: &DataFrame, columns: Option<&[&str]>, strategy: ImputeStrategy) -> Result<DataFrame> {
    let defaults = numeric_columns(df);
    let columns: Vec<&str> = match columns {
        Some(cols) => cols.to_vec(),
        None => defaults.iter().map(String::as_str).collect(),
    };

    Imputer::new(strategy).fit_transform(df, &columns)
}

/// Fill missing values of categorical columns with a fixed sentinel
/// (default: every string column).
pub fn impute_categorical(df: &DataFrame, columns: Option<&[&str]>, fill_value: &str) -> Result<DataFrame> {
    let defaults = string_columns(df);
    let columns: Vec<&str> = match columns {
        Some(cols) => cols.to_vec(),
        None => defaults.iter().map(String::as_str).collect(),
    };

    Imputer::new(ImputeStrategy::ConstantString(fill_value.to_string())).fit_transform(df, &columns)
}

/// Most frequent value; ties resolve to the smallest value
fn most_frequent(ca: &Float64Chunked) -> Option<f64> {
    let levels = ca.unique().ok()?.sort(false);
    levels
        .into_no_null_iter()
        .fold(None, |best: Option<(f64, IdxSize)>, level| {
            let count = ca.equal(level).sum().unwrap_or(0);
            match best {
                Some((_, bc)) if bc >= count => best,
                _ => Some((level, count)),
            }
        })
        .map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impute_strategy_serialize() {
        let strategy = ImputeStrategy::ConstantString("unknown".to_string());
        let json = serde_json::to_string(&strategy).unwrap();
        assert!(json.contains("ConstantString"));
        assert!(json.contains("unknown"));
    }

    #[test]
    fn test_median_imputation() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0), Some(10.0)]).unwrap();
        let result = impute_numeric(&df, None, ImputeStrategy::Median).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        assert_eq!(col.get(1), Some(3.0));
        assert_eq!(col.get(3), Some(10.0));
    }

    #[test]
    fn test_mean_imputation() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0), Some(4.0)]).unwrap();
        let result = impute_numeric(&df, Some(&["a"]), ImputeStrategy::Mean).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        // Mean of [1, 3, 4] = 8/3
        assert!((col.get(1).unwrap() - 2.666666666666667).abs() < 0.001);
    }

    #[test]
    fn test_zero_imputation_treats_nan_as_missing() {
        let df = df!("a" => &[Some(f64::NAN), Some(2.0), None]).unwrap();
        let result = impute_numeric(&df, None, ImputeStrategy::zero()).unwrap();

        let values: Vec<Option<f64>> = result.column("a").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(0.0), Some(2.0), Some(0.0)]);
    }

    #[test]
    fn test_complete_column_is_untouched() {
        let df = df!("rooms" => &[1i64, 2, 3]).unwrap();
        let result = impute_numeric(&df, None, ImputeStrategy::Mean).unwrap();
        assert!(result.equals(&df));
        assert_eq!(result.column("rooms").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_categorical_sentinel() {
        let df = df!(
            "district" => &[Some("Centro"), None, Some("Retiro")],
            "price" => &[Some(1.0), None, Some(2.0)],
        )
        .unwrap();
        let result = impute_categorical(&df, None, MISSING_SENTINEL).unwrap();

        let col = result.column("district").unwrap().str().unwrap();
        assert_eq!(col.get(1), Some("missing"));
        // numeric columns are not touched by the categorical fill
        assert_eq!(result.column("price").unwrap().null_count(), 1);
    }

    #[test]
    fn test_text_fill_rejects_numeric_column() {
        let df = df!("price" => &[Some(1.0), None]).unwrap();
        assert!(impute_categorical(&df, Some(&["price"]), "missing").is_err());
    }

    #[test]
    fn test_most_frequent_ties_pick_smallest() {
        let strategy = ImputeStrategy::MostFrequent;
        assert_eq!(strategy.numeric_fill(&[Some(1.0), Some(0.0), Some(1.0), Some(0.0)]), Some(0.0));
        assert_eq!(strategy.numeric_fill(&[Some(1.0), None, Some(1.0), Some(0.0)]), Some(1.0));
        assert_eq!(strategy.numeric_fill(&[None, None]), None);

        let values = vec![Some("b".to_string()), Some("a".to_string()), None];
        assert_eq!(strategy.text_fill(&values), Some("a".to_string()));
    }

    #[test]
    fn test_median_even_length() {
        let values = [Some(4.0), Some(1.0), None, Some(3.0), Some(2.0)];
        assert_eq!(ImputeStrategy::Median.numeric_fill(&values), Some(2.5));
        assert_eq!(ImputeStrategy::Mean.numeric_fill(&[None]), None);
    }

    #[test]
    fn test_numeric_strategy_rejects_text_column() {
        let df = df!("floor" => &[Some("3"), Some("bajo"), None, Some("5")]).unwrap();
        for strategy in [ImputeStrategy::Median, ImputeStrategy::Mean, ImputeStrategy::zero()] {
            let err = impute_numeric(&df, Some(&["floor"]), strategy).unwrap_err();
            assert!(err.to_string().contains("floor"));
        }
        assert_eq!(df.column("floor").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_text_fill_keeps_present_spelling() {
        let df = df!("code" => &[Some("55.0"), None]).unwrap();
        let result = impute_categorical(&df, None, MISSING_SENTINEL).unwrap();
        let col = result.column("code").unwrap().str().unwrap();
        assert_eq!(col.get(0), Some("55.0"));
        assert_eq!(col.get(1), Some("missing"));
    }
}
