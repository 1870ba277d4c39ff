//! Inference input records
//!
//! [`normalize_record`] is the one place where a request payload becomes a
//! table the encoder accepts.

use crate::artifacts::ModelConfig;
use crate::error::{ImmoError, Result};
use crate::preprocessing::values::{float_category_key, text_category_key};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A single feature value as it arrives in a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Null,
}

impl FeatureValue {
    fn describe(&self) -> String {
        match self {
            FeatureValue::Bool(b) => b.to_string(),
            FeatureValue::Integer(i) => i.to_string(),
            FeatureValue::Number(n) => n.to_string(),
            FeatureValue::Text(s) => format!("'{s}'"),
            FeatureValue::Null => "null".to_string(),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Integer(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

/// One inference request: feature name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRecord(pub BTreeMap<String, FeatureValue>);

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FeatureValue)> for FeatureRecord {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Turn a record into a one-row table with the model's input columns.
///
/// Absent or null features take a default: 0 for numeric and binary
/// features, `sentinel` for categorical ones. Values are coerced to their
/// group's representation and rejected when that is impossible. Keys the
/// model does not know are ignored.
pub fn normalize_record(record: &FeatureRecord, config: &ModelConfig, sentinel: &str) -> Result<DataFrame> {
    let groups = &config.groups;
    let mut columns: Vec<Column> = Vec::with_capacity(config.input_columns.len());

    for name in &config.input_columns {
        let value = record.get(name).unwrap_or(&FeatureValue::Null);
        let series = if groups.numeric.contains(name) {
            Series::new(name.as_str().into(), [numeric_value(name, value)?])
        } else if groups.binary.contains(name) {
            Series::new(name.as_str().into(), [binary_value(name, value)?])
        } else {
            Series::new(name.as_str().into(), [categorical_value(value, sentinel)])
        };
        columns.push(series.into());
    }

    let ignored: Vec<&str> = record
        .0
        .keys()
        .filter(|k| !config.input_columns.contains(k))
        .map(String::as_str)
        .collect();
    if !ignored.is_empty() {
        debug!(keys = ?ignored, "ignoring unknown record keys");
    }

    Ok(DataFrame::new(columns)?)
}

fn invalid(name: &str, value: &FeatureValue, expected: &str) -> ImmoError {
    ImmoError::InvalidInput(format!(
        "feature '{}': {} is not {}",
        name,
        value.describe(),
        expected
    ))
}

fn numeric_value(name: &str, value: &FeatureValue) -> Result<f64> {
    let v = match value {
        FeatureValue::Null => return Ok(0.0),
        FeatureValue::Bool(b) => f64::from(u8::from(*b)),
        FeatureValue::Integer(i) => *i as f64,
        FeatureValue::Number(n) => *n,
        FeatureValue::Text(s) if s.trim().is_empty() => return Ok(0.0),
        FeatureValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(name, value, "a number"))?,
    };

    if v.is_finite() {
        Ok(v)
    } else {
        Err(invalid(name, value, "a finite number"))
    }
}

fn binary_value(name: &str, value: &FeatureValue) -> Result<f64> {
    let flag = match value {
        FeatureValue::Null => Some(0.0),
        FeatureValue::Bool(b) => Some(f64::from(u8::from(*b))),
        FeatureValue::Integer(i @ (0 | 1)) => Some(*i as f64),
        FeatureValue::Number(n) if *n == 0.0 || *n == 1.0 => Some(*n),
        FeatureValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "" | "0" | "0.0" | "false" => Some(0.0),
            "1" | "1.0" | "true" => Some(1.0),
            _ => None,
        },
        _ => None,
    };
    flag.ok_or_else(|| invalid(name, value, "a 0/1 flag"))
}

fn categorical_value(value: &FeatureValue, sentinel: &str) -> String {
    match value {
        FeatureValue::Null => sentinel.to_string(),
        FeatureValue::Bool(b) => b.to_string(),
        FeatureValue::Integer(i) => i.to_string(),
        FeatureValue::Number(n) => float_category_key(*n),
        FeatureValue::Text(s) => text_category_key(s),
    }
}
