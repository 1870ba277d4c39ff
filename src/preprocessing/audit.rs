//! Column audit helpers for exploring raw listing tables
//!
//! All helpers are detection-only and return column names in table order,
//! except [`drop_columns`] and [`derive_category_column`] which build a new
//! table.

use super::outlier::OutlierDetector;
use super::partition::{partition_columns, ColumnPartition};
use super::values::{column, is_numeric_dtype, is_text_dtype, present_count, text_values};
use crate::error::{ImmoError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Default missing fraction above which a column is reported
pub const DEFAULT_MISSING_THRESHOLD: f64 = 0.5;
/// Default number of levels above which a text column is high-cardinality
pub const DEFAULT_MAX_LEVELS: usize = 20;
/// Textual spellings of a missing value
pub const MISSING_MARKERS: [&str; 5] = ["", "na", "NA", "null", "NULL"];

fn names_where(df: &DataFrame, predicate: impl Fn(&Series) -> bool) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| predicate(c.as_materialized_series()))
        .map(|c| c.name().to_string())
        .collect()
}

/// Columns whose every value is missing
pub fn empty_columns(df: &DataFrame) -> Vec<String> {
    names_where(df, |s| present_count(s) == 0)
}

/// Columns with at most one distinct value, missing counted as a value
pub fn constant_columns(df: &DataFrame) -> Vec<String> {
    names_where(df, |s| {
        text_values(s)
            .map(|values| values.into_iter().collect::<HashSet<_>>().len() <= 1)
            .unwrap_or(false)
    })
}

/// Int/float columns
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    names_where(df, |s| is_numeric_dtype(s.dtype()))
}

/// String/categorical columns
pub fn string_columns(df: &DataFrame) -> Vec<String> {
    names_where(df, |s| is_text_dtype(s.dtype()))
}

/// Columns whose missing fraction is strictly above `threshold`
pub fn high_missing_columns(df: &DataFrame, threshold: f64) -> Vec<String> {
    names_where(df, |s| {
        !s.is_empty() && (s.len() - present_count(s)) as f64 / s.len() as f64 > threshold
    })
}

/// Text columns with more than `max_levels` distinct present values
pub fn high_cardinality_columns(df: &DataFrame, max_levels: usize) -> Vec<String> {
    names_where(df, |s| {
        is_text_dtype(s.dtype())
            && text_values(s)
                .map(|values| values.into_iter().flatten().collect::<HashSet<_>>().len() > max_levels)
                .unwrap_or(false)
    })
}

/// Columns holding a null, a NaN, or a textual missing marker
pub fn missing_like_columns(df: &DataFrame) -> Vec<String> {
    names_where(df, |s| {
        if present_count(s) < s.len() {
            return true;
        }
        is_text_dtype(s.dtype())
            && text_values(s)
                .map(|values| {
                    values
                        .iter()
                        .flatten()
                        .any(|v| MISSING_MARKERS.contains(&v.as_str()))
                })
                .unwrap_or(false)
    })
}

/// Remove columns, appending their names to `dropped` when given.
///
/// Every name must exist in the table.
pub fn drop_columns(df: &DataFrame, columns: &[String], dropped: Option<&mut Vec<String>>) -> Result<DataFrame> {
    let absent: Vec<String> = columns
        .iter()
        .filter(|c| df.column(c).is_err())
        .cloned()
        .collect();
    if !absent.is_empty() {
        return Err(ImmoError::MissingColumns(absent));
    }

    let mut result = df.clone();
    for name in columns {
        result = result.drop(name)?;
    }

    if let Some(log) = dropped {
        log.extend(columns.iter().cloned());
    }
    Ok(result)
}

/// Build a categorical column from keyword matches over a text column.
///
/// `mapping` is tried in order and the first keyword contained in a row's
/// value decides its category; rows matching nothing are missing.
pub fn derive_category_column(
    df: &DataFrame,
    source: &str,
    mapping: &[(&str, &str)],
    dest: &str,
) -> Result<DataFrame> {
    let values = text_values(column(df, source)?)?;
    let derived: Vec<Option<&str>> = values
        .iter()
        .map(|v| {
            v.as_deref().and_then(|text| {
                mapping
                    .iter()
                    .find(|(keyword, _)| text.contains(keyword))
                    .map(|(_, category)| *category)
            })
        })
        .collect();

    let mut result = df.clone();
    result.with_column(Series::new(dest.into(), derived))?;
    Ok(result)
}

/// Summary of a raw table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub rows: usize,
    pub columns: usize,
    pub partition: ColumnPartition,
    pub empty: Vec<String>,
    pub constant: Vec<String>,
    pub high_missing: Vec<String>,
    pub high_cardinality: Vec<String>,
    pub missing_like: Vec<String>,
    /// IQR outlier count per numeric column
    pub outliers: BTreeMap<String, usize>,
}

/// Audit a table with the default thresholds
pub fn audit(df: &DataFrame) -> Result<AuditReport> {
    let partition = partition_columns(df);

    let mut detector = OutlierDetector::default().with_columns(partition.numeric.clone());
    detector.fit(df)?;
    let outliers = detector.count(df)?;

    Ok(AuditReport {
        rows: df.height(),
        columns: df.width(),
        empty: empty_columns(df),
        constant: constant_columns(df),
        high_missing: high_missing_columns(df, DEFAULT_MISSING_THRESHOLD),
        high_cardinality: high_cardinality_columns(df, DEFAULT_MAX_LEVELS),
        missing_like: missing_like_columns(df),
        partition,
        outliers,
    })
}
