//! Column value extraction
//!
//! Every stage of the pipeline reads polars columns through these helpers so
//! that missing markers, dtype coercion and category spelling behave the same
//! way at fit time and at inference time.

use crate::error::{ImmoError, Result};
use polars::prelude::*;

/// Check if dtype is an int/float family type
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if dtype stores text (plain strings or dictionary-encoded categoricals)
pub fn is_text_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

/// Look up a column by name, reporting a missing column by name.
pub fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| ImmoError::MissingColumns(vec![name.to_string()]))
}

/// Numeric view of a column. `NaN` counts as missing, booleans read as 0/1 and
/// text is parsed leniently: tokens that are not numbers become missing.
pub fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    match series.dtype() {
        DataType::Null => Ok(vec![None; series.len()]),
        dt if is_numeric_dtype(dt) || *dt == DataType::Boolean => {
            let cast = series.cast(&DataType::Float64)?;
            Ok(cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect())
        }
        _ => Ok(text_values(series)?
            .into_iter()
            .map(|v| v.and_then(|s| parse_number(&s)))
            .collect()),
    }
}

/// Numeric view of a column where any non-blank value that cannot be read as
/// a number is an input error.
pub fn numeric_values_strict(series: &Series) -> Result<Vec<Option<f64>>> {
    if !is_text_dtype(series.dtype()) {
        return numeric_values(series);
    }

    text_values(series)?
        .into_iter()
        .map(|v| match v {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse_number(&s).map(Some).ok_or_else(|| {
                ImmoError::InvalidInput(format!(
                    "column '{}': value '{}' is not numeric",
                    series.name(),
                    s
                ))
            }),
        })
        .collect()
}

/// Text view of a column. Floats render the way a person would write them
/// (`1.0`, `0.5`), everything else goes through a polars string cast.
pub fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    match series.dtype() {
        DataType::Null => Ok(vec![None; series.len()]),
        dt if is_float_dtype(dt) => {
            let cast = series.cast(&DataType::Float64)?;
            Ok(cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()).map(|x| format!("{x:?}")))
                .collect())
        }
        _ => {
            let cast = series.cast(&DataType::String)?;
            Ok(cast
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect())
        }
    }
}

/// Canonical category keys. Integer-valued numbers drop their fractional
/// part whether stored as floats or spelled as text, so `55`, `55.0`, `"55"`
/// and `"55.0"` name the same category.
pub fn category_keys(series: &Series) -> Result<Vec<Option<String>>> {
    if is_text_dtype(series.dtype()) {
        return Ok(text_values(series)?
            .into_iter()
            .map(|v| v.map(|s| text_category_key(&s)))
            .collect());
    }
    if !is_float_dtype(series.dtype()) {
        return text_values(series);
    }

    Ok(numeric_values(series)?
        .into_iter()
        .map(|v| v.map(float_category_key))
        .collect())
}

/// Canonical key for a numeric category code
pub fn float_category_key(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Canonical key for a text category. Integer-valued numeric spellings map to
/// the integer key, any other text is kept verbatim.
pub fn text_category_key(value: &str) -> String {
    match parse_number(value) {
        Some(v) if v.fract() == 0.0 => float_category_key(v),
        _ => value.to_string(),
    }
}

/// Present values as a polars float array, ready for aggregation
pub fn present_values(values: &[Option<f64>]) -> Float64Chunked {
    Float64Chunked::from_iter_values(PlSmallStr::EMPTY, values.iter().flatten().copied())
}

/// Number of values that are neither null nor NaN
pub fn present_count(series: &Series) -> usize {
    let nulls = series.null_count();
    let nans = if is_float_dtype(series.dtype()) {
        series
            .cast(&DataType::Float64)
            .ok()
            .and_then(|s| s.f64().ok().map(|ca| ca.into_iter().flatten().filter(|v| v.is_nan()).count()))
            .unwrap_or(0)
    } else {
        0
    };
    series.len() - nulls - nans
}

fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}
