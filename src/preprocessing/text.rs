//! Text normalization for categorical values

use super::classifier::classify;
use super::values::{column, is_text_dtype};
use super::SemanticType;
use crate::error::Result;
use polars::prelude::*;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Normalize a categorical value: lower-case, then canonical decomposition
/// with combining marks removed ("Ú" → "u").
///
/// Values equal to `true` or `false` in any case are returned unchanged.
pub fn normalize_text(value: &str) -> String {
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return value.to_string();
    }

    value
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

/// Normalize an optional value; missing stays missing
pub fn normalize_value(value: Option<&str>) -> Option<String> {
    value.map(normalize_text)
}

/// Normalize the given text columns of a table.
///
/// Columns stored as numbers and columns that look boolean are left alone.
pub fn normalize_text_columns(df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let mut result = df.clone();

    for name in columns {
        let series = column(df, name)?;
        if !is_text_dtype(series.dtype()) || classify(series) == SemanticType::Boolean {
            debug!(column = %name, dtype = %series.dtype(), "skipping text normalization");
            continue;
        }

        let as_text = series.cast(&DataType::String)?;
        let normalized: StringChunked = as_text.str()?.into_iter().map(normalize_value).collect();
        result.with_column(normalized.with_name(series.name().clone()).into_series())?;
    }

    Ok(result)
}
