//! Semantic type detection for a single column

use super::values::{is_numeric_dtype, text_values};
use super::SemanticType;
use crate::error::Result;
use polars::prelude::*;
use std::collections::BTreeSet;

/// Spellings that make a column boolean-like once trimmed and lower-cased
pub const BOOLEAN_TOKENS: [&str; 6] = ["0", "1", "0.0", "1.0", "true", "false"];

/// Classify a column as boolean-like, numeric or categorical.
///
/// A native boolean dtype is always boolean-like. Otherwise the distinct
/// non-missing values are rendered as text, trimmed and lower-cased; if they
/// all belong to [`BOOLEAN_TOKENS`] the column is boolean-like. Remaining
/// int/float columns are numeric and everything else is categorical. A column
/// with no values at all, or one whose values cannot be read, is categorical.
pub fn classify(series: &Series) -> SemanticType {
    detect(series).unwrap_or(SemanticType::Categorical)
}

/// Check whether a column holds only boolean-like values
pub fn is_boolean_like(series: &Series) -> bool {
    classify(series) == SemanticType::Boolean
}

fn detect(series: &Series) -> Result<SemanticType> {
    if series.dtype() == &DataType::Boolean {
        return Ok(SemanticType::Boolean);
    }

    let tokens = distinct_tokens(series)?;
    if tokens.is_empty() {
        return Ok(SemanticType::Categorical);
    }

    if tokens.iter().all(|t| BOOLEAN_TOKENS.contains(&t.as_str())) {
        return Ok(SemanticType::Boolean);
    }

    if is_numeric_dtype(series.dtype()) {
        Ok(SemanticType::Numeric)
    } else {
        Ok(SemanticType::Categorical)
    }
}

fn distinct_tokens(series: &Series) -> Result<BTreeSet<String>> {
    Ok(text_values(series)?
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_lowercase())
        .collect())
}
