//! Splitting a table into boolean, numeric and categorical column groups

use super::classifier::classify;
use super::values::{numeric_values, present_count, text_values};
use super::SemanticType;
use crate::error::Result;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Column names grouped by detected semantic type, in table order.
///
/// Every column of the source table appears in exactly one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPartition {
    pub boolean: Vec<String>,
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl ColumnPartition {
    /// Total number of columns across the three groups
    pub fn len(&self) -> usize {
        self.boolean.len() + self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Semantic type recorded for a column, if the column was partitioned
    pub fn type_of(&self, name: &str) -> Option<SemanticType> {
        if self.boolean.iter().any(|c| c == name) {
            Some(SemanticType::Boolean)
        } else if self.numeric.iter().any(|c| c == name) {
            Some(SemanticType::Numeric)
        } else if self.categorical.iter().any(|c| c == name) {
            Some(SemanticType::Categorical)
        } else {
            None
        }
    }
}

/// The three sub-tables produced by [`split_by_type`]
#[derive(Debug, Clone)]
pub struct SplitFrames {
    pub boolean: DataFrame,
    pub numeric: DataFrame,
    pub categorical: DataFrame,
    pub partition: ColumnPartition,
}

/// Classify every column of the table
pub fn partition_columns(df: &DataFrame) -> ColumnPartition {
    let detected: Vec<(String, SemanticType)> = df
        .get_columns()
        .par_iter()
        .map(|col| (col.name().to_string(), classify(col.as_materialized_series())))
        .collect();

    let mut partition = ColumnPartition::default();
    for (name, dtype) in detected {
        match dtype {
            SemanticType::Boolean => partition.boolean.push(name),
            SemanticType::Numeric => partition.numeric.push(name),
            SemanticType::Categorical => partition.categorical.push(name),
        }
    }
    partition
}

/// Split a table into boolean, numeric and categorical sub-tables.
///
/// With `convert_bool`, boolean columns are rewritten as nullable `UInt8`
/// (see [`convert_boolean`]).
pub fn split_by_type(df: &DataFrame, convert_bool: bool) -> Result<SplitFrames> {
    let partition = partition_columns(df);

    let mut boolean = df.select(partition.boolean.iter().map(String::as_str))?;
    let numeric = df.select(partition.numeric.iter().map(String::as_str))?;
    let categorical = df.select(partition.categorical.iter().map(String::as_str))?;

    if convert_bool {
        for name in &partition.boolean {
            let converted = convert_boolean(boolean.column(name)?.as_materialized_series())?;
            boolean.with_column(converted)?;
        }
    }

    Ok(SplitFrames {
        boolean,
        numeric,
        categorical,
        partition,
    })
}

/// Convert a boolean-like column to nullable `UInt8`: true → 1, false → 0,
/// missing stays missing.
///
/// When every present value reads as the number 0 or 1 the numeric reading is
/// used directly. Otherwise the text tokens `true`/`false`/`1`/`0`/`1.0`/`0.0`
/// are mapped case-insensitively and any other token becomes missing.
pub fn convert_boolean(series: &Series) -> Result<Series> {
    let numeric = numeric_values(series)?;
    let read = numeric.iter().flatten().count();
    let numeric_route =
        read == present_count(series) && numeric.iter().flatten().all(|v| *v == 0.0 || *v == 1.0);

    let converted: Vec<Option<u8>> = if numeric_route {
        numeric.into_iter().map(|v| v.map(|x| x.round() as u8)).collect()
    } else {
        text_values(series)?
            .into_iter()
            .map(|v| v.and_then(|s| boolean_token(&s)))
            .collect()
    };

    Ok(Series::new(series.name().clone(), converted))
}

fn boolean_token(token: &str) -> Option<u8> {
    match token.trim().to_lowercase().as_str() {
        "true" | "1" | "1.0" => Some(1),
        "false" | "0" | "0.0" => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_df() -> DataFrame {
        df!(
            "sq_mt_built" => &[80.0, 120.0, 64.0, 95.0],
            "has_lift" => &[Some(true), Some(false), None, Some(true)],
            "has_pool" => &[0i64, 1, 0, 0],
            "is_exterior" => &[Some("True"), Some("false"), None, Some("TRUE")],
            "district" => &["Centro", "Retiro", "Salamanca", "Centro"],
        )
        .unwrap()
    }

    #[test]
    fn test_partition_covers_every_column_once() {
        let df = mixed_df();
        let partition = partition_columns(&df);

        assert_eq!(partition.boolean, vec!["has_lift", "has_pool", "is_exterior"]);
        assert_eq!(partition.numeric, vec!["sq_mt_built"]);
        assert_eq!(partition.categorical, vec!["district"]);
        assert_eq!(partition.len(), df.width());
        assert_eq!(partition.type_of("district"), Some(SemanticType::Categorical));
        assert_eq!(partition.type_of("price"), None);
    }

    #[test]
    fn test_split_by_type_converts_booleans() {
        let split = split_by_type(&mixed_df(), true).unwrap();
        assert_eq!(split.boolean.width(), 3);
        assert_eq!(split.numeric.width(), 1);
        assert_eq!(split.categorical.width(), 1);

        let lift = split.boolean.column("has_lift").unwrap().as_materialized_series();
        assert_eq!(lift.dtype(), &DataType::UInt8);
        let values: Vec<Option<u8>> = lift.u8().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1), Some(0), None, Some(1)]);
    }

    #[test]
    fn test_split_without_conversion_keeps_dtype() {
        let split = split_by_type(&mixed_df(), false).unwrap();
        assert_eq!(split.boolean.column("has_lift").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn test_convert_text_tokens() {
        let s = Series::new("x".into(), &[Some("True"), Some("false"), Some("maybe"), None]);
        let converted = convert_boolean(&s).unwrap();
        let values: Vec<Option<u8>> = converted.u8().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1), Some(0), None, None]);
    }

    #[test]
    fn test_convert_float_flags() {
        let s = Series::new("x".into(), &[Some(1.0), None, Some(0.0)]);
        let converted = convert_boolean(&s).unwrap();
        let values: Vec<Option<u8>> = converted.u8().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1), None, Some(0)]);
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let s = Series::new("x".into(), &[Some("TRUE"), None, Some("0")]);
        let once = convert_boolean(&s).unwrap();
        let twice = convert_boolean(&once).unwrap();
        assert!(once.equals_missing(&twice));
    }
}
