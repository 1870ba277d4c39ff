//! Table cleaning pipeline

use super::audit::{drop_columns, empty_columns};
use super::config::CleaningConfig;
use super::imputer::{impute_categorical, impute_numeric};
use super::partition::{split_by_type, ColumnPartition};
use super::text::normalize_text_columns;
use super::values::is_text_dtype;
use crate::error::Result;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

/// Result of [`clean`]
#[derive(Debug, Clone, Serialize)]
pub struct CleanedTable {
    #[serde(skip)]
    pub data: DataFrame,
    pub partition: ColumnPartition,
    pub dropped: Vec<String>,
}

/// Clean a raw table: drop empty columns, partition by semantic type,
/// convert boolean flags, impute numeric and categorical gaps, then
/// normalize categorical text.
///
/// Row count is preserved and surviving columns keep their order.
pub fn clean(df: &DataFrame, config: &CleaningConfig) -> Result<CleanedTable> {
    let mut dropped = Vec::new();
    let mut data = if config.drop_empty {
        drop_columns(df, &empty_columns(df), Some(&mut dropped))?
    } else {
        df.clone()
    };

    let split = split_by_type(&data, config.convert_booleans)?;
    let partition = split.partition;
    if config.convert_booleans {
        for column in split.boolean.get_columns() {
            data.with_column(column.as_materialized_series().clone())?;
        }
    }

    let numeric: Vec<&str> = partition.numeric.iter().map(String::as_str).collect();
    data = impute_numeric(&data, Some(&numeric), config.numeric_strategy.clone())?;

    // Categorical columns stored as numbers (e.g. zone codes) keep their dtype.
    let text: Vec<&str> = partition
        .categorical
        .iter()
        .map(String::as_str)
        .filter(|name| {
            data.column(name)
                .map(|c| is_text_dtype(c.dtype()) || c.dtype() == &DataType::Null)
                .unwrap_or(false)
        })
        .collect();
    data = impute_categorical(&data, Some(&text), &config.categorical_fill)?;

    if config.normalize_text {
        data = normalize_text_columns(&data, &text)?;
    }

    info!(
        rows = data.height(),
        columns = data.width(),
        dropped = dropped.len(),
        boolean = partition.boolean.len(),
        numeric = partition.numeric.len(),
        categorical = partition.categorical.len(),
        "cleaned table"
    );

    Ok(CleanedTable {
        data,
        partition,
        dropped,
    })
}
