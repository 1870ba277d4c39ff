//! Data preprocessing module
//!
//! Turns raw, partially missing listing tables into a fixed-shape numeric
//! matrix:
//! - Semantic type detection and column partitioning
//! - Missing value imputation and outlier detection
//! - Text normalization of categorical columns
//! - The fitted feature encoder (standardize, one-hot, binary passthrough)

pub mod audit;
pub mod classifier;
mod clean;
mod config;
mod encoder;
mod imputer;
pub mod outlier;
pub mod partition;
mod scaler;
pub mod text;
pub mod values;

pub use audit::{audit, AuditReport};
pub use classifier::{classify, is_boolean_like};
pub use clean::{clean, CleanedTable};
pub use config::{CleaningConfig, EncoderConfig, UNKNOWN_CATEGORY};
pub use encoder::{FeatureEncoder, FeatureGroups, FittedEncoder};
pub use imputer::{impute_categorical, impute_numeric, ImputeStrategy, Imputer, MISSING_SENTINEL};
pub use outlier::{detect_outliers_iqr, detect_outliers_zscore, OutlierBounds, OutlierDetector, OutlierMethod};
pub use partition::{convert_boolean, partition_columns, split_by_type, ColumnPartition, SplitFrames};
pub use scaler::{ScalerParams, ScalerType};
pub use text::{normalize_text, normalize_text_columns};

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use values::{category_keys, numeric_values, present_values};

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Boolean,
    Numeric,
    Categorical,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SemanticType::Boolean => "boolean",
            SemanticType::Numeric => "numeric",
            SemanticType::Categorical => "categorical",
        };
        f.write_str(name)
    }
}

/// Summary statistics of a numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl NumericSummary {
    /// Summarize the present values; `None` when there are none
    pub fn from_values(values: &[Option<f64>]) -> Option<Self> {
        let ca = present_values(values);
        Some(Self {
            min: ca.min()?,
            max: ca.max()?,
            mean: ca.mean()?,
            median: ca.median()?,
        })
    }
}

/// Description of one column, computed once per training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    pub null_count: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub summary: Option<NumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub levels: Option<Vec<String>>,
}

impl ColumnDescriptor {
    /// Describe a column under a known semantic type
    pub fn from_series(series: &Series, semantic_type: SemanticType) -> Result<Self> {
        let (null_count, summary, levels) = match semantic_type {
            SemanticType::Numeric | SemanticType::Boolean => {
                let numeric = numeric_values(series)?;
                let nulls = numeric.iter().filter(|v| v.is_none()).count();
                (nulls, NumericSummary::from_values(&numeric), None)
            }
            SemanticType::Categorical => {
                let keys = category_keys(series)?;
                let nulls = keys.iter().filter(|v| v.is_none()).count();
                let mut levels: Vec<String> = keys.into_iter().flatten().collect();
                levels.sort();
                levels.dedup();
                (nulls, None, Some(levels))
            }
        };

        Ok(Self {
            name: series.name().to_string(),
            semantic_type,
            nullable: null_count > 0,
            null_count,
            summary,
            levels,
        })
    }
}

/// Describe every column of the table, classifying each one
pub fn describe_columns(df: &DataFrame) -> Result<Vec<ColumnDescriptor>> {
    df.get_columns()
        .iter()
        .map(|c| {
            let series = c.as_materialized_series();
            ColumnDescriptor::from_series(series, classify(series))
        })
        .collect()
}
