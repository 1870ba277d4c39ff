//! Preprocessing configuration

use super::{ImputeStrategy, ScalerType, MISSING_SENTINEL};
use serde::{Deserialize, Serialize};

/// Sentinel the encoder substitutes for missing categorical values
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Configuration for the feature encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Strategy for missing numeric values
    pub numeric_impute_strategy: ImputeStrategy,

    /// Category substituted for missing categorical values
    pub categorical_sentinel: String,

    /// Strategy for missing binary flags
    pub binary_impute_strategy: ImputeStrategy,

    /// Scaler applied to numeric features after imputation
    pub scaler_type: ScalerType,

    /// Normalize category text (case and diacritics) before encoding
    pub normalize_categories: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            numeric_impute_strategy: ImputeStrategy::Median,
            categorical_sentinel: UNKNOWN_CATEGORY.to_string(),
            binary_impute_strategy: ImputeStrategy::MostFrequent,
            scaler_type: ScalerType::Standard,
            normalize_categories: false,
        }
    }
}

impl EncoderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set numeric impute strategy
    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute_strategy = strategy;
        self
    }

    /// Builder method to set the categorical sentinel
    pub fn with_categorical_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.categorical_sentinel = sentinel.into();
        self
    }

    pub fn with_binary_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.binary_impute_strategy = strategy;
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    pub fn with_normalized_categories(mut self, normalize: bool) -> Self {
        self.normalize_categories = normalize;
        self
    }
}

/// Configuration for the table cleaning pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Strategy for missing numeric values
    pub numeric_strategy: ImputeStrategy,

    /// Fill value for missing categorical values
    pub categorical_fill: String,

    /// Rewrite boolean-like columns as nullable 0/1
    pub convert_booleans: bool,

    /// Normalize text of categorical columns
    pub normalize_text: bool,

    /// Drop columns where every value is missing
    pub drop_empty: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            numeric_strategy: ImputeStrategy::Median,
            categorical_fill: MISSING_SENTINEL.to_string(),
            convert_booleans: true,
            normalize_text: true,
            drop_empty: true,
        }
    }
}

impl CleaningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric_strategy(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_strategy = strategy;
        self
    }

    pub fn with_categorical_fill(mut self, fill: impl Into<String>) -> Self {
        self.categorical_fill = fill.into();
        self
    }

    pub fn with_boolean_conversion(mut self, convert: bool) -> Self {
        self.convert_booleans = convert;
        self
    }

    pub fn with_text_normalization(mut self, normalize: bool) -> Self {
        self.normalize_text = normalize;
        self
    }

    pub fn with_drop_empty(mut self, drop: bool) -> Self {
        self.drop_empty = drop;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncoderConfig::default();
        assert_eq!(config.numeric_impute_strategy, ImputeStrategy::Median);
        assert_eq!(config.categorical_sentinel, "unknown");
        assert_eq!(config.binary_impute_strategy, ImputeStrategy::MostFrequent);
        assert!(!config.normalize_categories);

        let cleaning = CleaningConfig::default();
        assert_eq!(cleaning.categorical_fill, "missing");
        assert!(cleaning.convert_booleans);
    }

    #[test]
    fn test_builder_pattern() {
        let config = EncoderConfig::new()
            .with_scaler(ScalerType::None)
            .with_categorical_sentinel("otro")
            .with_numeric_impute(ImputeStrategy::Mean);

        assert_eq!(config.scaler_type, ScalerType::None);
        assert_eq!(config.categorical_sentinel, "otro");
        assert_eq!(config.numeric_impute_strategy, ImputeStrategy::Mean);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = CleaningConfig::new().with_drop_empty(false);
        let json = serde_json::to_string(&config).unwrap();
        let back: CleaningConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
