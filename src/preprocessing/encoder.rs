//! Feature encoder
//!
//! Fit once on the training table, then applied identically to every later
//! table. Output columns are laid out as: numeric features (imputed then
//! scaled), one block of one-hot indicators per categorical feature, and
//! binary flags (imputed, passed through).

use super::config::EncoderConfig;
use super::partition::{convert_boolean, ColumnPartition};
use super::scaler::ScalerParams;
use super::text::normalize_text;
use super::values::{category_keys, column, numeric_values, numeric_values_strict, text_values};
use super::SemanticType;
use crate::error::{ImmoError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// The designated input columns, by role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGroups {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub binary: Vec<String>,
}

impl FeatureGroups {
    pub fn new<S: Into<String>>(
        numeric: impl IntoIterator<Item = S>,
        categorical: impl IntoIterator<Item = S>,
        binary: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            numeric: numeric.into_iter().map(Into::into).collect(),
            categorical: categorical.into_iter().map(Into::into).collect(),
            binary: binary.into_iter().map(Into::into).collect(),
        }
    }

    /// Boolean columns become binary features
    pub fn from_partition(partition: &ColumnPartition) -> Self {
        Self {
            numeric: partition.numeric.clone(),
            categorical: partition.categorical.clone(),
            binary: partition.boolean.clone(),
        }
    }

    /// Every input column, in encoder order
    pub fn input_columns(&self) -> Vec<String> {
        self.numeric
            .iter()
            .chain(&self.categorical)
            .chain(&self.binary)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len() + self.binary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn role_of(&self, name: &str) -> Option<SemanticType> {
        if self.numeric.iter().any(|c| c == name) {
            Some(SemanticType::Numeric)
        } else if self.categorical.iter().any(|c| c == name) {
            Some(SemanticType::Categorical)
        } else if self.binary.iter().any(|c| c == name) {
            Some(SemanticType::Boolean)
        } else {
            None
        }
    }

    /// Groups must be non-empty and name each column once
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ImmoError::ConfigError("no feature columns selected".to_string()));
        }

        let mut seen = BTreeSet::new();
        let duplicates: BTreeSet<&str> = self
            .numeric
            .iter()
            .chain(&self.categorical)
            .chain(&self.binary)
            .filter(|c| !seen.insert(c.as_str()))
            .map(String::as_str)
            .collect();

        if !duplicates.is_empty() {
            return Err(ImmoError::ConfigError(format!(
                "column(s) assigned to more than one feature group: {}",
                duplicates.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericFeature {
    name: String,
    fill: f64,
    scaler: ScalerParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalFeature {
    name: String,
    fill: String,
    /// Sorted, distinct
    levels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BinaryFeature {
    name: String,
    fill: f64,
}

/// Unfitted encoder
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    config: EncoderConfig,
}

impl FeatureEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Learn imputation statistics, scaling parameters and category
    /// vocabularies from the training table.
    pub fn fit(&self, df: &DataFrame, groups: &FeatureGroups) -> Result<FittedEncoder> {
        groups.validate()?;
        check_columns(df, &groups.input_columns())?;
        if df.height() == 0 {
            return Err(ImmoError::DataError("cannot fit encoder on an empty table".to_string()));
        }

        let numeric = groups
            .numeric
            .iter()
            .map(|name| self.fit_numeric(df, name))
            .collect::<Result<Vec<_>>>()?;
        let categorical = groups
            .categorical
            .iter()
            .map(|name| self.fit_categorical(df, name))
            .collect::<Result<Vec<_>>>()?;
        let binary = groups
            .binary
            .iter()
            .map(|name| self.fit_binary(df, name))
            .collect::<Result<Vec<_>>>()?;

        let encoder = FittedEncoder::new(self.config.clone(), numeric, categorical, binary, df.height());
        info!(
            rows = df.height(),
            inputs = groups.len(),
            width = encoder.output_width(),
            "fitted feature encoder"
        );
        Ok(encoder)
    }

    fn fit_numeric(&self, df: &DataFrame, name: &str) -> Result<NumericFeature> {
        let values = numeric_values_strict(column(df, name)?)?;
        let fill = self.config.numeric_impute_strategy.numeric_fill(&values).unwrap_or_else(|| {
            warn!(column = name, "numeric column has no values, filling with 0");
            0.0
        });

        let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(fill)).collect();
        let scaler = ScalerParams::fit(self.config.scaler_type, &imputed);
        debug!(column = name, fill, center = scaler.center, scale = scaler.scale, "numeric feature");

        Ok(NumericFeature {
            name: name.to_string(),
            fill,
            scaler,
        })
    }

    fn fit_categorical(&self, df: &DataFrame, name: &str) -> Result<CategoricalFeature> {
        let fill = self.config.categorical_sentinel.clone();
        let levels: BTreeSet<String> = category_keys(column(df, name)?)?
            .into_iter()
            .map(|v| match v {
                Some(key) if self.config.normalize_categories => normalize_text(&key),
                Some(key) => key,
                None => fill.clone(),
            })
            .collect();
        debug!(column = name, levels = levels.len(), "categorical feature");

        Ok(CategoricalFeature {
            name: name.to_string(),
            fill,
            levels: levels.into_iter().collect(),
        })
    }

    fn fit_binary(&self, df: &DataFrame, name: &str) -> Result<BinaryFeature> {
        let values = binary_values(column(df, name)?)?;
        let fill = self.config.binary_impute_strategy.numeric_fill(&values).unwrap_or_else(|| {
            warn!(column = name, "binary column has no values, filling with 0");
            0.0
        });

        Ok(BinaryFeature {
            name: name.to_string(),
            fill,
        })
    }
}

/// Fitted encoder state. Immutable: every method takes `&self`.
///
/// Deserialization re-checks the layout, so a persisted state whose levels
/// or feature names disagree is rejected instead of loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EncoderState")]
pub struct FittedEncoder {
    config: EncoderConfig,
    numeric: Vec<NumericFeature>,
    categorical: Vec<CategoricalFeature>,
    binary: Vec<BinaryFeature>,
    feature_names: Vec<String>,
    n_samples_seen: usize,
}

impl FittedEncoder {
    fn new(
        config: EncoderConfig,
        numeric: Vec<NumericFeature>,
        categorical: Vec<CategoricalFeature>,
        binary: Vec<BinaryFeature>,
        n_samples_seen: usize,
    ) -> Self {
        let mut feature_names: Vec<String> = numeric.iter().map(|f| f.name.clone()).collect();
        for feature in &categorical {
            feature_names.extend(feature.levels.iter().map(|level| format!("{}_{}", feature.name, level)));
        }
        feature_names.extend(binary.iter().map(|f| f.name.clone()));

        Self {
            config,
            numeric,
            categorical,
            binary,
            feature_names,
            n_samples_seen,
        }
    }

    /// Encode a table with the fitted statistics.
    ///
    /// Fails with [`ImmoError::MissingColumns`] naming every absent input
    /// column. Categories not seen during fit encode as all zeros.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        check_columns(df, &self.input_columns())?;

        let rows = df.height();
        let mut out = Array2::<f64>::zeros((rows, self.output_width()));
        let mut offset = 0;

        for feature in &self.numeric {
            let values = numeric_values_strict(column(df, &feature.name)?)?;
            for (row, v) in values.into_iter().enumerate() {
                out[[row, offset]] = feature.scaler.scale(v.unwrap_or(feature.fill));
            }
            offset += 1;
        }

        for feature in &self.categorical {
            let keys = category_keys(column(df, &feature.name)?)?;
            for (row, key) in keys.into_iter().enumerate() {
                let key = match key {
                    Some(k) if self.config.normalize_categories => normalize_text(&k),
                    Some(k) => k,
                    None => feature.fill.clone(),
                };
                if let Ok(idx) = feature.levels.binary_search(&key) {
                    out[[row, offset + idx]] = 1.0;
                }
            }
            offset += feature.levels.len();
        }

        for feature in &self.binary {
            let values = binary_values(column(df, &feature.name)?)?;
            for (row, v) in values.into_iter().enumerate() {
                out[[row, offset]] = v.unwrap_or(feature.fill);
            }
            offset += 1;
        }

        Ok(out)
    }

    /// Names of the encoded output columns, in output order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn output_width(&self) -> usize {
        self.feature_names.len()
    }

    pub fn groups(&self) -> FeatureGroups {
        FeatureGroups {
            numeric: self.numeric.iter().map(|f| f.name.clone()).collect(),
            categorical: self.categorical.iter().map(|f| f.name.clone()).collect(),
            binary: self.binary.iter().map(|f| f.name.clone()).collect(),
        }
    }

    /// Input columns in fitted order
    pub fn input_columns(&self) -> Vec<String> {
        self.groups().input_columns()
    }

    /// Observed levels of a categorical feature
    pub fn levels(&self, name: &str) -> Option<&[String]> {
        self.categorical
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.levels.as_slice())
    }

    pub fn categorical_sentinel(&self) -> &str {
        &self.config.categorical_sentinel
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }
}

/// Persisted form of [`FittedEncoder`], checked before use
#[derive(Deserialize)]
struct EncoderState {
    config: EncoderConfig,
    numeric: Vec<NumericFeature>,
    categorical: Vec<CategoricalFeature>,
    binary: Vec<BinaryFeature>,
    feature_names: Vec<String>,
    n_samples_seen: usize,
}

impl TryFrom<EncoderState> for FittedEncoder {
    type Error = ImmoError;

    fn try_from(state: EncoderState) -> Result<Self> {
        for feature in &state.numeric {
            let ScalerParams { center, scale } = feature.scaler;
            if !feature.fill.is_finite() || !center.is_finite() || !scale.is_finite() || scale == 0.0 {
                return Err(ImmoError::ConfigError(format!(
                    "numeric feature '{}' has invalid fill or scaling",
                    feature.name
                )));
            }
        }
        for feature in &state.categorical {
            if feature.levels.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ImmoError::ConfigError(format!(
                    "levels of '{}' are not sorted and distinct",
                    feature.name
                )));
            }
        }
        if let Some(feature) = state.binary.iter().find(|f| !f.fill.is_finite()) {
            return Err(ImmoError::ConfigError(format!(
                "binary feature '{}' has fill {}",
                feature.name, feature.fill
            )));
        }

        let encoder = FittedEncoder::new(
            state.config,
            state.numeric,
            state.categorical,
            state.binary,
            state.n_samples_seen,
        );
        encoder.groups().validate()?;
        if encoder.feature_names != state.feature_names {
            return Err(ImmoError::ConfigError(format!(
                "encoder lists {} feature names but its levels produce {}",
                state.feature_names.len(),
                encoder.feature_names.len()
            )));
        }
        Ok(encoder)
    }
}

fn check_columns(df: &DataFrame, required: &[String]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| df.column(name).is_err())
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImmoError::MissingColumns(missing))
    }
}

/// Binary flags as 0/1. Blank and null read as missing, any other value that
/// is not a flag is an input error.
fn binary_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let flags = numeric_values(&convert_boolean(series)?)?;
    let raw = text_values(series)?;

    flags
        .into_iter()
        .zip(raw)
        .map(|(flag, raw)| match (flag, raw) {
            (Some(v), _) => Ok(Some(v)),
            (None, Some(s)) if !s.trim().is_empty() => Err(ImmoError::InvalidInput(format!(
                "column '{}': value '{}' is not a 0/1 flag",
                series.name(),
                s
            ))),
            _ => Ok(None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::ScalerType;

    fn training_df() -> DataFrame {
        df!(
            "sq_mt_built" => &[Some(60.0), Some(80.0), None, Some(100.0)],
            "neighborhood" => &[Some(55i64), Some(12), Some(55), None],
            "has_lift" => &[Some(1i64), None, Some(1), Some(0)],
        )
        .unwrap()
    }

    fn groups() -> FeatureGroups {
        FeatureGroups::new(["sq_mt_built"], ["neighborhood"], ["has_lift"])
    }

    #[test]
    fn test_fit_layout() {
        let encoder = FeatureEncoder::default().fit(&training_df(), &groups()).unwrap();
        assert_eq!(
            encoder.feature_names(),
            &["sq_mt_built", "neighborhood_12", "neighborhood_55", "neighborhood_unknown", "has_lift"]
        );
        assert_eq!(encoder.output_width(), 5);
        assert_eq!(encoder.n_samples_seen(), 4);
        assert_eq!(encoder.levels("neighborhood").unwrap().len(), 3);
    }

    #[test]
    fn test_transform_imputes_and_scales() {
        let df = training_df();
        let encoder = FeatureEncoder::default().fit(&df, &groups()).unwrap();
        let out = encoder.transform(&df).unwrap();

        assert_eq!(out.shape(), &[4, 5]);
        // median fill of [60, 80, 100] is 80, and the imputed column has mean 80
        assert!(out[[2, 0]].abs() < 1e-12);
        let col_mean: f64 = out.column(0).sum() / 4.0;
        assert!(col_mean.abs() < 1e-12);

        // one-hot rows
        assert_eq!(&out.row(0).to_vec()[1..4], &[0.0, 1.0, 0.0]);
        assert_eq!(&out.row(3).to_vec()[1..4], &[0.0, 0.0, 1.0]);

        // binary: most frequent of [1, 1, 0] fills the gap
        assert_eq!(out[[1, 4]], 1.0);
        assert_eq!(out[[3, 4]], 0.0);
    }

    #[test]
    fn test_unseen_category_is_all_zero() {
        let encoder = FeatureEncoder::default().fit(&training_df(), &groups()).unwrap();
        let df = df!(
            "sq_mt_built" => &[70.0],
            "neighborhood" => &[9999i64],
            "has_lift" => &[0i64],
        )
        .unwrap();
        let out = encoder.transform(&df).unwrap();
        assert_eq!(out.shape(), &[1, 5]);
        assert_eq!(&out.row(0).to_vec()[1..4], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_category_spelling_does_not_matter() {
        let encoder = FeatureEncoder::default().fit(&training_df(), &groups()).unwrap();
        let df = df!(
            "sq_mt_built" => &[70.0],
            "neighborhood" => &["55"],
            "has_lift" => &["true"],
        )
        .unwrap();
        let out = encoder.transform(&df).unwrap();
        assert_eq!(out[[0, 2]], 1.0);
        assert_eq!(out[[0, 4]], 1.0);
    }

    #[test]
    fn test_missing_columns_are_listed() {
        let encoder = FeatureEncoder::default().fit(&training_df(), &groups()).unwrap();
        let df = df!("sq_mt_built" => &[70.0]).unwrap();
        match encoder.transform(&df) {
            Err(ImmoError::MissingColumns(cols)) => assert_eq!(cols, vec!["neighborhood", "has_lift"]),
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let encoder = FeatureEncoder::default().fit(&training_df(), &groups()).unwrap();
        let df = df!(
            "sq_mt_built" => &["big"],
            "neighborhood" => &["55"],
            "has_lift" => &["1"],
        )
        .unwrap();
        assert!(matches!(encoder.transform(&df), Err(ImmoError::InvalidInput(_))));
    }

    #[test]
    fn test_non_flag_binary_value_rejected() {
        let encoder = FeatureEncoder::default().fit(&training_df(), &groups()).unwrap();
        let df = df!(
            "sq_mt_built" => &[70.0, 80.0],
            "neighborhood" => &[55i64, 12],
            "has_lift" => &[1i64, 7],
        )
        .unwrap();
        match encoder.transform(&df) {
            Err(ImmoError::InvalidInput(msg)) => assert!(msg.contains("has_lift") && msg.contains('7')),
            other => panic!("expected invalid input, got {other:?}"),
        }

        let text = df!(
            "sq_mt_built" => &[70.0, 80.0],
            "neighborhood" => &[55i64, 12],
            "has_lift" => &[Some("yes please"), None],
        )
        .unwrap();
        assert!(matches!(encoder.transform(&text), Err(ImmoError::InvalidInput(_))));

        let blank = df!(
            "sq_mt_built" => &[70.0, 80.0],
            "neighborhood" => &[55i64, 12],
            "has_lift" => &[Some(" "), Some("false")],
        )
        .unwrap();
        let out = encoder.transform(&blank).unwrap();
        assert_eq!(out[[0, 4]], 1.0);
        assert_eq!(out[[1, 4]], 0.0);
    }

    #[test]
    fn test_normalized_categories() {
        let df = df!(
            "sq_mt_built" => &[50.0, 60.0],
            "district" => &["Chamberí", "RETIRO"],
            "has_lift" => &[true, false],
        )
        .unwrap();
        let groups = FeatureGroups::new(["sq_mt_built"], ["district"], ["has_lift"]);
        let config = EncoderConfig::default()
            .with_normalized_categories(true)
            .with_scaler(ScalerType::None);
        let encoder = FeatureEncoder::new(config).fit(&df, &groups).unwrap();
        assert_eq!(encoder.levels("district").unwrap(), &["chamberi", "retiro"]);

        let query = df!(
            "sq_mt_built" => &[55.0],
            "district" => &["chamberi"],
            "has_lift" => &[true],
        )
        .unwrap();
        let out = encoder.transform(&query).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![55.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_overlapping_groups_rejected() {
        let groups = FeatureGroups::new(["a", "b"], ["b"], Vec::<&str>::new());
        assert!(matches!(groups.validate(), Err(ImmoError::ConfigError(_))));
        assert!(FeatureGroups::default().validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let encoder = FeatureEncoder::default().fit(&training_df(), &groups()).unwrap();
        let json = serde_json::to_string(&encoder).unwrap();
        let back: FittedEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encoder);
    }

    #[test]
    fn test_inconsistent_state_rejected() {
        let encoder = FeatureEncoder::default().fit(&training_df(), &groups()).unwrap();
        let state = serde_json::to_value(&encoder).unwrap();

        let mut extra_level = state.clone();
        extra_level["categorical"][0]["levels"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!("zz"));
        let err = serde_json::from_value::<FittedEncoder>(extra_level).unwrap_err();
        assert!(err.to_string().contains("feature names"));

        let mut unsorted = state.clone();
        unsorted["categorical"][0]["levels"] = serde_json::json!(["55", "12", "unknown"]);
        unsorted["feature_names"] =
            serde_json::json!(["sq_mt_built", "neighborhood_55", "neighborhood_12", "neighborhood_unknown", "has_lift"]);
        assert!(serde_json::from_value::<FittedEncoder>(unsorted).is_err());

        let mut zero_scale = state;
        zero_scale["numeric"][0]["scaler"]["scale"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<FittedEncoder>(zero_scale).is_err());
    }
}
