//! Fit phase
//!
//! Offline batch step run once per model: reads the aligned train/test
//! splits, fits the feature encoder on the training features, computes the
//! column descriptors and forward-transforms the target. The resulting
//! artifacts are what the prediction service loads at startup.

pub mod metrics;

pub use metrics::{evaluate, EvaluationReport, RegressionMetrics};

use crate::artifacts::{ArtifactStore, FeatureSchema, ModelArtifacts, ModelConfig};
use crate::error::{ImmoError, Result};
use crate::preprocessing::values::{column, numeric_values};
use crate::preprocessing::{
    partition_columns, ColumnDescriptor, EncoderConfig, FeatureEncoder, FeatureGroups, SemanticType,
};
use crate::target::TargetTransform;
use crate::utils::{load_data, write_csv};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Default target column name when a target table has a single column
pub const DEFAULT_TARGET: &str = "buy_price";

/// Locations of the four split tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingPaths {
    pub x_train: PathBuf,
    pub y_train: PathBuf,
    pub x_test: PathBuf,
    pub y_test: PathBuf,
}

impl TrainingPaths {
    /// `X_train.csv`, `y_train.csv`, `X_test.csv` and `y_test.csv` in `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            x_train: dir.join("X_train.csv"),
            y_train: dir.join("y_train.csv"),
            x_test: dir.join("X_test.csv"),
            y_test: dir.join("y_test.csv"),
        }
    }
}

/// Aligned training and test splits
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub x_train: DataFrame,
    pub y_train: Vec<f64>,
    pub x_test: DataFrame,
    pub y_test: Vec<f64>,
    pub target: String,
}

impl TrainingData {
    /// Build from feature tables and target tables. Each target table is
    /// squeezed to `target`, or to its only column.
    pub fn new(
        x_train: DataFrame,
        y_train: &DataFrame,
        x_test: DataFrame,
        y_test: &DataFrame,
        target: Option<&str>,
    ) -> Result<Self> {
        let (name, y_train) = squeeze_target(y_train, target)?;
        let (_, y_test) = squeeze_target(y_test, Some(&name))?;

        let data = Self {
            x_train,
            y_train,
            x_test,
            y_test,
            target: name,
        };
        data.check_alignment()?;
        Ok(data)
    }

    /// Read the four tables (CSV, JSON or Parquet)
    pub fn load(paths: &TrainingPaths, target: Option<&str>) -> Result<Self> {
        let start = Instant::now();
        let data = Self::new(
            load_data(&paths.x_train)?,
            &load_data(&paths.y_train)?,
            load_data(&paths.x_test)?,
            &load_data(&paths.y_test)?,
            target,
        )?;
        info!(
            train_rows = data.x_train.height(),
            test_rows = data.x_test.height(),
            columns = data.x_train.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded training data"
        );
        Ok(data)
    }

    fn check_alignment(&self) -> Result<()> {
        for (split, x, y) in [
            ("train", &self.x_train, &self.y_train),
            ("test", &self.x_test, &self.y_test),
        ] {
            if x.height() != y.len() {
                return Err(ImmoError::ShapeError {
                    expected: format!("{} {} targets", x.height(), split),
                    actual: format!("{} {} targets", y.len(), split),
                });
            }
        }
        Ok(())
    }
}

fn squeeze_target(df: &DataFrame, target: Option<&str>) -> Result<(String, Vec<f64>)> {
    let name = match target {
        Some(name) => name.to_string(),
        None if df.width() == 1 => df.get_column_names()[0].to_string(),
        None => {
            return Err(ImmoError::DataError(format!(
                "target table has {} columns, name the target column",
                df.width()
            )))
        }
    };

    let values = numeric_values(column(df, &name)?)?;
    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        return Err(ImmoError::DataError(format!(
            "target column '{name}' has {missing} missing or non-numeric value(s)"
        )));
    }
    Ok((name, values.into_iter().flatten().collect()))
}

/// Options of the fit phase
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitConfig {
    /// Input columns to keep; all columns when absent
    pub features: Option<Vec<String>>,
    /// Explicit feature groups; derived from column types when absent
    pub groups: Option<FeatureGroups>,
    pub encoder: EncoderConfig,
    pub target_transform: TargetTransform,
}

impl FitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.features = Some(features.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_groups(mut self, groups: FeatureGroups) -> Self {
        self.groups = Some(groups);
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_target_transform(mut self, transform: TargetTransform) -> Self {
        self.target_transform = transform;
        self
    }
}

/// Summary of a fit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub input_columns: Vec<String>,
    pub encoded_width: usize,
    pub feature_names: Vec<String>,
    pub target: String,
    pub target_transform: TargetTransform,
    /// Min and max of the transformed training target
    pub target_range: (f64, f64),
    pub elapsed_secs: f64,
}

/// Artifacts of a fit run plus the encoded splits
#[derive(Debug, Clone)]
pub struct FittedArtifacts {
    pub artifacts: ModelArtifacts,
    pub x_train: Array2<f64>,
    /// Forward-transformed
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    /// Forward-transformed
    pub y_test: Array1<f64>,
    pub report: FitReport,
}

impl FittedArtifacts {
    /// Write config, encoder and feature schema to the store
    pub fn save(&self, store: &ArtifactStore) -> Result<()> {
        self.artifacts.save(store)
    }

    /// Write the encoded training matrix with the transformed target as the
    /// last column, for an external model trainer.
    pub fn export_training_matrix(&self, path: impl AsRef<Path>) -> Result<()> {
        let names = self.artifacts.encoder.feature_names();
        let mut columns: Vec<Column> = names
            .iter()
            .zip(self.x_train.columns())
            .map(|(name, values)| Series::new(name.as_str().into(), values.to_vec()).into())
            .collect();
        let target = self.report.target.as_str();
        columns.push(Series::new(target.into(), self.y_train.to_vec()).into());

        let df = DataFrame::new(columns)?;
        write_csv(&df, path.as_ref())?;
        info!(path = %path.as_ref().display(), rows = df.height(), columns = df.width(), "exported training matrix");
        Ok(())
    }
}

/// Run the fit phase over the training data
pub fn fit_artifacts(data: &TrainingData, config: &FitConfig) -> Result<FittedArtifacts> {
    let start = Instant::now();

    let (x_train, x_test) = match &config.features {
        Some(features) => (select(&data.x_train, features)?, select(&data.x_test, features)?),
        None => (data.x_train.clone(), data.x_test.clone()),
    };

    let groups = match &config.groups {
        Some(groups) => groups.clone(),
        None => {
            let derived = FeatureGroups::from_partition(&partition_columns(&x_train));
            info!(
                numeric = ?derived.numeric,
                categorical = ?derived.categorical,
                binary = ?derived.binary,
                "derived feature groups"
            );
            derived
        }
    };

    let unused: Vec<&str> = x_train
        .get_column_names()
        .into_iter()
        .map(|n| n.as_str())
        .filter(|n| groups.role_of(n).is_none())
        .collect();
    if !unused.is_empty() {
        warn!(columns = ?unused, "columns outside the feature groups are ignored");
    }

    let encoder = FeatureEncoder::new(config.encoder.clone()).fit(&x_train, &groups)?;
    let x_train_encoded = encoder.transform(&x_train)?;
    let x_test_encoded = encoder.transform(&x_test)?;

    let transform = config.target_transform;
    let y_train = Array1::from(transform.forward_all(&data.y_train)?);
    let y_test = Array1::from(transform.forward_all(&data.y_test)?);
    let target_range = y_train
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

    let schema = FeatureSchema {
        features: groups
            .input_columns()
            .iter()
            .map(|name| {
                let role = groups.role_of(name).unwrap_or(SemanticType::Categorical);
                ColumnDescriptor::from_series(column(&x_train, name)?, role)
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let model_config = ModelConfig::new(groups, data.target.clone(), transform);

    let report = FitReport {
        train_rows: x_train.height(),
        test_rows: x_test.height(),
        input_columns: model_config.input_columns.clone(),
        encoded_width: encoder.output_width(),
        feature_names: encoder.feature_names().to_vec(),
        target: data.target.clone(),
        target_transform: transform,
        target_range,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };

    info!(
        train_rows = report.train_rows,
        test_rows = report.test_rows,
        width = report.encoded_width,
        transform = %transform,
        elapsed_secs = report.elapsed_secs,
        "fit phase complete"
    );

    Ok(FittedArtifacts {
        artifacts: ModelArtifacts {
            config: model_config,
            encoder,
            schema,
        },
        x_train: x_train_encoded,
        y_train,
        x_test: x_test_encoded,
        y_test,
        report,
    })
}

fn select(df: &DataFrame, features: &[String]) -> Result<DataFrame> {
    let missing: Vec<String> = features
        .iter()
        .filter(|f| df.column(f).is_err())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ImmoError::MissingColumns(missing));
    }
    Ok(df.select(features.iter().map(String::as_str))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split() -> TrainingData {
        let x_train = df!(
            "sq_mt_built" => &[60.0, 80.0, 100.0, 120.0],
            "neighborhood" => &["55", "12", "55", "7"],
            "has_lift" => &[1i64, 0, 1, 1],
            "title" => &["a", "b", "c", "d"],
        )
        .unwrap();
        let y_train = df!("buy_price" => &[150_000.0, 210_000.0, 260_000.0, 330_000.0]).unwrap();
        let x_test = df!(
            "sq_mt_built" => &[90.0],
            "neighborhood" => &["9999"],
            "has_lift" => &[0i64],
            "title" => &["e"],
        )
        .unwrap();
        let y_test = df!("buy_price" => &[240_000.0]).unwrap();
        TrainingData::new(x_train, &y_train, x_test, &y_test, None).unwrap()
    }

    #[test]
    fn test_fit_with_selected_features() {
        let data = split();
        assert_eq!(data.target, "buy_price");

        let config = FitConfig::new().with_features(["sq_mt_built", "neighborhood", "has_lift"]);
        let fitted = fit_artifacts(&data, &config).unwrap();

        assert_eq!(fitted.report.input_columns, vec!["sq_mt_built", "neighborhood", "has_lift"]);
        // 1 numeric + 3 levels + 1 binary
        assert_eq!(fitted.report.encoded_width, 5);
        assert_eq!(fitted.x_train.shape(), &[4, 5]);
        assert_eq!(fitted.x_test.shape(), &[1, 5]);
        assert!((fitted.y_train[0] - 150_000f64.ln_1p()).abs() < 1e-12);
        assert_eq!(fitted.artifacts.schema.features.len(), 3);
        assert_eq!(
            fitted.artifacts.schema.get("neighborhood").unwrap().levels,
            Some(vec!["12".to_string(), "55".to_string(), "7".to_string()])
        );
    }

    #[test]
    fn test_misaligned_split_rejected() {
        let x = df!("a" => &[1.0, 2.0]).unwrap();
        let y = df!("buy_price" => &[1.0]).unwrap();
        let err = TrainingData::new(x.clone(), &y, x, &y, None).unwrap_err();
        assert!(matches!(err, ImmoError::ShapeError { .. }));
    }

    #[test]
    fn test_non_positive_target_rejected_by_log() {
        let data = split();
        let mut data = data;
        data.y_train[0] = 0.0;
        let config = FitConfig::new()
            .with_features(["sq_mt_built"])
            .with_target_transform(TargetTransform::Log);
        assert!(matches!(fit_artifacts(&data, &config), Err(ImmoError::InvalidTarget { .. })));
    }

    #[test]
    fn test_missing_feature_is_reported() {
        let config = FitConfig::new().with_features(["sq_mt_built", "n_rooms"]);
        match fit_artifacts(&split(), &config) {
            Err(ImmoError::MissingColumns(cols)) => assert_eq!(cols, vec!["n_rooms"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wide_target_needs_a_name() {
        let y = df!("a" => &[1.0], "b" => &[2.0]).unwrap();
        assert!(squeeze_target(&y, None).is_err());
        assert_eq!(squeeze_target(&y, Some("b")).unwrap().1, vec![2.0]);
    }
}
