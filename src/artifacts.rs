//! Model directory artifacts
//!
//! A model directory holds four JSON files written by the fit phase and read
//! once by the serving process:
//!
//! | file                  | contents                                        |
//! |-----------------------|-------------------------------------------------|
//! | `model_config.json`   | input columns, feature groups, target pairing   |
//! | `encoder.json`        | fitted encoder state                            |
//! | `feature_schema.json` | column descriptors for the form client          |
//! | `model.json`          | predictor parameters                            |
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so readers never see a partial file.

use crate::error::{ImmoError, Result};
use crate::preprocessing::{ColumnDescriptor, FeatureGroups, FittedEncoder};
use crate::target::TargetTransform;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MODEL_CONFIG_FILE: &str = "model_config.json";
pub const ENCODER_FILE: &str = "encoder.json";
pub const FEATURE_SCHEMA_FILE: &str = "feature_schema.json";
pub const MODEL_FILE: &str = "model.json";

/// Configuration record saved alongside the fitted encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Ordered input columns expected at inference time
    pub input_columns: Vec<String>,
    pub groups: FeatureGroups,
    /// Name of the predicted column
    pub target: String,
    /// Recorded forward/inverse pairing
    pub target_transform: TargetTransform,
    pub fitted_at: DateTime<Utc>,
    /// Crate version that wrote the artifacts
    pub version: String,
}

impl ModelConfig {
    pub fn new(groups: FeatureGroups, target: impl Into<String>, target_transform: TargetTransform) -> Self {
        Self {
            input_columns: groups.input_columns(),
            groups,
            target: target.into(),
            target_transform,
            fitted_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Input columns and feature groups must describe the same columns
    pub fn validate(&self) -> Result<()> {
        self.groups.validate()?;

        let declared: BTreeSet<&str> = self.input_columns.iter().map(String::as_str).collect();
        let grouped: BTreeSet<String> = self.groups.input_columns().into_iter().collect();
        let grouped: BTreeSet<&str> = grouped.iter().map(String::as_str).collect();

        if declared.len() != self.input_columns.len() || declared != grouped {
            return Err(ImmoError::ConfigError(
                "input columns do not match the feature groups".to_string(),
            ));
        }
        Ok(())
    }
}

/// Column descriptors of the training table, for building input forms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<ColumnDescriptor>,
}

impl FeatureSchema {
    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.features.iter().find(|d| d.name == name)
    }
}

/// JSON artifact directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Serialize `value` to `name`, atomically replacing any previous file
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let content = serde_json::to_string_pretty(value)?;

        let tmp = self.dir.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()));
        if let Err(e) = std::fs::write(&tmp, &content).and_then(|_| std::fs::rename(&tmp, &path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
        Ok(path)
    }

    /// Read `name`. A missing file is [`ImmoError::ArtifactMissing`]; an
    /// unparseable one is a configuration error.
    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ImmoError::ArtifactMissing(path)),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map_err(|e| ImmoError::ConfigError(format!("{}: {}", path.display(), e)))
    }
}

/// The preprocessing artifacts of one fitted model
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub config: ModelConfig,
    pub encoder: FittedEncoder,
    pub schema: FeatureSchema,
}

impl ModelArtifacts {
    /// Write config, encoder and schema
    pub fn save(&self, store: &ArtifactStore) -> Result<()> {
        store.save_json(ENCODER_FILE, &self.encoder)?;
        store.save_json(FEATURE_SCHEMA_FILE, &self.schema)?;
        // Written last: its presence marks a complete set.
        store.save_json(MODEL_CONFIG_FILE, &self.config)?;
        info!(dir = %store.dir().display(), "saved model artifacts");
        Ok(())
    }

    /// Load and cross-check config, encoder and schema. The schema is
    /// optional and defaults to empty.
    pub fn load(store: &ArtifactStore) -> Result<Self> {
        let config: ModelConfig = store.load_json(MODEL_CONFIG_FILE)?;
        config.validate()?;
        let encoder: FittedEncoder = store.load_json(ENCODER_FILE)?;

        if encoder.input_columns() != config.groups.input_columns() {
            return Err(ImmoError::ConfigError(format!(
                "{} and {} describe different feature groups",
                ENCODER_FILE, MODEL_CONFIG_FILE
            )));
        }

        let schema = match store.load_json(FEATURE_SCHEMA_FILE) {
            Ok(schema) => schema,
            Err(ImmoError::ArtifactMissing(_)) => FeatureSchema::default(),
            Err(e) => return Err(e),
        };

        info!(
            dir = %store.dir().display(),
            inputs = config.input_columns.len(),
            width = encoder.output_width(),
            transform = %config.target_transform,
            "loaded model artifacts"
        );
        Ok(Self { config, encoder, schema })
    }
}
