//! Application state management

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::artifacts::{ArtifactStore, ModelConfig, MODEL_CONFIG_FILE};
use crate::inference::PredictionService;

use super::ServerConfig;

/// Application state shared across handlers. Built once at startup and
/// never reassigned.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    service: Option<Arc<PredictionService>>,
    model_config: Option<ModelConfig>,
    load_error: Option<String>,
}

impl AppState {
    /// Load the model directory named by the server config. Failures leave
    /// the state degraded instead of aborting startup.
    pub fn load(config: ServerConfig) -> Self {
        let dir = Path::new(&config.models_dir);
        let store = ArtifactStore::new(dir);

        let model_config = match store.load_json::<ModelConfig>(MODEL_CONFIG_FILE) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %e, "model config unavailable");
                None
            }
        };

        match PredictionService::load(dir) {
            Ok(service) => {
                info!(models_dir = %config.models_dir, "model loaded");
                Self {
                    config,
                    model_config: Some(service.config().clone()),
                    service: Some(Arc::new(service)),
                    load_error: None,
                }
            }
            Err(e) => {
                error!(models_dir = %config.models_dir, error = %e, "model failed to load, serving in degraded mode");
                Self {
                    config,
                    service: None,
                    model_config,
                    load_error: Some(e.to_string()),
                }
            }
        }
    }

    /// State around an already constructed service
    pub fn with_service(config: ServerConfig, service: PredictionService) -> Self {
        Self {
            config,
            model_config: Some(service.config().clone()),
            service: Some(Arc::new(service)),
            load_error: None,
        }
    }

    /// State with no model, reporting `reason` on every request
    pub fn degraded(config: ServerConfig, reason: impl Into<String>) -> Self {
        Self {
            config,
            service: None,
            model_config: None,
            load_error: Some(reason.into()),
        }
    }

    pub fn service(&self) -> Option<&Arc<PredictionService>> {
        self.service.as_ref()
    }

    pub fn model_config(&self) -> Option<&ModelConfig> {
        self.model_config.as_ref()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.service.is_some()
    }
}
