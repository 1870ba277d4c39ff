//! Prediction server
//!
//! Thin HTTP layer over [`PredictionService`](crate::inference::PredictionService).
//! The model directory is loaded once at startup; if it cannot be loaded the
//! server still starts, reports `degraded` on `/health` and refuses
//! predictions.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::HealthResponse;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub models_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            models_dir: "./models".to_string(),
        }
    }
}

impl ServerConfig {
    /// Read `API_HOST`, `API_PORT` and `MODELS_DIR`, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            models_dir: std::env::var("MODELS_DIR").unwrap_or(defaults.models_dir),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<String>) -> Self {
        self.models_dir = dir.into();
        self
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = Arc::new(AppState::load(config.clone()));
    if !state.is_ready() {
        warn!(models_dir = %config.models_dir, "starting without a model");
    }
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        models_dir = %config.models_dir,
        pid = std::process::id(),
        "immopredict server listening"
    );

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.models_dir, "./models");
    }

    #[test]
    fn test_builders() {
        let config = ServerConfig::default().with_port(9000).with_models_dir("/tmp/m");
        assert_eq!(config.port, 9000);
        assert_eq!(config.models_dir, "/tmp/m");
    }
}
