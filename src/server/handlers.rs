//! HTTP request handlers

use std::sync::Arc;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::artifacts::FeatureSchema;
use crate::inference::{FeatureRecord, PredictionResponse};

use super::error::{Result, ServerError};
use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub model_loaded: bool,
    pub config_loaded: bool,
    pub version: &'static str,
}

/// Liveness plus model status; served on `/` and `/health`
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ready = state.is_ready();
    Json(HealthResponse {
        status: if ready { "ok" } else { "degraded" },
        reason: state.load_error().map(str::to_string),
        model_loaded: ready,
        config_loaded: state.model_config().is_some(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Feature schema for building input forms
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Result<Json<FeatureSchema>> {
    let service = state
        .service()
        .ok_or_else(|| ServerError::Unavailable(degraded_reason(&state)))?;
    Ok(Json(service.schema().clone()))
}

/// Predict the price of one listing
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<FeatureRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let service = state
        .service()
        .ok_or_else(|| ServerError::Unavailable(degraded_reason(&state)))?;
    let Json(record) = payload?;

    let result = service.predict(&record)?;
    let raw = result.raw_output;
    let price = result.into_price()?;

    info!(features = record.len(), prediction = price, "prediction served");
    Ok(Json(PredictionResponse::success(price, raw)))
}

fn degraded_reason(state: &AppState) -> String {
    match state.load_error() {
        Some(reason) => format!("model not loaded: {}", reason),
        None => "model not loaded".to_string(),
    }
}
