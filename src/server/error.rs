//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::error::{ErrorKind, ImmoError};
use crate::inference::PredictionResponse;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Core(#[from] ImmoError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Core(e) => match e.kind() {
                ErrorKind::InputValidation | ErrorKind::Data => StatusCode::BAD_REQUEST,
                ErrorKind::NumericInvalidity => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Configuration => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Core(e) if e.kind() == ErrorKind::Io => {
                tracing::error!(detail = %e, "IO error");
                "A file system error occurred".to_string()
            }
            ServerError::Core(e) => {
                tracing::warn!(detail = %e, kind = ?e.kind(), "request failed");
                e.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(PredictionResponse::error(message))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
