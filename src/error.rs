use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::model::ModelKind;

#[derive(Debug, Error)]
pub enum GlineError {
    #[error("unsupported platform: {os}/{arch}")]
    PlatformUnsupported { os: String, arch: String },
    #[error("library initialization failed: {0}")]
    LibraryInit(String),
    #[error("library not initialized")]
    NotInitialized,
    #[error("failed to create {0} model")]
    ModelCreation(ModelKind),
    #[error("model is closed")]
    ModelClosed,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} inference failed")]
    InferenceFailed(ModelKind),
    #[error("inference did not finish within {0:?}")]
    InferenceTimeout(Duration),
    #[error("inference worker failed: {0}")]
    Worker(String),
    #[error("model {model_id} is not compatible: {reason}")]
    IncompatibleModel { model_id: String, reason: String },
    #[error("model download failed: {0}")]
    Download(String),
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for GlineError {
    fn into_response(self) -> Response {
        let status = match self {
            GlineError::BadRequest(_) | GlineError::Validation(_) => StatusCode::BAD_REQUEST,
            GlineError::ModelClosed | GlineError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            GlineError::InferenceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GlineError::IncompatibleModel { .. } | GlineError::Download(_) => {
                StatusCode::BAD_GATEWAY
            }
            GlineError::PlatformUnsupported { .. }
            | GlineError::LibraryInit(_)
            | GlineError::ModelCreation(_)
            | GlineError::InferenceFailed(_)
            | GlineError::Worker(_)
            | GlineError::Io(_)
            | GlineError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
