//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use gpt4all_local::ModelError;

/// Errors a handler can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range request fields.
    #[error("{0}")]
    InvalidRequest(String),
    /// The model could not be loaded.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    /// The model was loaded but inference failed.
    #[error("Error generating response: {0}")]
    GenerationFailed(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GenerationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Unavailable(e) => ApiError::ModelUnavailable(e.to_string()),
            ModelError::Generation(e) => ApiError::GenerationFailed(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
