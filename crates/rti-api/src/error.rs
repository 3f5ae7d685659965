use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rti_chain::GatewayError;
use rti_core::{LifecycleError, ValidationError};
use rti_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Everything a handler can fail with, rendered as `{"success": false, "error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Malformed request bodies and other input the extractors refuse.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Conflict(#[from] LifecycleError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound("RTI not found"),
            other => Self::Store(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Store(e) => error!(error = %e, "record store failure"),
            Self::Gateway(e) => warn!(error = %e, "contract gateway failure"),
            _ => {}
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
