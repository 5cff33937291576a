//! Mapping of [`ReaderError`] onto the `{success: false, message, data}`
//! envelope.

use crate::error::ReaderError;
use crate::model::ApiEnvelope;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, warn};

/// An error answer of the HTTP API.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub data: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: json!({}),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

impl From<ReaderError> for ApiError {
    fn from(e: ReaderError) -> Self {
        let status = match &e {
            ReaderError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            ReaderError::InvalidInput { .. }
            | ReaderError::UnsupportedFileType { .. }
            | ReaderError::NotAPdf { .. }
            | ReaderError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %e, "Request failed");
        } else {
            warn!(error = %e, "Request rejected");
        }
        Self::new(status, e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiEnvelope {
            success: false,
            message: self.message,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Result type of every JSON handler.
pub type ApiResult<T> = Result<Json<ApiEnvelope<T>>, ApiError>;

/// Successful envelope.
pub fn ok<T>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(Json(ApiEnvelope::ok(message, data)))
}
