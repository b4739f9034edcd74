//! JSON body for failed read requests

use crate::error::{AppError, ErrorCode};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
    pub message: String,
    /// Same value as the `x-request-id` response header
    pub request_id: Option<String>,
    pub timestamp: String,
    pub retryable: bool,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            retryable: error.is_retryable(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                error = ?self.kind,
                request_id = ?self.request_id,
                status = status.as_u16(),
                "request failed"
            );
        } else {
            tracing::warn!(
                error = ?self.kind,
                request_id = ?self.request_id,
                status = status.as_u16(),
                "request rejected"
            );
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

/// `x-request-id` as set by `SetRequestIdLayer`
pub fn get_request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `map_err` adapter: converts a layer error and stamps it with the request id.
pub fn with_request_id<E: Into<AppError>>(headers: &HeaderMap) -> impl FnOnce(E) -> AppError + '_ {
    move |err| {
        let err = err.into();
        match get_request_id_from_headers(headers) {
            Some(id) => err.with_request_id(id),
            None => err,
        }
    }
}
