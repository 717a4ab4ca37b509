//! Maps core streaming errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rivulet_core::streaming::StreamError;
use serde_json::json;
use tracing::error;

/// Wrapper giving `StreamError` an HTTP rendering.
#[derive(Debug)]
pub struct ApiError(pub StreamError);

impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retryable) = match &self.0 {
            StreamError::SessionNotFound { .. } | StreamError::FileNotFound { .. } => {
                (StatusCode::NOT_FOUND, false)
            }
            StreamError::NotReady { .. } => (StatusCode::SERVICE_UNAVAILABLE, true),
            StreamError::TooManySessions { .. } => (StatusCode::TOO_MANY_REQUESTS, true),
            StreamError::LaunchFailed { .. } | StreamError::ProbeFailed { .. } => {
                (StatusCode::BAD_GATEWAY, false)
            }
            StreamError::DirectoryCreation { .. } | StreamError::Io { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, false)
            }
        };

        if status.is_server_error() {
            error!("request failed: {}", self.0);
        }

        let body = Json(json!({ "error": self.0.to_string() }));
        let mut response = (status, body).into_response();
        if retryable {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}
