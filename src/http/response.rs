//! Error-to-response mapping.
//!
//! # Design Decisions
//! - Validation failures are 400 and never reach the core
//! - "No response within the deadline" is 504, deliberately distinct from
//!   a core-reported failure (502) so callers can tell them apart
//! - Core-reported reasons pass through verbatim in the error body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::GatewayError;

/// Error body returned for every failed operation.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl GatewayError {
    /// HTTP status this error surfaces as.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_)
            | GatewayError::MalformedEncoding(_)
            | GatewayError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Backend(_) | GatewayError::ConnectionLost => StatusCode::BAD_GATEWAY,
            GatewayError::ProtocolViolation(_) | GatewayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            // The core's reason is the caller's error, unwrapped.
            GatewayError::Backend(reason) => reason.clone(),
            GatewayError::Timeout(_) => "no response from core".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::warn!(status = %status, error = %error, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %error, "Request rejected");
        }

        (status, Json(ErrorBody { error })).into_response()
    }
}
