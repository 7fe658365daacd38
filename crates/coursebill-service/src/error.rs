//! API error types and responses.
//!
//! The response status is what drives the provider's redelivery behavior:
//! any non-2xx asks for a retry. Signature and malformation failures return
//! 400 (the provider will not re-sign a bad request, but a transient
//! serialization glitch may clear on redelivery); store and provider-API
//! failures return 5xx so the event is redelivered and replayed against the
//! idempotent handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The webhook signature was missing or did not verify.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// The event body could not be decoded into a known envelope shape.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A required field was absent from an event payload.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Internal server error (storage or configuration).
    #[error("internal error: {0}")]
    Internal(String),

    /// The payment provider's API failed or timed out.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "invalid_signature",
                self.to_string(),
            ),
            Self::MalformedEvent(msg) => {
                (StatusCode::BAD_REQUEST, "malformed_event", msg.clone())
            }
            Self::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "malformed_event",
                format!("missing field: {field}"),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<coursebill_store::StoreError> for ApiError {
    fn from(err: coursebill_store::StoreError) -> Self {
        match err {
            coursebill_store::StoreError::Database(msg)
            | coursebill_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<crate::stripe::StripeError> for ApiError {
    fn from(err: crate::stripe::StripeError) -> Self {
        Self::ExternalService(err.to_string())
    }
}
