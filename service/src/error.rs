//! API error types and responses.
//!
//! Component failures are mapped to the HTTP taxonomy exactly once, here at
//! the gateway boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request - missing header, invalid field, or key misuse.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflict - resource already exists or a duplicate request is still
    /// in flight.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The account cannot cover the requested debit.
    #[error("insufficient funds: balance={balance}, required={required}")]
    InsufficientFunds {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Whether this outcome is final for its idempotency key.
    ///
    /// Definitive failures are committed and replayed like successes;
    /// transient failures release the reservation so a retry re-executes.
    #[must_use]
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// The status code and JSON body for this error.
    ///
    /// Shared by `IntoResponse` and the idempotency pipeline so a replayed
    /// failure is byte-identical to the first rendering.
    #[must_use]
    pub fn to_parts(&self) -> (StatusCode, serde_json::Value) {
        let (status, code, message, details) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientFunds { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_funds",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = serde_json::to_value(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        })
        .unwrap_or_else(|_| serde_json::json!({"error": {"code": code}}));

        (status, body)
    }
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
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_parts();
        (status, Json(body)).into_response()
    }
}

impl From<payflow_store::StoreError> for ApiError {
    fn from(err: payflow_store::StoreError) -> Self {
        match err {
            payflow_store::StoreError::NotFound => Self::NotFound("not found".into()),
            payflow_store::StoreError::AlreadyExists => Self::Conflict("already exists".into()),
            payflow_store::StoreError::InsufficientFunds { balance, required } => {
                Self::InsufficientFunds { balance, required }
            }
            payflow_store::StoreError::IdempotencyMismatch => {
                Self::BadRequest("idempotency key reuse with different parameters".into())
            }
            payflow_store::StoreError::NoReservation => {
                Self::Internal("idempotency commit without reservation".into())
            }
            payflow_store::StoreError::Database(msg)
            | payflow_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("failed to encode response: {err}"))
    }
}

impl From<payflow_core::IdError> for ApiError {
    fn from(err: payflow_core::IdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
