//! Error taxonomy
//!
//! A single tagged enum covers every failure the core can surface. Each
//! variant carries a machine-readable code and maps to an HTTP status at
//! the handler boundary; nothing in here should ever crash the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed request data, including invalid state
    /// transitions. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Slot unavailable at booking time, or the confirmation-time
    /// re-check failed.
    #[error("{0}")]
    Conflict(String),

    /// No usable actor identity on the request.
    #[error("{0}")]
    Unauthorized(String),

    /// Actor lacks rights over the target appointment or payment.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Signature mismatch or gateway-reported failure; terminal for that
    /// payment attempt.
    #[error("{0}")]
    PaymentFailed(String),

    /// Gateway unreachable or responding 5xx; safe to retry with backoff.
    #[error("payment gateway error: {0}")]
    ExternalService(String),

    /// Invariant violation. The detail is logged, never sent to callers.
    #[error("internal error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::PaymentFailed(_) => "payment_failed",
            AppError::ExternalService(_) => "gateway_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            tracing::error!(%detail, "internal error");
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
