//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orchestrator::{OrderRejection, RejectionReason};
use order_store::PersistenceError;
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The order was not placed.
    Rejected(OrderRejection),
    /// Internal server error.
    Internal(String),
}

/// Body returned when an order is rejected.
#[derive(Debug, Serialize)]
pub struct RejectionBody {
    pub reason: RejectionReason,
    pub message: String,
    pub skus: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Rejected(rejection) => return rejection_to_response(rejection),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Status code for each rejection reason.
pub fn rejection_status(reason: RejectionReason) -> StatusCode {
    match reason {
        RejectionReason::InvalidRequest => StatusCode::BAD_REQUEST,
        RejectionReason::InsufficientStock => StatusCode::CONFLICT,
        RejectionReason::ServiceDegraded => StatusCode::SERVICE_UNAVAILABLE,
        RejectionReason::PersistenceFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn rejection_to_response(rejection: OrderRejection) -> Response {
    let status = rejection_status(rejection.reason);
    let body = RejectionBody {
        reason: rejection.reason,
        message: rejection.message,
        skus: rejection
            .skus
            .into_iter()
            .map(|sku| sku.as_str().to_string())
            .collect(),
    };
    (status, Json(body)).into_response()
}

impl From<OrderRejection> for ApiError {
    fn from(rejection: OrderRejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
