//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use settlement::{HistoryError, SaleError, SettlementError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout request that failed validation.
    Settlement(SettlementError),
    /// Direct sale error.
    Sale(SaleError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Settlement(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Sale(err) => sale_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn sale_error_to_response(err: SaleError) -> (StatusCode, String) {
    match &err {
        SaleError::InvalidQuantity(_)
        | SaleError::InvalidIdentifier(_)
        | SaleError::StockInsufficient { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        SaleError::ProductNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SaleError::Internal(msg) => {
            tracing::error!(error = %msg, "direct sale failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        ApiError::Settlement(err)
    }
}

impl From<SaleError> for ApiError {
    fn from(err: SaleError) -> Self {
        ApiError::Sale(err)
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
