//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, WebhookError};
use domain::OrderError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout flow error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::NotFound(_) | CheckoutError::UnknownSession(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CheckoutError::EmptyCart | CheckoutError::Validation(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CheckoutError::Webhook(WebhookError::SecretNotConfigured) => {
            tracing::error!("webhook received but no signing secret is configured");
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CheckoutError::Webhook(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::Domain(OrderError::InvalidStateTransition { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::Domain(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        CheckoutError::Gateway(_) => {
            tracing::error!(error = %err, "payment gateway error");
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
        CheckoutError::Persistence(_) => {
            tracing::error!(error = %err, "persistence error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}
