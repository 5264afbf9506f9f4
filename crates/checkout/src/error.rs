//! Checkout error types.

use domain::OrderError;
use store::StoreError;
use thiserror::Error;

/// Errors raised while creating a hosted payment session.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A credential the gateway needs is missing.
    #[error("Payment gateway not configured: {0} is not set")]
    NotConfigured(&'static str),

    /// The order cannot be turned into a session request.
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    /// The request never produced a usable HTTP response.
    #[error("Payment gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with an error status.
    #[error("Payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The provider answered successfully but the body is unusable.
    #[error("Unexpected payment gateway response: {0}")]
    InvalidResponse(String),

    /// The gateway is unavailable.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while authenticating or decoding a webhook delivery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// The signature header is missing, malformed, stale, or does not match.
    #[error("Invalid webhook signature: {0}")]
    SignatureInvalid(&'static str),

    /// The body passed verification but could not be decoded.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// No signing secret is configured, so nothing can be verified.
    #[error("Webhook signing secret is not configured")]
    SecretNotConfigured,
}

/// Errors returned by the checkout coordinator.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// User input was rejected.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A product or order does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The order violated a domain rule.
    #[error("Order error: {0}")]
    Domain(OrderError),

    /// The order ledger or catalog failed.
    #[error("Persistence error: {0}")]
    Persistence(StoreError),

    /// The payment gateway failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The webhook could not be authenticated or decoded.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// A completed session does not belong to any order.
    #[error("No order for payment session {0}")]
    UnknownSession(String),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            CheckoutError::NotFound(err.to_string())
        } else {
            CheckoutError::Persistence(err)
        }
    }
}

impl From<OrderError> for CheckoutError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidEmail(_) => CheckoutError::Validation(err.to_string()),
            other => CheckoutError::Domain(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
