//! Checkout orchestration for the storefront.
//!
//! This crate turns a cart into a durable order, asks the payment gateway
//! for a hosted checkout session, and settles the order when the provider
//! reports the outcome through a signed webhook:
//!
//! 1. Validate the cart and customer email
//! 2. Persist the pending order
//! 3. Create the hosted payment session and link it to the order
//! 4. Settle the order to completed or failed from verified webhook events

pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod webhook;

pub use coordinator::{CheckoutCoordinator, CheckoutRedirect, Settlement, WebhookOutcome};
pub use error::{CheckoutError, GatewayError, Result, WebhookError};
pub use gateway::{
    CheckoutSession, CreatedSession, InMemoryPaymentGateway, PaymentGateway, StripeConfig,
    StripeGateway,
};
pub use webhook::{SIGNATURE_HEADER, WebhookEvent, WebhookVerifier, sign_payload};
