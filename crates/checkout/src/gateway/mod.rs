//! Payment gateway trait and implementations.

pub mod memory;
pub mod stripe;

use async_trait::async_trait;
use domain::Order;

use crate::error::GatewayError;

pub use memory::{CreatedSession, InMemoryPaymentGateway};
pub use stripe::{StripeConfig, StripeGateway};

/// A hosted checkout session created by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Page the customer is redirected to.
    pub url: String,
    /// Provider identifier, echoed back in webhook events.
    pub session_id: String,
}

/// Outbound side of the payment provider.
///
/// Implementations only talk to the provider; they never touch persisted
/// state.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Requests a hosted checkout session for `order`.
    ///
    /// The session carries one line item per order item, priced in cents.
    async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, GatewayError>;
}
