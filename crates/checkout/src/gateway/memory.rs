//! In-memory payment gateway for tests and local runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::{Money, OrderId};
use domain::Order;

use super::{CheckoutSession, PaymentGateway};
use crate::error::GatewayError;

const HOSTED_PAGE_BASE: &str = "https://checkout.test/pay";

/// A session request the gateway accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_id: String,
    pub order_id: OrderId,
    pub amount: Money,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: Vec<CreatedSession>,
    next_id: u32,
    fail_on_create: bool,
}

/// Deterministic gateway double.
///
/// Session ids are sequential (`cs_test_0001`, `cs_test_0002`, ...).
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every session request while set.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state().fail_on_create = fail;
    }

    /// Returns the number of sessions created.
    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    /// Returns every accepted request, oldest first.
    pub fn sessions(&self) -> Vec<CreatedSession> {
        self.state().sessions.clone()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut state = self.state();

        if state.fail_on_create {
            return Err(GatewayError::Unavailable("session creation declined".into()));
        }
        if !order.has_items() {
            return Err(GatewayError::InvalidRequest("order has no items".into()));
        }

        state.next_id += 1;
        let session_id = format!("cs_test_{:04}", state.next_id);
        state.sessions.push(CreatedSession {
            session_id: session_id.clone(),
            order_id: order.id(),
            amount: order.total_amount(),
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
        });

        Ok(CheckoutSession {
            url: format!("{HOSTED_PAGE_BASE}/{session_id}"),
            session_id,
        })
    }
}
