//! Checkout coordinator: cart to order to payment session to settlement.

use common::{OrderId, ProductId};
use domain::{Cart, Order, OrderStatus, Product, TerminalStatus, validate_email};
use store::{CatalogStore, OrderLedger, OrderLedgerExt, StoreError};

use crate::error::{CheckoutError, Result};
use crate::gateway::PaymentGateway;
use crate::webhook::{WebhookEvent, WebhookVerifier};

/// Number of products shown on the home page.
pub const FEATURED_PRODUCT_COUNT: usize = 3;

/// Where to send the customer once a payment session exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub url: String,
    pub session_id: String,
    pub order_id: OrderId,
}

/// Result of moving an order to a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub order_id: OrderId,
    /// Status the order has after the attempt.
    pub status: OrderStatus,
    /// True if this call changed the status.
    pub applied: bool,
}

/// What a verified webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Settled(Settlement),
    /// An expired session that no order references.
    UnknownSession { session_id: String },
    Ignored { event_type: String },
}

/// Drives the checkout state machine.
///
/// An order enters `pending` when checkout starts and leaves it exactly
/// once, to `completed` or `failed`, from a verified webhook or a
/// cancellation.
pub struct CheckoutCoordinator<S, G>
where
    S: CatalogStore + OrderLedger,
    G: PaymentGateway,
{
    store: S,
    gateway: G,
    verifier: WebhookVerifier,
}

impl<S, G> CheckoutCoordinator<S, G>
where
    S: CatalogStore + OrderLedger,
    G: PaymentGateway,
{
    /// Creates a new checkout coordinator.
    pub fn new(store: S, gateway: G, verifier: WebhookVerifier) -> Self {
        Self {
            store,
            gateway,
            verifier,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }

    /// Returns the first few catalog products.
    pub async fn featured_products(&self) -> Result<Vec<Product>> {
        let mut products = self.store.list_products().await?;
        products.truncate(FEATURED_PRODUCT_COUNT);
        Ok(products)
    }

    pub async fn get_product(&self, id: &ProductId) -> Result<Product> {
        Ok(self.store.get_product(id).await?)
    }

    /// Looks `id` up in the catalog and adds it to `cart`.
    ///
    /// A zero quantity counts as one.
    pub async fn add_to_cart(&self, cart: &mut Cart, id: &ProductId, quantity: u32) -> Result<()> {
        let product = self.store.get_product(id).await?;
        cart.add(&product, quantity);
        tracing::debug!(product_id = %id, quantity, "added to cart");
        Ok(())
    }

    /// Turns `cart` into a pending order and opens a hosted payment session.
    ///
    /// The order is saved before the gateway is called. The cart is cleared
    /// only once the session id is stored on the order; on any failure it is
    /// left as it was.
    #[tracing::instrument(skip(self, cart, email), fields(items = cart.len()))]
    pub async fn begin_checkout(
        &self,
        cart: &mut Cart,
        email: &str,
        base_url: &str,
    ) -> Result<CheckoutRedirect> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let email = validate_email(email)?;

        let mut order = Order::new(email);
        for line in cart.items() {
            let product = self.store.get_product(&line.product_id).await?;
            order.add_item(&product, line.quantity)?;
        }
        self.store.save(&order).await?;
        tracing::info!(order_id = %order.id(), total = %order.total_amount(), "order created");

        let base_url = base_url.trim_end_matches('/');
        let success_url = format!("{base_url}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}");
        let cancel_url = format!("{base_url}/checkout/cancel?order_id={}", order.id());

        let session = match self
            .gateway
            .create_checkout_session(&order, &success_url, &cancel_url)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                metrics::counter!("checkout_failures_total").increment(1);
                tracing::warn!(order_id = %order.id(), error = %e, "payment session creation failed");
                return Err(e.into());
            }
        };

        order.attach_payment_session(&session.session_id)?;
        if let Err(e) = self.store.save(&order).await {
            metrics::counter!("checkout_failures_total").increment(1);
            tracing::error!(
                order_id = %order.id(),
                session_id = %session.session_id,
                error = %e,
                "could not link payment session to order"
            );
            return Err(CheckoutError::Persistence(e));
        }

        cart.clear();
        metrics::counter!("checkout_sessions_created_total").increment(1);
        tracing::info!(order_id = %order.id(), session_id = %session.session_id, "checkout started");

        Ok(CheckoutRedirect {
            url: session.url,
            session_id: session.session_id,
            order_id: order.id(),
        })
    }

    /// Verifies and applies a webhook delivery.
    ///
    /// A completed session with no matching order is an error, so the
    /// provider retries; an expired one is only logged.
    #[tracing::instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookOutcome> {
        let event = match self.verifier.verify_and_parse(payload, signature) {
            Ok(event) => event,
            Err(e) => {
                metrics::counter!("webhook_events_total", "kind" => "rejected").increment(1);
                tracing::warn!(error = %e, "webhook rejected");
                return Err(e.into());
            }
        };
        metrics::counter!("webhook_events_total", "kind" => event.kind()).increment(1);

        match event {
            WebhookEvent::SessionCompleted { session_id } => {
                let order = self
                    .store
                    .try_find_by_payment_session_id(&session_id)
                    .await?
                    .ok_or_else(|| {
                        tracing::error!(%session_id, "completed session has no order");
                        CheckoutError::UnknownSession(session_id.clone())
                    })?;
                let settlement = self.settle(order.id(), TerminalStatus::Completed).await?;
                Ok(WebhookOutcome::Settled(settlement))
            }
            WebhookEvent::SessionExpired { session_id } => {
                match self.store.try_find_by_payment_session_id(&session_id).await? {
                    Some(order) => {
                        let settlement = self.settle(order.id(), TerminalStatus::Failed).await?;
                        Ok(WebhookOutcome::Settled(settlement))
                    }
                    None => {
                        tracing::warn!(%session_id, "expired session has no order");
                        Ok(WebhookOutcome::UnknownSession { session_id })
                    }
                }
            }
            WebhookEvent::Ignored { event_type } => {
                tracing::info!(%event_type, "unhandled webhook event");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    /// Marks a pending order failed after the customer abandoned payment.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Settlement> {
        self.settle(order_id, TerminalStatus::Failed).await
    }

    /// Returns the order linked to a payment session, if any.
    pub async fn order_for_session(&self, session_id: &str) -> Result<Option<Order>> {
        Ok(self.store.try_find_by_payment_session_id(session_id).await?)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        Ok(self.store.find_by_id(order_id).await?)
    }

    async fn settle(&self, order_id: OrderId, target: TerminalStatus) -> Result<Settlement> {
        match self.store.update_status(order_id, target).await {
            Ok(change) => {
                let applied = change.is_applied();
                if applied {
                    metrics::counter!("order_status_transitions_total", "status" => target.as_str())
                        .increment(1);
                    tracing::info!(%order_id, status = %target, "order settled");
                } else {
                    tracing::info!(%order_id, status = %target, "order already settled");
                }
                Ok(Settlement {
                    order_id,
                    status: target.into(),
                    applied,
                })
            }
            Err(StoreError::StateConflict { current, .. }) => {
                tracing::warn!(%order_id, %current, requested = %target, "order already settled differently");
                Ok(Settlement {
                    order_id,
                    status: current,
                    applied: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
