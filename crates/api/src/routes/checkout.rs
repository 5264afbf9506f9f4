//! Checkout endpoints: start, success page and cancellation.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use checkout::{CheckoutError, PaymentGateway};
use common::OrderId;
use domain::{Order, OrderItem};
use serde::{Deserialize, Serialize};
use store::{CatalogStore, OrderLedger};

use super::cart::CartResponse;
use crate::AppState;
use crate::error::ApiError;
use crate::session::Session;

#[derive(Deserialize)]
pub struct CheckoutForm {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelQuery {
    pub order_id: Option<String>,
}

#[derive(Serialize)]
pub struct EmailPromptResponse {
    pub message: &'static str,
    pub cart: CartResponse,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_email: String,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub total: String,
    pub created_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let total = order.total_amount();
        Self {
            id: order.id().to_string(),
            customer_email: order.customer_email().to_string(),
            status: order.status().to_string(),
            items: order.items().iter().map(OrderItemResponse::from).collect(),
            total_cents: total.cents(),
            total: total.to_string(),
            created_at: order.created_at().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderResponse>,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            order: None,
        }
    }
}

/// GET|POST /checkout — turns the session cart into an order and redirects
/// to the hosted payment page.
#[tracing::instrument(skip_all, fields(session_id = %session.id()))]
pub async fn start<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    session: Session,
    form: Result<Form<CheckoutForm>, FormRejection>,
) -> Response
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let result = start_checkout(&state, &session, form).await;
    session.respond(result)
}

async fn start_checkout<S, G>(
    state: &AppState<S, G>,
    session: &Session,
    form: Result<Form<CheckoutForm>, FormRejection>,
) -> Result<Response, ApiError>
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let mut cart = session.cart().await;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let email = form
        .ok()
        .and_then(|Form(form)| form.email)
        .filter(|email| !email.trim().is_empty());
    let Some(email) = email else {
        return Ok(Json(EmailPromptResponse {
            message: "Please provide an email address to continue checkout",
            cart: CartResponse::from(&*cart),
        })
        .into_response());
    };

    let redirect = state
        .checkout
        .begin_checkout(&mut cart, &email, &state.base_url)
        .await?;
    session.record_order(redirect.order_id).await;

    Ok(Redirect::to(&redirect.url).into_response())
}

/// GET /checkout/success — landing page after payment.
///
/// The webhook settles the order; this only reports what is stored.
#[tracing::instrument(skip(state))]
pub async fn success<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        tracing::info!("success page without session id");
        return Ok(Json(MessageResponse::new("Your order is complete!")));
    };

    match state.checkout.order_for_session(&session_id).await {
        Ok(Some(order)) => Ok(Json(MessageResponse {
            message: format!(
                "Thank you for your order, {}! Your order ID is {}.",
                order.customer_email(),
                order.id()
            ),
            order: Some(OrderResponse::from(&order)),
        })),
        Ok(None) => {
            tracing::warn!(%session_id, "no order for success page");
            Ok(Json(MessageResponse::new(
                "Your order is complete! We could not retrieve order details at this moment.",
            )))
        }
        Err(e) => {
            tracing::error!(%session_id, error = %e, "order lookup failed");
            Ok(Json(MessageResponse::new(
                "Your order is complete! We could not retrieve order details at this moment.",
            )))
        }
    }
}

/// GET /checkout/cancel — the customer abandoned payment; fails the order.
///
/// Only the session that started the checkout can cancel its order; any
/// other id gets the plain cancellation page and the order is left alone.
#[tracing::instrument(skip_all, fields(session_id = %session.id()))]
pub async fn cancel<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    session: Session,
    Query(query): Query<CancelQuery>,
) -> Response
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let result = cancel_checkout(&state, &session, query).await;
    session.respond(result)
}

async fn cancel_checkout<S, G>(
    state: &AppState<S, G>,
    session: &Session,
    query: CancelQuery,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    const CANCELLED: &str = "Your checkout was cancelled. You can continue shopping.";

    let Some(raw) = query.order_id.filter(|id| !id.is_empty()) else {
        return Ok(Json(MessageResponse::new(CANCELLED)));
    };
    let order_id = OrderId::parse(&raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order_id: {e}")))?;

    if !session.owns_order(order_id).await {
        tracing::warn!(%order_id, "cancel for an order this session did not start");
        return Ok(Json(MessageResponse::new(CANCELLED)));
    }

    match state.checkout.cancel_order(order_id).await {
        Ok(settlement) => {
            tracing::info!(%order_id, status = %settlement.status, applied = settlement.applied, "checkout cancelled");
            let order = state.checkout.get_order(order_id).await?;
            Ok(Json(MessageResponse {
                message: CANCELLED.to_string(),
                order: Some(OrderResponse::from(&order)),
            }))
        }
        Err(CheckoutError::NotFound(_)) => {
            tracing::warn!(%order_id, "cancel for unknown order");
            Ok(Json(MessageResponse::new(CANCELLED)))
        }
        Err(e) => Err(e.into()),
    }
}
