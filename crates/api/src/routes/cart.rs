//! Shopping cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use checkout::{CheckoutError, PaymentGateway};
use common::ProductId;
use domain::{Cart, CartItem, coerce_quantity};
use serde::{Deserialize, Serialize};
use store::{CatalogStore, OrderLedger};

use crate::AppState;
use crate::error::ApiError;
use crate::session::Session;

#[derive(Deserialize)]
pub struct AddToCartForm {
    pub quantity: Option<String>,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
    pub subtotal: String,
}

impl From<&CartItem> for CartLineResponse {
    fn from(item: &CartItem) -> Self {
        let subtotal = item.subtotal();
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            subtotal_cents: subtotal.cents(),
            subtotal: subtotal.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub item_count: u32,
    pub total_cents: i64,
    pub total: String,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        let total = cart.total();
        Self {
            items: cart.items().iter().map(CartLineResponse::from).collect(),
            item_count: cart.total_quantity(),
            total_cents: total.cents(),
            total: total.to_string(),
        }
    }
}

/// GET /cart — current cart contents.
#[tracing::instrument(skip_all, fields(session_id = %session.id()))]
pub async fn view<S, G>(State(_state): State<Arc<AppState<S, G>>>, session: Session) -> Response
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let cart = session.load_cart().await;
    session.respond(Json(CartResponse::from(&cart)))
}

/// POST /cart/add/{id} — adds a product; unknown products go to the listing.
#[tracing::instrument(skip_all, fields(session_id = %session.id(), product_id = %id))]
pub async fn add<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    session: Session,
    Path(id): Path<String>,
    form: Result<Form<AddToCartForm>, FormRejection>,
) -> Response
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let raw = form.ok().and_then(|Form(form)| form.quantity);
    let quantity = coerce_quantity(raw.as_deref());

    let mut cart = session.cart().await;
    let response = match state
        .checkout
        .add_to_cart(&mut cart, &ProductId::new(id), quantity)
        .await
    {
        Ok(()) => Redirect::to("/cart").into_response(),
        Err(CheckoutError::NotFound(_)) => Redirect::to("/products").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    };
    session.respond(response)
}

/// POST /cart/remove/{id} — drops a product's line, if present.
#[tracing::instrument(skip_all, fields(session_id = %session.id(), product_id = %id))]
pub async fn remove<S, G>(
    State(_state): State<Arc<AppState<S, G>>>,
    session: Session,
    Path(id): Path<String>,
) -> Response
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    session.cart().await.remove(&ProductId::new(id));
    session.respond(Redirect::to("/cart"))
}

/// POST /cart/clear — empties the cart.
#[tracing::instrument(skip_all, fields(session_id = %session.id()))]
pub async fn clear<S, G>(State(_state): State<Arc<AppState<S, G>>>, session: Session) -> Response
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    session.clear_cart().await;
    session.respond(Redirect::to("/cart"))
}
