//! Catalog browsing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use checkout::{CheckoutError, PaymentGateway};
use common::ProductId;
use domain::Product;
use serde::Serialize;
use store::{CatalogStore, OrderLedger};

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub price: String,
    pub image_url: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            price: product.formatted_price(),
            price_cents: product.price.cents(),
            id: product.id.to_string(),
            name: product.name,
            description: product.description,
            image_url: product.image_url,
        }
    }
}

#[derive(Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
}

fn product_list(products: Vec<Product>) -> Json<ProductListResponse> {
    Json(ProductListResponse {
        products: products.into_iter().map(ProductResponse::from).collect(),
    })
}

/// GET / — featured products for the home page.
#[tracing::instrument(skip(state))]
pub async fn home<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
) -> Result<Json<ProductListResponse>, ApiError>
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let products = state.checkout.featured_products().await?;
    Ok(product_list(products))
}

/// GET /products — the whole catalog.
#[tracing::instrument(skip(state))]
pub async fn list<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
) -> Result<Json<ProductListResponse>, ApiError>
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let products = state.checkout.list_products().await?;
    Ok(product_list(products))
}

/// GET /products/{id} — one product; unknown ids go back to the listing.
#[tracing::instrument(skip(state))]
pub async fn detail<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    match state.checkout.get_product(&ProductId::new(id)).await {
        Ok(product) => Ok(Json(ProductResponse::from(product)).into_response()),
        Err(CheckoutError::NotFound(_)) => Ok(Redirect::to("/products").into_response()),
        Err(e) => Err(e.into()),
    }
}
