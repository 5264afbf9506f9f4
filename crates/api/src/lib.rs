//! HTTP storefront server with observability.
//!
//! Provides the catalog, cart, checkout and payment webhook endpoints,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::{get, post};
use checkout::{CheckoutCoordinator, PaymentGateway, WebhookVerifier};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CatalogStore, OrderLedger};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use session::SessionStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S, G>
where
    S: CatalogStore + OrderLedger,
    G: PaymentGateway,
{
    pub checkout: CheckoutCoordinator<S, G>,
    pub sessions: SessionStore,
    /// Public origin used to build payment redirect URLs.
    pub base_url: String,
}

impl<S, G> FromRef<Arc<AppState<S, G>>> for SessionStore
where
    S: CatalogStore + OrderLedger,
    G: PaymentGateway,
{
    fn from_ref(state: &Arc<AppState<S, G>>) -> Self {
        state.sessions.clone()
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G>(state: Arc<AppState<S, G>>, metrics_handle: PrometheusHandle) -> Router
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/", get(routes::products::home::<S, G>))
        .route("/products", get(routes::products::list::<S, G>))
        .route("/products/{id}", get(routes::products::detail::<S, G>))
        .route("/cart", get(routes::cart::view::<S, G>))
        .route("/cart/add/{id}", post(routes::cart::add::<S, G>))
        .route("/cart/remove/{id}", post(routes::cart::remove::<S, G>))
        .route("/cart/clear", post(routes::cart::clear::<S, G>))
        .route(
            "/checkout",
            get(routes::checkout::start::<S, G>).post(routes::checkout::start::<S, G>),
        )
        .route("/checkout/success", get(routes::checkout::success::<S, G>))
        .route("/checkout/cancel", get(routes::checkout::cancel::<S, G>))
        .route("/webhook/stripe", post(routes::webhook::stripe::<S, G>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state from a store, a gateway and the config.
pub fn create_default_state<S, G>(store: S, gateway: G, config: &Config) -> Arc<AppState<S, G>>
where
    S: CatalogStore + OrderLedger,
    G: PaymentGateway,
{
    let verifier = WebhookVerifier::new(config.stripe_webhook_secret.clone());
    if !verifier.is_configured() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; webhooks will be rejected");
    }

    Arc::new(AppState {
        checkout: CheckoutCoordinator::new(store, gateway, verifier),
        sessions: SessionStore::new(config.session_ttl),
        base_url: config.app_base_url.clone(),
    })
}
