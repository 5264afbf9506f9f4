//! API server entry point.

use std::time::Duration;

use api::config::Config;
use checkout::{PaymentGateway, StripeGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CatalogStore, InMemoryStore, OrderLedger, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Seeds the catalog and serves until shutdown.
async fn serve<S, G>(store: S, gateway: G, config: &Config, metrics_handle: PrometheusHandle)
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let seeded = store
        .seed_products(&domain::default_catalog())
        .await
        .expect("failed to seed product catalog");
    tracing::info!(inserted = seeded, "product catalog ready");

    let state = api::create_default_state(store, gateway, config);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, base_url = %config.app_base_url, "starting storefront server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = Config::from_env().expect("invalid configuration");

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Payment gateway
    let gateway = StripeGateway::new(config.stripe()).expect("failed to build payment client");
    if !gateway.is_configured() {
        tracing::warn!("STRIPE_SECRET_KEY is not set; checkout will fail at the payment step");
    }

    // 5. Store, then serve
    match config.database_url.as_deref() {
        Some(url) => {
            let store =
                PostgresStore::connect(url, config.database_max_connections, DB_ACQUIRE_TIMEOUT)
                    .await
                    .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");
            serve(store, gateway, &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; orders are kept in memory only");
            serve(InMemoryStore::new(), gateway, &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
