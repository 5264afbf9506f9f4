//! Stripe client tests against a local stand-in for the REST API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Json, Router};
use checkout::{GatewayError, PaymentGateway, StripeConfig, StripeGateway};
use common::Money;
use domain::{Order, Product};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>,
}

async fn create_session(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let amount = params
        .get("line_items[0][price_data][unit_amount]")
        .cloned()
        .unwrap_or_default();
    captured.requests.lock().unwrap().push((auth, params));

    if amount == "1" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "message": "Amount too small", "type": "invalid_request_error" } })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "id": "cs_test_abc",
            "object": "checkout.session",
            "url": "https://checkout.stripe.test/c/pay/cs_test_abc"
        })),
    )
}

async fn slow_session() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK
}

async fn spawn_api() -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/v1/checkout/sessions", post(create_session))
        .route("/slow/v1/checkout/sessions", post(slow_session))
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), captured)
}

fn gateway(api_base: String, timeout: Duration) -> StripeGateway {
    StripeGateway::new(StripeConfig {
        secret_key: Some("sk_test_123".into()),
        api_base,
        timeout,
    })
    .unwrap()
}

fn order(cents: i64) -> Order {
    let mut order = Order::new("a@b.com");
    let product = Product::new("prod_1", "Premium T-Shirt", "", Money::from_cents(cents), "").unwrap();
    order.add_item(&product, 2).unwrap();
    order
}

#[tokio::test]
async fn test_creates_session_with_form_encoded_line_items() {
    let (base, captured) = spawn_api().await;
    let gateway = gateway(base, Duration::from_secs(5));
    let order = order(2999);

    let session = gateway
        .create_checkout_session(&order, "http://shop/success", "http://shop/cancel")
        .await
        .unwrap();

    assert_eq!(session.session_id, "cs_test_abc");
    assert_eq!(session.url, "https://checkout.stripe.test/c/pay/cs_test_abc");

    let requests = captured.requests.lock().unwrap();
    let (auth, params) = &requests[0];
    assert!(auth.as_deref().is_some_and(|a| a.starts_with("Basic ")));
    assert_eq!(params["mode"], "payment");
    assert_eq!(params["line_items[0][price_data][currency]"], "usd");
    assert_eq!(params["line_items[0][price_data][unit_amount]"], "2999");
    assert_eq!(
        params["line_items[0][price_data][product_data][name]"],
        "Premium T-Shirt"
    );
    assert_eq!(params["line_items[0][quantity]"], "2");
    assert_eq!(params["success_url"], "http://shop/success");
    assert_eq!(params["cancel_url"], "http://shop/cancel");
    assert_eq!(params["client_reference_id"], order.id().to_string());
}

#[tokio::test]
async fn test_provider_error_message_is_surfaced() {
    let (base, _) = spawn_api().await;
    let gateway = gateway(base, Duration::from_secs(5));

    let err = gateway
        .create_checkout_session(&order(1), "s", "c")
        .await
        .unwrap_err();

    match err {
        GatewayError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Amount too small");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_request_timeout_is_bounded() {
    let (base, _) = spawn_api().await;
    let gateway = gateway(format!("{base}/slow"), Duration::from_millis(200));

    let err = gateway
        .create_checkout_session(&order(2999), "s", "c")
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Transport(e) if e.is_timeout()));
}

#[tokio::test]
async fn test_unreachable_api_is_a_transport_error() {
    let gateway = gateway("http://127.0.0.1:1".into(), Duration::from_secs(2));
    let err = gateway
        .create_checkout_session(&order(2999), "s", "c")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}
