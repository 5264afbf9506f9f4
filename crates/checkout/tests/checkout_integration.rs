//! Integration tests for the checkout flow.

use chrono::Utc;
use checkout::{
    CheckoutCoordinator, CheckoutError, InMemoryPaymentGateway, Settlement, WebhookError,
    WebhookOutcome, WebhookVerifier, sign_payload,
};
use common::{Money, OrderId, ProductId};
use domain::{Cart, OrderStatus, Product};
use store::{CatalogStore, InMemoryStore, OrderLedger};

const SECRET: &str = "whsec_integration";
const BASE_URL: &str = "http://shop.test";

type TestCoordinator = CheckoutCoordinator<InMemoryStore, InMemoryPaymentGateway>;

struct TestHarness {
    coordinator: TestCoordinator,
    store: InMemoryStore,
    gateway: InMemoryPaymentGateway,
}

impl TestHarness {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        let gateway = InMemoryPaymentGateway::new();

        store
            .seed_products(&[
                Product::new("A", "Product A", "", Money::from_cents(1000), "").unwrap(),
                Product::new("B", "Product B", "", Money::from_cents(500), "").unwrap(),
            ])
            .await
            .unwrap();

        let coordinator = CheckoutCoordinator::new(
            store.clone(),
            gateway.clone(),
            WebhookVerifier::new(Some(SECRET.to_string())),
        );

        Self {
            coordinator,
            store,
            gateway,
        }
    }

    async fn filled_cart(&self) -> Cart {
        let mut cart = Cart::new();
        self.coordinator
            .add_to_cart(&mut cart, &ProductId::new("A"), 2)
            .await
            .unwrap();
        self.coordinator
            .add_to_cart(&mut cart, &ProductId::new("B"), 1)
            .await
            .unwrap();
        cart
    }

    async fn webhook(&self, event_type: &str, session_id: &str) -> Result<WebhookOutcome, CheckoutError> {
        let payload = event(event_type, session_id);
        let signature = sign_payload(SECRET, Utc::now().timestamp(), &payload);
        self.coordinator.handle_webhook(&payload, &signature).await
    }

    async fn status(&self, order_id: OrderId) -> OrderStatus {
        self.store.find_by_id(order_id).await.unwrap().status()
    }
}

fn event(event_type: &str, session_id: &str) -> Vec<u8> {
    serde_json::json!({
        "id": "evt_test",
        "type": event_type,
        "data": { "object": { "id": session_id, "object": "checkout.session" } }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_cart_to_pending_order_with_payment_session() {
    let h = TestHarness::new().await;
    let mut cart = h.filled_cart().await;
    assert_eq!(cart.total(), Money::from_cents(2500));

    let redirect = h
        .coordinator
        .begin_checkout(&mut cart, "a@b.com", BASE_URL)
        .await
        .unwrap();

    assert!(cart.is_empty());
    assert_eq!(redirect.session_id, "cs_test_0001");
    assert_eq!(redirect.url, "https://checkout.test/pay/cs_test_0001");

    let order = h.store.find_by_id(redirect.order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.customer_email(), "a@b.com");
    assert_eq!(order.item_count(), 2);
    assert_eq!(order.total_amount(), Money::from_cents(2500));
    assert_eq!(order.total_amount().to_string(), "$25.00");
    assert_eq!(order.payment_session_id(), Some("cs_test_0001"));

    let created = &h.gateway.sessions()[0];
    assert_eq!(created.order_id, order.id());
    assert_eq!(created.amount, Money::from_cents(2500));
    assert_eq!(
        created.success_url,
        "http://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
    );
    assert_eq!(
        created.cancel_url,
        format!("http://shop.test/checkout/cancel?order_id={}", order.id())
    );
}

#[tokio::test]
async fn test_checkout_rejects_empty_cart_and_bad_email() {
    let h = TestHarness::new().await;

    let mut empty = Cart::new();
    assert!(matches!(
        h.coordinator.begin_checkout(&mut empty, "a@b.com", BASE_URL).await,
        Err(CheckoutError::EmptyCart)
    ));

    let mut cart = h.filled_cart().await;
    assert!(matches!(
        h.coordinator.begin_checkout(&mut cart, "not-an-email", BASE_URL).await,
        Err(CheckoutError::Validation(_))
    ));
    assert_eq!(cart.len(), 2);
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.gateway.session_count(), 0);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let h = TestHarness::new().await;
    let mut cart = Cart::new();

    let result = h
        .coordinator
        .add_to_cart(&mut cart, &ProductId::new("missing"), 1)
        .await;

    assert!(matches!(result, Err(CheckoutError::NotFound(_))));
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_gateway_failure_keeps_cart_and_pending_order() {
    let h = TestHarness::new().await;
    h.gateway.set_fail_on_create(true);
    let mut cart = h.filled_cart().await;

    let result = h.coordinator.begin_checkout(&mut cart, "a@b.com", BASE_URL).await;
    assert!(matches!(result, Err(CheckoutError::Gateway(_))));

    assert_eq!(cart.len(), 2);
    assert_eq!(cart.total(), Money::from_cents(2500));
    assert_eq!(h.store.order_count().await, 1);
    assert!(
        h.coordinator
            .order_for_session("cs_test_0001")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_failed_session_link_keeps_cart() {
    let h = TestHarness::new().await;

    // Another order already holds the id the gateway will hand out next,
    // so linking the new session fails after the gateway call.
    let mut squatter = domain::Order::new("x@y.com");
    squatter.attach_payment_session("cs_test_0001").unwrap();
    h.store.save(&squatter).await.unwrap();

    let mut cart = h.filled_cart().await;
    let result = h.coordinator.begin_checkout(&mut cart, "a@b.com", BASE_URL).await;

    assert!(matches!(result, Err(CheckoutError::Persistence(_))));
    assert_eq!(cart.len(), 2);
    assert_eq!(h.gateway.session_count(), 1);

    let created = &h.gateway.sessions()[0];
    let order = h.store.find_by_id(created.order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Pending);
    assert!(order.payment_session_id().is_none());
}

#[tokio::test]
async fn test_failed_order_save_skips_gateway() {
    let h = TestHarness::new().await;
    let mut cart = h.filled_cart().await;

    h.store.fail_next_item_write();
    let result = h.coordinator.begin_checkout(&mut cart, "a@b.com", BASE_URL).await;

    assert!(matches!(result, Err(CheckoutError::Persistence(_))));
    assert_eq!(cart.len(), 2);
    assert_eq!(h.gateway.session_count(), 0);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_completed_webhook_settles_order_once() {
    let h = TestHarness::new().await;
    let mut cart = h.filled_cart().await;
    let redirect = h
        .coordinator
        .begin_checkout(&mut cart, "a@b.com", BASE_URL)
        .await
        .unwrap();

    let first = h
        .webhook("checkout.session.completed", &redirect.session_id)
        .await
        .unwrap();
    assert_eq!(
        first,
        WebhookOutcome::Settled(Settlement {
            order_id: redirect.order_id,
            status: OrderStatus::Completed,
            applied: true,
        })
    );
    let after_first = h.store.find_by_id(redirect.order_id).await.unwrap();

    let second = h
        .webhook("checkout.session.completed", &redirect.session_id)
        .await
        .unwrap();
    assert_eq!(
        second,
        WebhookOutcome::Settled(Settlement {
            order_id: redirect.order_id,
            status: OrderStatus::Completed,
            applied: false,
        })
    );

    let after_second = h.store.find_by_id(redirect.order_id).await.unwrap();
    assert_eq!(after_second, after_first);
}

#[tokio::test]
async fn test_expired_after_completed_stays_completed() {
    let h = TestHarness::new().await;
    let mut cart = h.filled_cart().await;
    let redirect = h
        .coordinator
        .begin_checkout(&mut cart, "a@b.com", BASE_URL)
        .await
        .unwrap();

    h.webhook("checkout.session.completed", &redirect.session_id)
        .await
        .unwrap();
    let outcome = h
        .webhook("checkout.session.expired", &redirect.session_id)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Settled(Settlement {
            order_id: redirect.order_id,
            status: OrderStatus::Completed,
            applied: false,
        })
    );
    assert_eq!(h.status(redirect.order_id).await, OrderStatus::Completed);
}

#[tokio::test]
async fn test_expired_session_fails_pending_order() {
    let h = TestHarness::new().await;
    let mut cart = h.filled_cart().await;
    let redirect = h
        .coordinator
        .begin_checkout(&mut cart, "a@b.com", BASE_URL)
        .await
        .unwrap();

    h.webhook("checkout.session.expired", &redirect.session_id)
        .await
        .unwrap();
    assert_eq!(h.status(redirect.order_id).await, OrderStatus::Failed);
}

#[tokio::test]
async fn test_invalid_signature_leaves_order_unchanged() {
    let h = TestHarness::new().await;
    let mut cart = h.filled_cart().await;
    let redirect = h
        .coordinator
        .begin_checkout(&mut cart, "a@b.com", BASE_URL)
        .await
        .unwrap();

    let payload = event("checkout.session.completed", &redirect.session_id);
    let forged = sign_payload("whsec_attacker", Utc::now().timestamp(), &payload);

    let result = h.coordinator.handle_webhook(&payload, &forged).await;
    assert!(matches!(
        result,
        Err(CheckoutError::Webhook(WebhookError::SignatureInvalid(_)))
    ));
    assert_eq!(h.status(redirect.order_id).await, OrderStatus::Pending);
}

#[tokio::test]
async fn test_unknown_sessions() {
    let h = TestHarness::new().await;

    assert!(matches!(
        h.webhook("checkout.session.completed", "cs_nobody").await,
        Err(CheckoutError::UnknownSession(id)) if id == "cs_nobody"
    ));

    assert_eq!(
        h.webhook("checkout.session.expired", "cs_nobody")
            .await
            .unwrap(),
        WebhookOutcome::UnknownSession {
            session_id: "cs_nobody".into()
        }
    );
}

#[tokio::test]
async fn test_unhandled_event_is_ignored() {
    let h = TestHarness::new().await;
    assert_eq!(
        h.webhook("customer.created", "cus_1").await.unwrap(),
        WebhookOutcome::Ignored {
            event_type: "customer.created".into()
        }
    );
}

#[tokio::test]
async fn test_cancel_fails_pending_order_and_keeps_completed() {
    let h = TestHarness::new().await;

    let mut cart = h.filled_cart().await;
    let abandoned = h
        .coordinator
        .begin_checkout(&mut cart, "a@b.com", BASE_URL)
        .await
        .unwrap();
    let settlement = h.coordinator.cancel_order(abandoned.order_id).await.unwrap();
    assert!(settlement.applied);
    assert_eq!(settlement.status, OrderStatus::Failed);

    let mut cart = h.filled_cart().await;
    let paid = h
        .coordinator
        .begin_checkout(&mut cart, "a@b.com", BASE_URL)
        .await
        .unwrap();
    h.webhook("checkout.session.completed", &paid.session_id)
        .await
        .unwrap();
    let settlement = h.coordinator.cancel_order(paid.order_id).await.unwrap();
    assert!(!settlement.applied);
    assert_eq!(settlement.status, OrderStatus::Completed);

    assert!(matches!(
        h.coordinator.cancel_order(OrderId::new()).await,
        Err(CheckoutError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_duplicate_webhooks_apply_once() {
    let h = std::sync::Arc::new(TestHarness::new().await);
    let mut cart = h.filled_cart().await;
    let redirect = h
        .coordinator
        .begin_checkout(&mut cart, "a@b.com", BASE_URL)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let h = h.clone();
        let session_id = redirect.session_id.clone();
        handles.push(tokio::spawn(async move {
            h.webhook("checkout.session.completed", &session_id).await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if let Ok(WebhookOutcome::Settled(s)) = handle.await.unwrap()
            && s.applied
        {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(h.status(redirect.order_id).await, OrderStatus::Completed);
}

#[tokio::test]
async fn test_featured_products_are_capped() {
    let h = TestHarness::new().await;
    h.store
        .seed_products(&domain::default_catalog())
        .await
        .unwrap();

    assert_eq!(h.coordinator.list_products().await.unwrap().len(), 5);
    assert_eq!(h.coordinator.featured_products().await.unwrap().len(), 3);
}
