//! Payment provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::{PaymentGateway, SIGNATURE_HEADER, WebhookOutcome};
use serde::Serialize;
use store::{CatalogStore, OrderLedger};

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        match outcome {
            WebhookOutcome::Settled(settlement) => Self {
                received: true,
                order_id: Some(settlement.order_id.to_string()),
                status: Some(settlement.status.to_string()),
            },
            WebhookOutcome::UnknownSession { .. } | WebhookOutcome::Ignored { .. } => Self {
                received: true,
                order_id: None,
                status: None,
            },
        }
    }
}

/// POST /webhook/stripe
///
/// The raw body is verified against the signature header before it is
/// parsed. A missing header is treated as an invalid signature.
#[tracing::instrument(skip_all)]
pub async fn stripe<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError>
where
    S: CatalogStore + OrderLedger + 'static,
    G: PaymentGateway + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let outcome = state.checkout.handle_webhook(&body, signature).await?;
    Ok(Json(WebhookAck::from(outcome)))
}
