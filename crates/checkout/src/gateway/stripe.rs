//! Stripe Checkout client.

use std::time::Duration;

use async_trait::async_trait;
use domain::Order;
use serde::Deserialize;

use super::{CheckoutSession, PaymentGateway};
use crate::error::GatewayError;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Connection settings for [`StripeGateway`].
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key. Without one every session request fails.
    pub secret_key: Option<String>,
    /// Scheme and host of the API, without a trailing slash.
    pub api_base: String,
    /// Upper bound for a whole request.
    pub timeout: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Creates hosted checkout sessions through the Stripe REST API.
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: Option<String>,
    api_base: String,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            secret_key: config.secret_key.filter(|key| !key.is_empty()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Returns true if a secret key is present.
    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    fn session_params(order: &Order, success_url: &str, cancel_url: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("client_reference_id".to_string(), order.id().to_string()),
        ];

        if !order.customer_email().is_empty() {
            params.push((
                "customer_email".to_string(),
                order.customer_email().to_string(),
            ));
        }

        for (i, item) in order.items().iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            params.extend([
                (format!("{prefix}[price_data][currency]"), "usd".to_string()),
                (
                    format!("{prefix}[price_data][product_data][name]"),
                    item.product_name.clone(),
                ),
                (
                    format!("{prefix}[price_data][product_data][description]"),
                    format!("Order Item: {}", item.product_id),
                ),
                (
                    format!("{prefix}[price_data][unit_amount]"),
                    item.unit_price.cents().to_string(),
                ),
                (format!("{prefix}[quantity]"), item.quantity.to_string()),
            ]);
        }

        params
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self, order, success_url, cancel_url), fields(order_id = %order.id()))]
    async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(GatewayError::NotConfigured("STRIPE_SECRET_KEY"))?;

        if !order.has_items() {
            return Err(GatewayError::InvalidRequest("order has no items".into()));
        }
        if let Some(item) = order.items().iter().find(|item| item.unit_price.is_negative()) {
            return Err(GatewayError::InvalidRequest(format!(
                "negative unit price for {}",
                item.product_id
            )));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(secret_key, None::<&str>)
            .form(&Self::session_params(order, success_url, cancel_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or(body);
            tracing::warn!(status = status.as_u16(), %message, "checkout session rejected");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| GatewayError::InvalidResponse("session has no url".into()))?;

        tracing::info!(session_id = %session.id, "checkout session created");
        Ok(CheckoutSession {
            url,
            session_id: session.id,
        })
    }
}
