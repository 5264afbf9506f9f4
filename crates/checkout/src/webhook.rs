//! Webhook signature verification and event decoding.
//!
//! Deliveries carry a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex>`, where the hex value is an HMAC-SHA256 of
//! `"<t>.<raw body>"` keyed with the endpoint secret. The signature is
//! checked against the raw bytes before anything is parsed.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Maximum accepted age of a signed delivery.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

const SESSION_COMPLETED: &str = "checkout.session.completed";
const SESSION_EXPIRED: &str = "checkout.session.expired";

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// The customer paid for the session.
    SessionCompleted { session_id: String },
    /// The session expired unpaid.
    SessionExpired { session_id: String },
    /// Any other event type; acknowledged and otherwise ignored.
    Ignored { event_type: String },
}

impl WebhookEvent {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookEvent::SessionCompleted { .. } => "completed",
            WebhookEvent::SessionExpired { .. } => "expired",
            WebhookEvent::Ignored { .. } => "ignored",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: Option<RawEventData>,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
}

/// Authenticates webhook deliveries against the endpoint secret.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance: Duration,
}

impl WebhookVerifier {
    /// Creates a verifier. With no secret every delivery is rejected.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Returns true if a signing secret is present.
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Verifies `signature` over the raw `payload`, then decodes the event.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, WebhookError> {
        self.verify_at(payload, signature, Utc::now().timestamp())?;
        parse_event(payload)
    }

    fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), WebhookError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(WebhookError::SecretNotConfigured)?;

        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::SignatureInvalid("missing timestamp"))?;
        if signatures.is_empty() {
            return Err(WebhookError::SignatureInvalid("missing v1 signature"));
        }

        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        if now.saturating_sub(timestamp) > tolerance {
            return Err(WebhookError::SignatureInvalid("timestamp outside tolerance"));
        }

        let mac = signed_mac(secret, timestamp, payload);
        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(WebhookError::SignatureInvalid("signature mismatch"))
        }
    }
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Builds a signature header for `payload`, as the provider would.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let digest = signed_mac(secret, timestamp, payload).finalize().into_bytes();
    format!("t={timestamp},v1={}", hex::encode(digest))
}

fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let RawEvent { event_type, data } = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    match event_type.as_str() {
        SESSION_COMPLETED => Ok(WebhookEvent::SessionCompleted {
            session_id: session_id(data)?,
        }),
        SESSION_EXPIRED => Ok(WebhookEvent::SessionExpired {
            session_id: session_id(data)?,
        }),
        _ => Ok(WebhookEvent::Ignored { event_type }),
    }
}

fn session_id(data: Option<RawEventData>) -> Result<String, WebhookError> {
    let data = data.ok_or_else(|| WebhookError::MalformedPayload("missing data".into()))?;
    let session: SessionObject = serde_json::from_value(data.object)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
    Ok(session.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn completed(session_id: &str) -> Vec<u8> {
        format!(
            r#"{{"id":"evt_1","type":"checkout.session.completed","data":{{"object":{{"id":"{session_id}","object":"checkout.session"}}}}}}"#
        )
        .into_bytes()
    }

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(Some(SECRET.to_string()))
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = completed("cs_1");
        let header = sign_payload(SECRET, now(), &payload);

        assert_eq!(
            verifier().verify_and_parse(&payload, &header),
            Ok(WebhookEvent::SessionCompleted {
                session_id: "cs_1".into()
            })
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = completed("cs_1");
        let header = sign_payload("whsec_other", now(), &payload);

        assert_eq!(
            verifier().verify_and_parse(&payload, &header),
            Err(WebhookError::SignatureInvalid("signature mismatch"))
        );
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = sign_payload(SECRET, now(), &completed("cs_1"));
        assert!(matches!(
            verifier().verify_and_parse(&completed("cs_2"), &header),
            Err(WebhookError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = completed("cs_1");
        let signed_at = now() - 301;
        let header = sign_payload(SECRET, signed_at, &payload);

        assert_eq!(
            verifier().verify_and_parse(&payload, &header),
            Err(WebhookError::SignatureInvalid("timestamp outside tolerance"))
        );

        let lenient = verifier().with_tolerance(Duration::from_secs(600));
        assert!(lenient.verify_and_parse(&payload, &header).is_ok());
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let payload = completed("cs_1");
        for header in ["", "garbage", "t=123", "v1=abcd", "t=abc,v1=abcd"] {
            assert!(
                matches!(
                    verifier().verify_and_parse(&payload, header),
                    Err(WebhookError::SignatureInvalid(_))
                ),
                "{header:?} should be rejected"
            );
        }
    }

    #[test]
    fn any_matching_v1_signature_is_accepted() {
        let payload = completed("cs_1");
        let t = now();
        let good = sign_payload(SECRET, t, &payload);
        let good_sig = good.split_once("v1=").map(|(_, s)| s).unwrap_or_default();
        let header = format!("t={t},v1=deadbeef,v1={good_sig}");

        assert!(verifier().verify_and_parse(&payload, &header).is_ok());
    }

    #[test]
    fn missing_secret_rejects_everything() {
        let payload = completed("cs_1");
        let header = sign_payload(SECRET, now(), &payload);
        let verifier = WebhookVerifier::new(Some(String::new()));

        assert!(!verifier.is_configured());
        assert_eq!(
            verifier.verify_and_parse(&payload, &header),
            Err(WebhookError::SecretNotConfigured)
        );
    }

    #[test]
    fn signature_is_checked_before_parsing() {
        let payload = b"not json";
        assert!(matches!(
            verifier().verify_and_parse(payload, "t=1,v1=00"),
            Err(WebhookError::SignatureInvalid(_))
        ));

        let header = sign_payload(SECRET, now(), payload);
        assert!(matches!(
            verifier().verify_and_parse(payload, &header),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn decodes_expired_and_ignored_events() {
        let expired = br#"{"type":"checkout.session.expired","data":{"object":{"id":"cs_9"}}}"#;
        let header = sign_payload(SECRET, now(), expired);
        assert_eq!(
            verifier().verify_and_parse(expired, &header),
            Ok(WebhookEvent::SessionExpired {
                session_id: "cs_9".into()
            })
        );

        let other = br#"{"type":"payment_intent.created","data":{"object":{}}}"#;
        let header = sign_payload(SECRET, now(), other);
        let event = verifier().verify_and_parse(other, &header).unwrap();
        assert_eq!(
            event,
            WebhookEvent::Ignored {
                event_type: "payment_intent.created".into()
            }
        );
        assert_eq!(event.kind(), "ignored");
    }

    #[test]
    fn session_event_without_id_is_malformed() {
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#;
        let header = sign_payload(SECRET, now(), payload);
        assert!(matches!(
            verifier().verify_and_parse(payload, &header),
            Err(WebhookError::MalformedPayload(_))
        ));
    }
}
