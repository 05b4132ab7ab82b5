use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::sandbox::SandboxLedger;
use super::signature::{constant_time_eq, hmac_sha256_hex};
use super::{
    json_str, map_vendor_status, CaptureResult, CreateIntentRequest, IntentStatus, PaymentIntent,
    PaymentProvider, ProviderError, RefundRequest, RefundResult, WebhookEvent,
};
use crate::config::PaymentProviderKind;
use crate::entities::payment::PaymentStatus;

const SIGNATURE_HEADERS: &[&str] = &["stripe-signature", "x-stripe-signature"];

/// Stripe-style adapter. Intents carry a client secret for client-side
/// confirmation; webhooks are signed as `t=<unix>,v1=<hex>` over `t.body`.
pub struct StripeAdapter {
    ledger: SandboxLedger,
    webhook_secret: Option<String>,
    tolerance_secs: u64,
}

impl StripeAdapter {
    pub fn new(ledger: SandboxLedger, webhook_secret: Option<String>, tolerance_secs: u64) -> Self {
        Self {
            ledger,
            webhook_secret,
            tolerance_secs,
        }
    }

    /// Builds a header value the way Stripe would sign `body` at `timestamp`.
    pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> Option<String> {
        let ts = timestamp.to_string();
        let v1 = hmac_sha256_hex(secret, &[ts.as_bytes(), b".", body])?;
        Some(format!("t={},v1={}", ts, v1))
    }
}

fn parse_signature_header(header: &str) -> (Option<i64>, Vec<&str>) {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    (timestamp, candidates)
}

#[async_trait]
impl PaymentProvider for StripeAdapter {
    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Stripe
    }

    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ProviderError> {
        Ok(self
            .ledger
            .open_intent("stripe", &request, IntentStatus::RequiresCapture, true))
    }

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, ProviderError> {
        Ok(self.ledger.capture(intent_id))
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError> {
        Ok(self.ledger.refund("stripe", &request))
    }

    fn verify_webhook(&self, signature: Option<&str>, raw_body: &[u8]) -> bool {
        let (Some(secret), Some(header)) = (
            self.webhook_secret.as_deref().filter(|s| !s.is_empty()),
            signature,
        ) else {
            return false;
        };

        let (timestamp, candidates) = parse_signature_header(header);
        let Some(timestamp) = timestamp else {
            return false;
        };
        if (Utc::now().timestamp() - timestamp).unsigned_abs() > self.tolerance_secs {
            debug!(timestamp, "stripe signature outside tolerance window");
            return false;
        }

        let ts = timestamp.to_string();
        let Some(expected) = hmac_sha256_hex(secret, &[ts.as_bytes(), b".", raw_body]) else {
            return false;
        };
        candidates.iter().any(|c| constant_time_eq(&expected, c))
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        SIGNATURE_HEADERS
    }

    fn parse_webhook_event(&self, payload: &Value) -> Option<WebhookEvent> {
        let transaction_id = json_str(payload, &["data", "object", "id"])
            .or_else(|| json_str(payload, &["data", "intentId"]))
            .or_else(|| json_str(payload, &["data", "id"]))?;

        let status = match json_str(payload, &["data", "object", "status"])
            .or_else(|| json_str(payload, &["data", "status"]))
        {
            Some(raw) => map_vendor_status(raw)?,
            None => PaymentStatus::Succeeded,
        };

        Some(WebhookEvent {
            transaction_id: transaction_id.to_string(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter(secret: Option<&str>) -> StripeAdapter {
        StripeAdapter::new(SandboxLedger::default(), secret.map(String::from), 300)
    }

    #[test]
    fn accepts_fresh_signature() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = StripeAdapter::sign("whsec", Utc::now().timestamp(), body).unwrap();
        assert!(adapter(Some("whsec")).verify_webhook(Some(&header), body));
    }

    #[test]
    fn rejects_stale_tampered_or_unconfigured() {
        let body = br#"{"a":1}"#;
        let stale = StripeAdapter::sign("whsec", Utc::now().timestamp() - 3600, body).unwrap();
        assert!(!adapter(Some("whsec")).verify_webhook(Some(&stale), body));

        let fresh = StripeAdapter::sign("whsec", Utc::now().timestamp(), body).unwrap();
        assert!(!adapter(Some("whsec")).verify_webhook(Some(&fresh), br#"{"a":2}"#));
        assert!(!adapter(None).verify_webhook(Some(&fresh), body));
        assert!(!adapter(Some("whsec")).verify_webhook(None, body));
        assert!(!adapter(Some("whsec")).verify_webhook(Some("garbage"), body));
    }

    #[test]
    fn extracts_intent_and_status() {
        let svc = adapter(None);
        let nested = json!({"type": "x", "data": {"object": {"id": "pi_1", "status": "succeeded"}}});
        assert_eq!(
            svc.parse_webhook_event(&nested),
            Some(WebhookEvent {
                transaction_id: "pi_1".into(),
                status: PaymentStatus::Succeeded
            })
        );

        let flat = json!({"type": "x", "data": {"intentId": "pi_2", "status": "failed"}});
        assert_eq!(
            svc.parse_webhook_event(&flat).map(|e| e.status),
            Some(PaymentStatus::Failed)
        );

        let no_status = json!({"type": "x", "data": {"id": "pi_3"}});
        assert_eq!(
            svc.parse_webhook_event(&no_status).map(|e| e.status),
            Some(PaymentStatus::Succeeded)
        );

        assert_eq!(svc.parse_webhook_event(&json!({"type": "x"})), None);
    }

    #[tokio::test]
    async fn intents_carry_client_secret() {
        let svc = adapter(None);
        let intent = svc
            .create_payment_intent(CreateIntentRequest {
                amount: rust_decimal_macros::dec!(12.00),
                currency: "USD".into(),
                metadata: Default::default(),
            })
            .await
            .unwrap();
        assert!(intent.id.starts_with("stripe_pi_"));
        assert!(intent.client_secret.is_some());
        assert_eq!(intent.status, IntentStatus::RequiresCapture);
    }
}
