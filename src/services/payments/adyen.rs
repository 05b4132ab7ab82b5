use async_trait::async_trait;
use serde_json::Value;

use super::sandbox::SandboxLedger;
use super::signature::verify_body_hmac;
use super::{
    json_str, CaptureResult, CreateIntentRequest, IntentStatus, PaymentIntent, PaymentProvider,
    ProviderError, RefundRequest, RefundResult, WebhookEvent,
};
use crate::config::PaymentProviderKind;
use crate::entities::payment::PaymentStatus;

const SIGNATURE_HEADERS: &[&str] = &["x-adyen-signature", "adyen-signature"];

/// Adyen-style adapter: intents are authorised up front and wait for capture.
pub struct AdyenAdapter {
    ledger: SandboxLedger,
    hmac_key: Option<String>,
}

impl AdyenAdapter {
    pub fn new(ledger: SandboxLedger, hmac_key: Option<String>) -> Self {
        Self { ledger, hmac_key }
    }
}

#[async_trait]
impl PaymentProvider for AdyenAdapter {
    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Adyen
    }

    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ProviderError> {
        Ok(self
            .ledger
            .open_intent("adyen", &request, IntentStatus::RequiresCapture, false))
    }

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, ProviderError> {
        Ok(self.ledger.capture(intent_id))
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError> {
        Ok(self.ledger.refund("adyen", &request))
    }

    fn verify_webhook(&self, signature: Option<&str>, raw_body: &[u8]) -> bool {
        verify_body_hmac(self.hmac_key.as_deref(), signature, raw_body)
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        SIGNATURE_HEADERS
    }

    fn parse_webhook_event(&self, payload: &Value) -> Option<WebhookEvent> {
        let transaction_id = json_str(payload, &["data", "pspReference"])
            .or_else(|| json_str(payload, &["data", "paymentPspReference"]))
            .or_else(|| json_str(payload, &["data", "id"]))?;

        // A missing flag means success; string flags ("true"/"false") are
        // accepted too.
        let success = payload
            .get("success")
            .or_else(|| payload.get("data").and_then(|d| d.get("success")))
            .map(|v| match v {
                Value::Bool(b) => *b,
                Value::String(s) => s.eq_ignore_ascii_case("true"),
                _ => true,
            })
            .unwrap_or(true);

        Some(WebhookEvent {
            transaction_id: transaction_id.to_string(),
            status: if success {
                PaymentStatus::Succeeded
            } else {
                PaymentStatus::Failed
            },
        })
    }
}
