use async_trait::async_trait;
use serde_json::Value;

use super::sandbox::SandboxLedger;
use super::signature::verify_body_hmac;
use super::{
    json_str, map_vendor_status, CaptureResult, CreateIntentRequest, IntentStatus, PaymentIntent,
    PaymentProvider, ProviderError, RefundRequest, RefundResult, WebhookEvent,
};
use crate::config::PaymentProviderKind;

const SIGNATURE_HEADERS: &[&str] = &["x-pagarme-signature", "pagarme-signature"];

/// Pagar.me-style adapter. Intents wait for confirmation; webhook status
/// words follow the vendor's vocabulary ("paid", "refused", ...).
pub struct PagarmeAdapter {
    ledger: SandboxLedger,
    webhook_secret: Option<String>,
}

impl PagarmeAdapter {
    pub fn new(ledger: SandboxLedger, webhook_secret: Option<String>) -> Self {
        Self {
            ledger,
            webhook_secret,
        }
    }
}

#[async_trait]
impl PaymentProvider for PagarmeAdapter {
    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Pagarme
    }

    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ProviderError> {
        Ok(self
            .ledger
            .open_intent("pagarme", &request, IntentStatus::RequiresConfirmation, false))
    }

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, ProviderError> {
        Ok(self.ledger.capture(intent_id))
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError> {
        Ok(self.ledger.refund("pagarme", &request))
    }

    fn verify_webhook(&self, signature: Option<&str>, raw_body: &[u8]) -> bool {
        verify_body_hmac(self.webhook_secret.as_deref(), signature, raw_body)
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        SIGNATURE_HEADERS
    }

    fn parse_webhook_event(&self, payload: &Value) -> Option<WebhookEvent> {
        let transaction_id = json_str(payload, &["data", "id"])
            .or_else(|| json_str(payload, &["data", "transactionId"]))?;
        let status = map_vendor_status(json_str(payload, &["data", "status"]).unwrap_or("paid"))?;

        Some(WebhookEvent {
            transaction_id: transaction_id.to_string(),
            status,
        })
    }
}
