//! Payment vendor abstraction.
//!
//! Every vendor is reached through [`PaymentProvider`]. The process builds one
//! adapter at startup ([`build_provider`]) and hands it, wrapped in a
//! [`PaymentGateway`], to the services that need it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{PaymentProviderKind, PaymentsConfig};
use crate::entities::payment::PaymentStatus;

pub mod adyen;
pub mod gateway;
pub mod pagarme;
pub mod reconciler;
pub mod sandbox;
mod signature;
pub mod stripe;

pub use gateway::PaymentGateway;
pub use reconciler::{WebhookAck, WebhookReconciler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIntentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresConfirmation,
    RequiresCapture,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaptureStatus {
    Succeeded,
    RequiresAction,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub id: String,
    pub status: CaptureStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub transaction_id: String,
    /// `None` refunds whatever was captured
    pub amount: Option<Decimal>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefundStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundResult {
    pub id: String,
    pub status: RefundStatus,
}

/// Vendor-neutral reading of a webhook payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub transaction_id: String,
    pub status: PaymentStatus,
}

/// Transport-level failure talking to a vendor. A vendor that answers with a
/// `failed` status is not an error.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Transport(String),
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

/// Vendor protocol translation only. Adapters never touch orders or stock.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> PaymentProviderKind;

    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ProviderError>;

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, ProviderError>;

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError>;

    /// Keyed MAC over the raw body. Returns false when no secret is configured.
    fn verify_webhook(&self, signature: Option<&str>, raw_body: &[u8]) -> bool;

    /// Header names carrying the signature, in lookup order
    fn signature_headers(&self) -> &'static [&'static str];

    fn parse_webhook_event(&self, payload: &Value) -> Option<WebhookEvent>;
}

/// Builds the configured adapter. Called once at startup.
pub fn build_provider(cfg: &PaymentsConfig) -> Arc<dyn PaymentProvider> {
    let ledger = sandbox::SandboxLedger::default();
    match cfg.provider {
        PaymentProviderKind::Stripe => Arc::new(stripe::StripeAdapter::new(
            ledger,
            cfg.stripe_webhook_secret.clone(),
            cfg.stripe_webhook_tolerance_secs,
        )),
        PaymentProviderKind::Adyen => Arc::new(adyen::AdyenAdapter::new(
            ledger,
            cfg.adyen_webhook_hmac_key.clone(),
        )),
        PaymentProviderKind::Pagarme => Arc::new(pagarme::PagarmeAdapter::new(
            ledger,
            cfg.pagarme_webhook_secret.clone(),
        )),
    }
}

/// Maps a vendor status word onto the payment row status. Unknown words yield
/// `None` so the event can be acknowledged and dropped.
pub(crate) fn map_vendor_status(raw: &str) -> Option<PaymentStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "succeeded" | "success" | "paid" | "captured" | "authorised" => {
            Some(PaymentStatus::Succeeded)
        }
        "failed" | "failure" | "refused" | "canceled" | "cancelled" => Some(PaymentStatus::Failed),
        "refunded" => Some(PaymentStatus::Refunded),
        "pending" | "processing" | "waiting_payment" => Some(PaymentStatus::Pending),
        _ => None,
    }
}

pub(crate) fn json_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("SUCCEEDED", Some(PaymentStatus::Succeeded))]
    #[case("paid", Some(PaymentStatus::Succeeded))]
    #[case(" authorised ", Some(PaymentStatus::Succeeded))]
    #[case("refunded", Some(PaymentStatus::Refunded))]
    #[case("refused", Some(PaymentStatus::Failed))]
    #[case("waiting_payment", Some(PaymentStatus::Pending))]
    #[case("requires_capture", None)]
    fn vendor_words_map_to_payment_status(
        #[case] raw: &str,
        #[case] expected: Option<PaymentStatus>,
    ) {
        assert_eq!(map_vendor_status(raw), expected);
    }

    #[test]
    fn json_path_lookup() {
        let payload = json!({"data": {"object": {"id": "pi_1"}, "id": ""}});
        assert_eq!(json_str(&payload, &["data", "object", "id"]), Some("pi_1"));
        assert_eq!(json_str(&payload, &["data", "id"]), None);
        assert_eq!(json_str(&payload, &["missing"]), None);
    }

    #[test]
    fn configured_kind_is_built() {
        let cfg = PaymentsConfig {
            provider: PaymentProviderKind::Pagarme,
            ..PaymentsConfig::default()
        };
        assert_eq!(build_provider(&cfg).kind(), PaymentProviderKind::Pagarme);
        assert_eq!(
            build_provider(&PaymentsConfig::default()).kind(),
            PaymentProviderKind::Stripe
        );
    }
}
