use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, Set};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use super::PaymentGateway;
use crate::entities::payment;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender, PaymentUpdateSource};
use crate::repositories::OrderRepository;

/// Body returned to the vendor for every verified delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

/// Applies vendor-pushed payment updates. Deliveries may arrive before or
/// after the synchronous capture, any number of times; each one is a plain
/// status overwrite keyed by the vendor transaction id.
#[derive(Clone)]
pub struct WebhookReconciler {
    gateway: PaymentGateway,
    orders: OrderRepository,
    event_sender: Arc<EventSender>,
}

impl WebhookReconciler {
    pub fn new(
        gateway: PaymentGateway,
        orders: OrderRepository,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            gateway,
            orders,
            event_sender,
        }
    }

    /// Header names the configured vendor signs with
    pub fn signature_headers(&self) -> &'static [&'static str] {
        self.gateway.provider().signature_headers()
    }

    #[instrument(skip(self, signature, raw_body), fields(provider = %self.gateway.provider_name()))]
    pub async fn reconcile(
        &self,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<WebhookAck, ServiceError> {
        let provider = self.gateway.provider_name();

        if !self.gateway.provider().verify_webhook(signature, raw_body) {
            warn!(
                signature_present = signature.is_some(),
                body_len = raw_body.len(),
                "rejecting webhook with invalid signature"
            );
            counter!("webhook_events_total", 1, "provider" => provider, "outcome" => "rejected");
            return Err(ServiceError::InvalidWebhookSignature);
        }

        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::BadRequest(format!("Webhook body is not JSON: {}", e)))?;

        let Some(event) = self.gateway.provider().parse_webhook_event(&payload) else {
            debug!("webhook carries no actionable payment update");
            counter!("webhook_events_total", 1, "provider" => provider, "outcome" => "ignored");
            return Ok(WebhookAck { received: true });
        };

        let Some(existing) = self
            .orders
            .find_payment_by_provider_transaction(&event.transaction_id)
            .await?
        else {
            info!(transaction_id = %event.transaction_id, "no payment for webhook transaction; dropping");
            counter!("webhook_events_total", 1, "provider" => provider, "outcome" => "unmatched");
            return Ok(WebhookAck { received: true });
        };

        if existing.status == event.status {
            debug!(payment_id = %existing.id, status = event.status.as_str(), "payment already in webhook status");
            counter!("webhook_events_total", 1, "provider" => provider, "outcome" => "unchanged");
            return Ok(WebhookAck { received: true });
        }

        let old_status = existing.status;
        let payment_id = existing.id;
        let mut active: payment::ActiveModel = existing.into();
        active.status = Set(event.status);
        active.updated_at = Set(Utc::now());
        active.update(self.orders.db()).await?;

        info!(
            %payment_id,
            old_status = old_status.as_str(),
            new_status = event.status.as_str(),
            "payment status reconciled from webhook"
        );
        counter!("webhook_events_total", 1, "provider" => provider, "outcome" => "applied");

        self.event_sender
            .send_or_log(Event::PaymentStatusChanged {
                payment_id,
                old_status: old_status.as_str().to_string(),
                new_status: event.status.as_str().to_string(),
                source: PaymentUpdateSource::Webhook,
            })
            .await;

        Ok(WebhookAck { received: true })
    }
}
