use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes without surfacing channel errors to the caller.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!("{}", err);
        }
    }
}

/// Domain events emitted by the checkout and settlement pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartCreated(Uuid),
    CartItemAdded { cart_id: Uuid, variant_id: Uuid },
    CartItemUpdated { cart_id: Uuid, item_id: Uuid },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },

    CheckoutStarted { cart_id: Uuid, session_id: Uuid },
    CheckoutCompleted { session_id: Uuid, order_id: Uuid },
    CheckoutFailed { session_id: Uuid, reason: String },

    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    InventoryReserved {
        variant_id: Uuid,
        quantity: i32,
        order_id: Uuid,
    },

    PaymentStatusChanged {
        payment_id: Uuid,
        old_status: String,
        new_status: String,
        source: PaymentUpdateSource,
    },
    CompensatingRefundIssued {
        transaction_id: String,
        succeeded: bool,
    },
}

/// Which path moved a payment's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentUpdateSource {
    Checkout,
    Capture,
    Refund,
    Webhook,
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");
    while let Some(event) = rx.recv().await {
        match &event {
            Event::CheckoutFailed { session_id, reason } => {
                warn!(%session_id, %reason, "checkout session failed");
            }
            Event::PaymentStatusChanged {
                payment_id,
                old_status,
                new_status,
                source,
            } => {
                info!(%payment_id, %old_status, %new_status, %source, "payment status changed");
            }
            Event::CompensatingRefundIssued {
                transaction_id,
                succeeded: false,
            } => {
                warn!(%transaction_id, "compensating refund did not succeed; manual follow-up required");
            }
            _ => info!(?event, "event received"),
        }
    }
    warn!("Event processing loop has ended");
}
