use crate::{
    entities::{
        order::{self, Entity as Order},
        order_item, payment, OrderStatus, Payment, PaymentMethod, PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender, PaymentUpdateSource},
    money::{format_amount, parse_amount, serialize_amount},
    repositories::{CatalogRepository, OrderRepository},
    services::{
        fulfillment::FulfillmentGateway,
        payments::{CaptureStatus, PaymentGateway, RefundRequest, RefundStatus},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Orders returned by the list endpoint
pub const ORDER_LIST_LIMIT: u64 = 100;
/// Orders per live-stream snapshot
pub const ORDER_STREAM_LIMIT: u64 = 50;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub status: OrderStatus,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String, example = "100.00")]
    pub subtotal: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String, example = "8.50")]
    pub tax_amount: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String, example = "10.00")]
    pub shipping_amount: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String, example = "118.50")]
    pub total: Decimal,
    pub currency: String,
    pub customer_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub fulfillment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderSummary {
    fn from(m: order::Model) -> Self {
        Self {
            id: m.id,
            status: m.status,
            subtotal: m.subtotal,
            tax_amount: m.tax_amount,
            shipping_amount: m.shipping_amount,
            total: m.total,
            currency: m.currency,
            customer_id: m.customer_id,
            invoice_number: m.invoice_number,
            fulfillment_id: m.fulfillment_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

impl From<order_item::Model> for OrderItemView {
    fn from(m: order_item::Model) -> Self {
        Self {
            id: m.id,
            product_id: m.product_id,
            variant_id: m.variant_id,
            quantity: m.quantity,
            unit_price: m.unit_price,
            total_price: m.total_price,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentView {
    pub id: Uuid,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String)]
    pub refunded_amount: Decimal,
    pub currency: String,
    pub provider: String,
    pub provider_transaction_id: String,
}

impl From<payment::Model> for PaymentView {
    fn from(m: payment::Model) -> Self {
        Self {
            id: m.id,
            status: m.status,
            method: m.method,
            amount: m.amount,
            refunded_amount: m.refunded_amount,
            currency: m.currency,
            provider: m.provider,
            provider_transaction_id: m.provider_transaction_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: OrderSummary,
    pub items: Vec<OrderItemView>,
    pub payment: Option<PaymentView>,
}

/// Compact row pushed on the live order stream
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderStreamEntry {
    pub id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CapturePaymentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CapturePaymentResponse {
    pub status: PaymentStatus,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RefundPaymentRequest {
    pub order_id: Uuid,
    /// Decimal string; omitted means a full refund
    #[schema(example = "25.00")]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundPaymentResponse {
    pub refund_id: String,
    pub status: RefundStatus,
    pub payment_status: PaymentStatus,
    /// Total refunded against the payment so far
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String, example = "10.00")]
    pub refunded_amount: Decimal,
}

/// Order reads and the post-checkout operations that move order and payment
/// state outside the checkout flow.
#[derive(Clone)]
pub struct OrderService {
    catalog: CatalogRepository,
    orders: OrderRepository,
    gateway: PaymentGateway,
    fulfillment: Arc<dyn FulfillmentGateway>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(
        catalog: CatalogRepository,
        orders: OrderRepository,
        gateway: PaymentGateway,
        fulfillment: Arc<dyn FulfillmentGateway>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            catalog,
            orders,
            gateway,
            fulfillment,
            event_sender,
        }
    }

    /// Newest first
    #[instrument(skip(self))]
    pub async fn list_orders(&self, store_slug: &str) -> Result<Vec<OrderSummary>, ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;
        Ok(self
            .orders
            .list_by_store(store.id, ORDER_LIST_LIMIT)
            .await?
            .into_iter()
            .map(OrderSummary::from)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        store_slug: &str,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;
        let order = self.load_order(store.id, order_id).await?;
        self.detail(order).await
    }

    /// Resolves a slug for the stream handler, which then polls
    /// [`OrderService::stream_snapshot`] by id.
    pub async fn resolve_store_id(&self, store_slug: &str) -> Result<Uuid, ServiceError> {
        Ok(self.catalog.require_store(store_slug).await?.id)
    }

    pub async fn stream_snapshot(
        &self,
        store_id: Uuid,
    ) -> Result<Vec<OrderStreamEntry>, ServiceError> {
        Ok(self
            .orders
            .list_by_store(store_id, ORDER_STREAM_LIMIT)
            .await?
            .into_iter()
            .map(|o| OrderStreamEntry {
                id: o.id,
                status: o.status,
                created_at: o.created_at,
            })
            .collect())
    }

    /// Re-runs capture for an order's payment. `succeeded` maps to
    /// SUCCEEDED, any other answer to FAILED. Payments with refunds
    /// recorded against them are never captured again.
    #[instrument(skip(self))]
    pub async fn capture_order_payment(
        &self,
        store_slug: &str,
        order_id: Uuid,
    ) -> Result<CapturePaymentResponse, ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;
        let order = self.load_order(store.id, order_id).await?;
        let payment = self.load_payment(order.id).await?;

        if payment.status == PaymentStatus::Refunded || payment.refunded_amount > Decimal::ZERO {
            return Err(ServiceError::InvalidOperation(
                "Payment has been refunded and cannot be captured again".to_string(),
            ));
        }

        let capture = self.gateway.capture(&payment.provider_transaction_id).await?;
        let new_status = match capture.status {
            CaptureStatus::Succeeded => PaymentStatus::Succeeded,
            _ => PaymentStatus::Failed,
        };

        let transaction_id = payment.provider_transaction_id.clone();
        self.set_payment_status(&payment, new_status, Decimal::ZERO, PaymentUpdateSource::Capture)
            .await?;

        Ok(CapturePaymentResponse {
            status: new_status,
            transaction_id,
        })
    }

    /// Refunds all or part of the refundable balance of a captured payment.
    /// `succeeded` maps to REFUNDED, any other answer to FAILED. Partial
    /// refunds accumulate in `refunded_amount`, so a REFUNDED payment keeps
    /// accepting refunds until the balance reaches zero.
    #[instrument(skip(self))]
    pub async fn refund_order_payment(
        &self,
        store_slug: &str,
        order_id: Uuid,
        amount: Option<&str>,
    ) -> Result<RefundPaymentResponse, ServiceError> {
        let amount = amount.map(parse_amount).transpose()?;
        let store = self.catalog.require_store(store_slug).await?;
        let order = self.load_order(store.id, order_id).await?;
        let payment = self.load_payment(order.id).await?;

        if !matches!(
            payment.status,
            PaymentStatus::Succeeded | PaymentStatus::Refunded
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment is {} and cannot be refunded",
                payment.status.as_str()
            )));
        }
        let refundable = payment.amount - payment.refunded_amount;
        if refundable <= Decimal::ZERO {
            return Err(ServiceError::InvalidOperation(
                "Payment has already been fully refunded".to_string(),
            ));
        }
        if let Some(amount) = amount {
            if amount <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Refund amount must be positive".to_string(),
                ));
            }
            if amount > refundable {
                return Err(ServiceError::ValidationError(format!(
                    "Refund amount exceeds the refundable balance of {}",
                    format_amount(refundable)
                )));
            }
        }
        let requested = amount.unwrap_or(refundable);

        let result = self
            .gateway
            .refund(RefundRequest {
                transaction_id: payment.provider_transaction_id.clone(),
                amount: Some(requested),
            })
            .await?;
        let (new_status, refunded) = match result.status {
            RefundStatus::Succeeded => (PaymentStatus::Refunded, requested),
            RefundStatus::Failed => (PaymentStatus::Failed, Decimal::ZERO),
        };
        self.set_payment_status(&payment, new_status, refunded, PaymentUpdateSource::Refund)
            .await?;

        Ok(RefundPaymentResponse {
            refund_id: result.id,
            status: result.status,
            payment_status: new_status,
            refunded_amount: payment.refunded_amount + refunded,
        })
    }

    /// PENDING -> INVOICED, recording the invoice number
    #[instrument(skip(self))]
    pub async fn issue_invoice(
        &self,
        store_slug: &str,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;
        let order = self.load_order(store.id, order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Order in status {} cannot be invoiced",
                order.status.as_str()
            )));
        }

        let invoice_number = self.fulfillment.issue_invoice(&order).await?;
        self.transition(
            &order,
            &[OrderStatus::Pending],
            OrderStatus::Invoiced,
            order::Column::InvoiceNumber,
            invoice_number,
        )
        .await?;

        let order = self.load_order(store.id, order_id).await?;
        self.detail(order).await
    }

    /// PENDING | INVOICED -> FULFILLMENT_READY, recording the fulfillment id
    #[instrument(skip(self))]
    pub async fn start_fulfillment(
        &self,
        store_slug: &str,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;
        let order = self.load_order(store.id, order_id).await?;
        let allowed = [OrderStatus::Pending, OrderStatus::Invoiced];
        if !allowed.contains(&order.status) {
            return Err(ServiceError::InvalidOperation(format!(
                "Order in status {} cannot start fulfillment",
                order.status.as_str()
            )));
        }

        let fulfillment_id = self.fulfillment.start_fulfillment(&order).await?;
        self.transition(
            &order,
            &allowed,
            OrderStatus::FulfillmentReady,
            order::Column::FulfillmentId,
            fulfillment_id,
        )
        .await?;

        let order = self.load_order(store.id, order_id).await?;
        self.detail(order).await
    }

    /// Conditional status move; losing a race to another transition is a
    /// conflict rather than a silent overwrite.
    async fn transition(
        &self,
        order: &order::Model,
        from: &[OrderStatus],
        to: OrderStatus,
        reference_column: order::Column,
        reference: String,
    ) -> Result<(), ServiceError> {
        let result = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(to))
            .col_expr(reference_column, Expr::value(reference))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.is_in(from.iter().copied()))
            .exec(self.orders.db())
            .await?;

        if result.rows_affected != 1 {
            warn!(order_id = %order.id, "order changed status concurrently");
            return Err(ServiceError::Conflict(
                "Order status changed concurrently".to_string(),
            ));
        }

        info!(order_id = %order.id, from = order.status.as_str(), to = to.as_str(), "order status changed");
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: order.status.as_str().to_string(),
                new_status: to.as_str().to_string(),
            })
            .await;
        Ok(())
    }

    /// Writes the new status and adds `refunded` to the running refund total
    /// in one statement, so concurrent refunds cannot overwrite each other.
    async fn set_payment_status(
        &self,
        payment: &payment::Model,
        new_status: PaymentStatus,
        refunded: Decimal,
        source: PaymentUpdateSource,
    ) -> Result<(), ServiceError> {
        let mut update = Payment::update_many()
            .col_expr(payment::Column::Status, Expr::value(new_status))
            .col_expr(payment::Column::UpdatedAt, Expr::value(Utc::now()));
        if refunded > Decimal::ZERO {
            update = update.col_expr(
                payment::Column::RefundedAmount,
                Expr::col(payment::Column::RefundedAmount).add(refunded),
            );
        }
        update
            .filter(payment::Column::Id.eq(payment.id))
            .exec(self.orders.db())
            .await?;

        let old_status = payment.status;
        if old_status != new_status {
            info!(payment_id = %payment.id, old = old_status.as_str(), new = new_status.as_str(), %source, "payment status changed");
            self.event_sender
                .send_or_log(Event::PaymentStatusChanged {
                    payment_id: payment.id,
                    old_status: old_status.as_str().to_string(),
                    new_status: new_status.as_str().to_string(),
                    source,
                })
                .await;
        }
        Ok(())
    }

    async fn load_order(&self, store_id: Uuid, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.orders
            .find_for_store(store_id, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn load_payment(&self, order_id: Uuid) -> Result<payment::Model, ServiceError> {
        self.orders
            .find_payment_for_order(order_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No payment recorded for order {}", order_id))
            })
    }

    async fn detail(&self, order: order::Model) -> Result<OrderDetail, ServiceError> {
        let items = self.orders.find_items(&order).await?;
        let payment = self.orders.find_payment_for_order(order.id).await?;
        Ok(OrderDetail {
            order: order.into(),
            items: items.into_iter().map(OrderItemView::from).collect(),
            payment: payment.map(PaymentView::from),
        })
    }
}
