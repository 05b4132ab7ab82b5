//! The all-or-nothing step that turns a PENDING checkout session into an
//! order.
//!
//! Everything runs inside one database transaction:
//!
//! 1. claim the session with a conditional `PENDING -> COMPLETED` update
//! 2. insert the order and one order item per cart line
//! 3. decrement stock for every line through the guarded update, in
//!    `variant_id` order so concurrent checkouts lock rows consistently
//! 4. flip the cart `OPEN -> CONVERTED`
//! 5. capture the payment intent
//! 6. insert the payment row and commit
//!
//! Any failure before commit rolls the transaction back, so neither the
//! order, its items, the stock decrements nor the session claim survive.
//! Capture is the only effect outside the database. When persisting after a
//! successful capture fails, the capture is refunded as compensation and the
//! session is failed, since its intent can no longer be captured.

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::cart_service::cart_lines;
use super::checkout_service::PaymentDetails;
use super::inventory_gate::reserve;
use crate::entities::commerce::{
    cart, checkout_session, Cart, CartStatus, CheckoutSession, CheckoutSessionModel,
    CheckoutSessionStatus,
};
use crate::entities::{order, order_item, payment, OrderStatus, PaymentMethod, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender, PaymentUpdateSource};
use crate::services::payments::{CaptureResult, CaptureStatus, PaymentGateway, RefundRequest};

/// What happens to the session after an aborted attempt
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionOutcome {
    StayPending,
    Fail(String),
}

struct Abort {
    error: ServiceError,
    session: SessionOutcome,
}

impl Abort {
    fn fail(error: ServiceError, reason: impl Into<String>) -> Self {
        Self {
            error,
            session: SessionOutcome::Fail(reason.into()),
        }
    }
}

impl From<ServiceError> for Abort {
    fn from(error: ServiceError) -> Self {
        Self {
            error,
            session: SessionOutcome::StayPending,
        }
    }
}

impl From<sea_orm::DbErr> for Abort {
    fn from(err: sea_orm::DbErr) -> Self {
        ServiceError::from(err).into()
    }
}

struct Staged {
    order: order::Model,
    items: Vec<order_item::Model>,
    capture: CaptureResult,
}

#[derive(Debug, Clone)]
pub struct MaterializedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub payment: payment::Model,
}

#[derive(Clone)]
pub struct OrderMaterializer {
    db: Arc<DatabaseConnection>,
    gateway: PaymentGateway,
    event_sender: Arc<EventSender>,
}

impl OrderMaterializer {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: PaymentGateway,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
        }
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn materialize(
        &self,
        session: &CheckoutSessionModel,
        payment: &PaymentDetails,
    ) -> Result<MaterializedOrder, ServiceError> {
        let txn = self.db.begin().await?;

        let staged = match self.stage(&txn, session, payment.token.as_deref()).await {
            Ok(staged) => staged,
            Err(abort) => {
                if let Err(err) = txn.rollback().await {
                    error!(error = %err, "rollback after aborted materialization failed");
                }
                return Err(self.settle_abort(session.id, abort).await);
            }
        };

        let intent_id = staged.capture.id.clone();
        let payment = match self
            .persist_payment(&txn, session, &staged, payment.method)
            .await
        {
            Ok(payment) => payment,
            Err(err) => {
                error!(error = %err, "persisting payment after capture failed");
                if let Err(rb) = txn.rollback().await {
                    error!(error = %rb, "rollback after payment persistence failure failed");
                }
                self.compensate(&intent_id).await;
                let abort = Abort::fail(err, "payment could not be recorded");
                return Err(self.settle_abort(session.id, abort).await);
            }
        };

        if let Err(err) = txn.commit().await {
            error!(error = %err, "commit of materialized order failed");
            self.compensate(&intent_id).await;
            let abort = Abort::fail(err.into(), "order could not be committed");
            return Err(self.settle_abort(session.id, abort).await);
        }

        counter!("orders_materialized_total", 1);
        info!(order_id = %staged.order.id, payment_id = %payment.id, total = %staged.order.total, "order materialized");
        self.publish(session, &staged, &payment).await;

        Ok(MaterializedOrder {
            order: staged.order,
            items: staged.items,
            payment,
        })
    }

    async fn stage(
        &self,
        txn: &DatabaseTransaction,
        session: &CheckoutSessionModel,
        token: Option<&str>,
    ) -> Result<Staged, Abort> {
        let claimed = CheckoutSession::update_many()
            .col_expr(
                checkout_session::Column::Status,
                Expr::value(CheckoutSessionStatus::Completed),
            )
            .col_expr(checkout_session::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(checkout_session::Column::Id.eq(session.id))
            .filter(checkout_session::Column::Status.eq(CheckoutSessionStatus::Pending))
            .exec(txn)
            .await?;
        if claimed.rows_affected != 1 {
            return Err(ServiceError::Conflict(
                "Checkout session is no longer pending".to_string(),
            )
            .into());
        }

        let cart = Cart::find_by_id(session.cart_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", session.cart_id)))?;

        let lines = cart_lines(txn, cart.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()).into());
        }
        let line_sum = lines
            .iter()
            .fold(Decimal::ZERO, |acc, l| acc + l.total_price);
        if line_sum != session.subtotal {
            return Err(Abort::fail(
                ServiceError::Conflict(
                    "Cart changed after the checkout session was created".to_string(),
                ),
                "cart changed after session creation",
            ));
        }

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(session.store_id),
            organization_id: Set(session.organization_id),
            customer_id: Set(cart.customer_id),
            checkout_session_id: Set(session.id),
            status: Set(OrderStatus::Pending),
            subtotal: Set(session.subtotal),
            tax_amount: Set(session.tax_amount),
            shipping_amount: Set(session.shipping_amount),
            total: Set(session.total),
            currency: Set(session.currency.clone()),
            invoice_number: Set(None),
            fulfillment_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.total_price),
                created_at: Set(now),
            }
            .insert(txn)
            .await?;
            items.push(item);
        }

        let mut reservations: Vec<(Uuid, i32)> = lines
            .iter()
            .filter_map(|l| l.variant_id.map(|variant_id| (variant_id, l.quantity)))
            .collect();
        reservations.sort_unstable_by_key(|(variant_id, _)| *variant_id);
        for (variant_id, quantity) in reservations {
            reserve(txn, variant_id, quantity).await?;
        }

        let converted = Cart::update_many()
            .col_expr(cart::Column::Status, Expr::value(CartStatus::Converted))
            .col_expr(cart::Column::UpdatedAt, Expr::value(now))
            .filter(cart::Column::Id.eq(cart.id))
            .filter(cart::Column::Status.eq(CartStatus::Open))
            .exec(txn)
            .await?;
        if converted.rows_affected != 1 {
            return Err(Abort::fail(
                ServiceError::Conflict("Cart has already been checked out".to_string()),
                "cart already converted",
            ));
        }

        let intent_id = session
            .payment_intent_id
            .as_deref()
            .or(token)
            .ok_or_else(|| {
                Abort::fail(
                    ServiceError::ValidationError(
                        "Checkout session has no payment intent and no payment token was given"
                            .to_string(),
                    ),
                    "missing payment intent",
                )
            })?;

        let capture = match self.gateway.capture(intent_id).await {
            Ok(capture) => capture,
            Err(err) => {
                let reason = match &err {
                    ServiceError::PaymentStatusUnknown(_) => "payment capture timed out",
                    _ => "payment provider error",
                };
                return Err(Abort::fail(err, reason));
            }
        };

        match capture.status {
            CaptureStatus::Succeeded => Ok(Staged {
                order,
                items,
                capture,
            }),
            CaptureStatus::RequiresAction => Err(ServiceError::PaymentFailed(
                "Payment requires additional customer action".to_string(),
            )
            .into()),
            CaptureStatus::Failed => Err(Abort::fail(
                ServiceError::PaymentFailed("Payment was declined".to_string()),
                "payment declined",
            )),
        }
    }

    async fn persist_payment(
        &self,
        txn: &DatabaseTransaction,
        session: &CheckoutSessionModel,
        staged: &Staged,
        method: PaymentMethod,
    ) -> Result<payment::Model, ServiceError> {
        let now = Utc::now();
        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(staged.order.id),
            amount: Set(staged.order.total),
            refunded_amount: Set(Decimal::ZERO),
            currency: Set(staged.order.currency.clone()),
            status: Set(PaymentStatus::Succeeded),
            method: Set(method),
            provider: Set(self.gateway.provider_name()),
            provider_transaction_id: Set(staged.capture.id.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        CheckoutSession::update_many()
            .col_expr(
                checkout_session::Column::PaymentIntentId,
                Expr::value(staged.capture.id.clone()),
            )
            .filter(checkout_session::Column::Id.eq(session.id))
            .exec(txn)
            .await?;

        Ok(payment)
    }

    async fn settle_abort(&self, session_id: Uuid, abort: Abort) -> ServiceError {
        let Abort { error, session } = abort;
        match session {
            SessionOutcome::StayPending => {
                warn!(error = %error, "materialization aborted; session left pending");
            }
            SessionOutcome::Fail(reason) => {
                warn!(error = %error, %reason, "materialization aborted; failing session");
                if let Err(err) = mark_session_failed(&*self.db, session_id, &reason).await {
                    error!(error = %err, "could not record session failure");
                }
                counter!("checkout_rejections_total", 1, "reason" => "payment");
                self.event_sender
                    .send_or_log(Event::CheckoutFailed { session_id, reason })
                    .await;
            }
        }
        error
    }

    async fn compensate(&self, intent_id: &str) {
        let outcome = self
            .gateway
            .refund(RefundRequest {
                transaction_id: intent_id.to_string(),
                amount: None,
            })
            .await;
        let succeeded = matches!(&outcome, Ok(r) if r.status == crate::services::payments::RefundStatus::Succeeded);
        if succeeded {
            warn!(%intent_id, "captured payment refunded after failed persistence");
        } else {
            error!(%intent_id, ?outcome, "compensating refund failed; manual follow-up required");
        }
        self.event_sender
            .send_or_log(Event::CompensatingRefundIssued {
                transaction_id: intent_id.to_string(),
                succeeded,
            })
            .await;
    }

    async fn publish(
        &self,
        session: &CheckoutSessionModel,
        staged: &Staged,
        payment: &payment::Model,
    ) {
        let order_id = staged.order.id;
        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        for item in &staged.items {
            if let Some(variant_id) = item.variant_id {
                self.event_sender
                    .send_or_log(Event::InventoryReserved {
                        variant_id,
                        quantity: item.quantity,
                        order_id,
                    })
                    .await;
            }
        }
        self.event_sender
            .send_or_log(Event::PaymentStatusChanged {
                payment_id: payment.id,
                old_status: PaymentStatus::Pending.as_str().to_string(),
                new_status: payment.status.as_str().to_string(),
                source: PaymentUpdateSource::Checkout,
            })
            .await;
        self.event_sender
            .send_or_log(Event::CheckoutCompleted {
                session_id: session.id,
                order_id,
            })
            .await;
    }
}

/// Conditional `PENDING -> FAILED`; a session that already left PENDING is
/// untouched.
pub async fn mark_session_failed<C: ConnectionTrait>(
    conn: &C,
    session_id: Uuid,
    reason: &str,
) -> Result<bool, ServiceError> {
    let result = CheckoutSession::update_many()
        .col_expr(
            checkout_session::Column::Status,
            Expr::value(CheckoutSessionStatus::Failed),
        )
        .col_expr(
            checkout_session::Column::FailureReason,
            Expr::value(reason.to_string()),
        )
        .col_expr(checkout_session::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(checkout_session::Column::Id.eq(session_id))
        .filter(checkout_session::Column::Status.eq(CheckoutSessionStatus::Pending))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}
