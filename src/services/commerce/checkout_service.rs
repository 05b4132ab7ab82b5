use crate::{
    entities::{
        commerce::{
            cart, checkout_session, Cart, CartStatus, CheckoutSession, CheckoutSessionModel,
            CheckoutSessionStatus,
        },
        PaymentMethod,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::serialize_amount,
    repositories::CatalogRepository,
    services::payments::{CreateIntentRequest, PaymentGateway},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::cart_service::cart_lines;
use super::inventory_gate::{ensure_available, StockRequirement};
use super::order_materializer::{mark_session_failed, OrderMaterializer};
use super::pricing_service::{Destination, PricingService};
use super::risk_service::{RiskContext, RiskService};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    /// ISO 3166-1 alpha-2
    #[validate(length(equal = 2))]
    pub country: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateCheckoutSessionInput {
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate]
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    /// Client-side confirmation token. Used as the intent to capture when
    /// the session carries no intent id of its own.
    #[validate(length(min = 1, max = 500))]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CompleteCheckoutInput {
    pub session_id: Uuid,
    #[validate]
    pub payment: PaymentDetails,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSessionCreated {
    pub session_id: Uuid,
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
    pub risk_score: i32,
    pub payment_intent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSessionView {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub status: CheckoutSessionStatus,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String)]
    pub tax_amount: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String)]
    pub shipping_amount: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String)]
    pub total: Decimal,
    pub currency: String,
    pub risk_score: i32,
    pub payment_intent_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CheckoutSessionModel> for CheckoutSessionView {
    fn from(m: CheckoutSessionModel) -> Self {
        Self {
            id: m.id,
            cart_id: m.cart_id,
            status: m.status,
            subtotal: m.subtotal,
            tax_amount: m.tax_amount,
            shipping_amount: m.shipping_amount,
            total: m.total,
            currency: m.currency,
            risk_score: m.risk_score,
            payment_intent_id: m.payment_intent_id,
            failure_reason: m.failure_reason,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutCompleted {
    pub order_id: Uuid,
    pub payment_id: Uuid,
}

/// Checkout session lifecycle: `PENDING -> COMPLETED | FAILED`.
///
/// Creation prices and risk-scores the cart and opens a payment intent.
/// Completion re-checks risk against the stored snapshot and hands the
/// session to the [`OrderMaterializer`].
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    catalog: CatalogRepository,
    pricing: PricingService,
    risk: RiskService,
    gateway: PaymentGateway,
    materializer: OrderMaterializer,
    event_sender: Arc<EventSender>,
    default_currency: String,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: CatalogRepository,
        pricing: PricingService,
        risk: RiskService,
        gateway: PaymentGateway,
        materializer: OrderMaterializer,
        event_sender: Arc<EventSender>,
        default_currency: String,
    ) -> Self {
        Self {
            db,
            catalog,
            pricing,
            risk,
            gateway,
            materializer,
            event_sender,
            default_currency,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_session(
        &self,
        store_slug: &str,
        cart_id: Uuid,
        input: CreateCheckoutSessionInput,
    ) -> Result<CheckoutSessionCreated, ServiceError> {
        input.validate()?;
        let store = self.catalog.require_store(store_slug).await?;

        let cart = Cart::find_by_id(cart_id)
            .filter(cart::Column::StoreId.eq(store.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;
        if cart.status != CartStatus::Open {
            return Err(ServiceError::InvalidOperation(
                "Cart has already been checked out".to_string(),
            ));
        }

        let lines = cart_lines(&*self.db, cart.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let requirements: Vec<StockRequirement> = lines
            .iter()
            .filter_map(|l| {
                l.variant_id.map(|variant_id| StockRequirement {
                    variant_id,
                    quantity: l.quantity,
                })
            })
            .collect();
        if let Err(err) = ensure_available(&*self.db, &requirements).await {
            counter!("checkout_rejections_total", 1, "reason" => "inventory");
            return Err(err);
        }

        let address = &input.shipping_address;
        let country = address.country.trim().to_uppercase();
        let state = address
            .state
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let destination = Destination {
            country: &country,
            state,
        };

        let currency = self
            .catalog
            .find_store_setting(store.id)
            .await?
            .map(|s| s.currency)
            .unwrap_or_else(|| self.default_currency.clone());
        let rate = self.catalog.find_tax_rate(store.id, &country, state).await?;
        let breakdown = self
            .pricing
            .price(lines.iter().map(|l| l.total_price), destination, rate);

        let item_count: i32 = lines.iter().map(|l| l.quantity).sum();
        let customer_email = input
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let risk_score = self.risk.compute_score(&RiskContext {
            subtotal: breakdown.subtotal,
            shipping_country: &country,
            customer_email,
            item_count,
        });
        if self.risk.is_high_risk(risk_score) {
            warn!(%cart_id, risk_score, threshold = self.risk.threshold(), "checkout blocked by risk policy");
            counter!("checkout_rejections_total", 1, "reason" => "risk");
            return Err(ServiceError::RiskRejected { score: risk_score });
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("store_id".to_string(), store.id.to_string());
        metadata.insert("cart_id".to_string(), cart.id.to_string());
        let intent = self
            .gateway
            .create_intent(CreateIntentRequest {
                amount: breakdown.total,
                currency: currency.clone(),
                metadata,
            })
            .await?;

        let now = Utc::now();
        let session = checkout_session::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store.id),
            organization_id: Set(store.organization_id),
            cart_id: Set(cart.id),
            status: Set(CheckoutSessionStatus::Pending),
            subtotal: Set(breakdown.subtotal),
            tax_amount: Set(breakdown.tax_amount),
            shipping_amount: Set(breakdown.shipping_amount),
            total: Set(breakdown.total),
            currency: Set(currency.clone()),
            risk_score: Set(risk_score),
            item_count: Set(item_count),
            customer_email: Set(customer_email.map(str::to_string)),
            line1: Set(address.line1.trim().to_string()),
            line2: Set(address.line2.clone()),
            city: Set(address.city.trim().to_string()),
            state: Set(state.map(str::to_string)),
            postal_code: Set(address.postal_code.trim().to_string()),
            country: Set(country.clone()),
            payment_intent_id: Set(Some(intent.id.clone())),
            failure_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        counter!("checkout_sessions_created_total", 1);
        info!(session_id = %session.id, %cart_id, total = %session.total, risk_score, "checkout session created");
        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                cart_id: cart.id,
                session_id: session.id,
            })
            .await;

        Ok(CheckoutSessionCreated {
            session_id: session.id,
            subtotal: session.subtotal,
            tax_amount: session.tax_amount,
            shipping_amount: session.shipping_amount,
            total: session.total,
            currency,
            risk_score,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_session(
        &self,
        store_slug: &str,
        session_id: Uuid,
    ) -> Result<CheckoutSessionView, ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;
        Ok(self.load_session(store.id, session_id).await?.into())
    }

    /// Completes a PENDING session. Policy for rejected completions:
    /// a stock shortfall keeps the session PENDING so it can be retried
    /// after a restock, a risk rejection fails it for good. Stock is
    /// checked first, so a session short on stock is never failed for risk.
    #[instrument(skip(self, input), fields(session_id = %input.session_id))]
    pub async fn complete_session(
        &self,
        store_slug: &str,
        input: CompleteCheckoutInput,
    ) -> Result<CheckoutCompleted, ServiceError> {
        input.validate()?;
        let store = self.catalog.require_store(store_slug).await?;
        let session = self.load_session(store.id, input.session_id).await?;

        if session.status != CheckoutSessionStatus::Pending {
            warn!(status = ?session.status, "completion attempted on settled session");
            return Err(ServiceError::Conflict(format!(
                "Checkout session is {}",
                match session.status {
                    CheckoutSessionStatus::Completed => "already completed",
                    _ => "no longer pending",
                }
            )));
        }

        let requirements: Vec<StockRequirement> = cart_lines(&*self.db, session.cart_id)
            .await?
            .iter()
            .filter_map(|l| {
                l.variant_id.map(|variant_id| StockRequirement {
                    variant_id,
                    quantity: l.quantity,
                })
            })
            .collect();
        if let Err(err) = ensure_available(&*self.db, &requirements).await {
            warn!(error = %err, "completion blocked by stock; session left pending");
            counter!("checkout_rejections_total", 1, "reason" => "inventory");
            return Err(err);
        }

        let risk_score = self.risk.compute_score(&RiskContext {
            subtotal: session.subtotal,
            shipping_country: &session.country,
            customer_email: session.customer_email.as_deref(),
            item_count: session.item_count,
        });
        if self.risk.is_high_risk(risk_score) {
            warn!(risk_score, "completion blocked by risk policy");
            counter!("checkout_rejections_total", 1, "reason" => "risk");
            if mark_session_failed(&*self.db, session.id, "blocked by risk policy").await? {
                self.event_sender
                    .send_or_log(Event::CheckoutFailed {
                        session_id: session.id,
                        reason: "blocked by risk policy".to_string(),
                    })
                    .await;
            }
            return Err(ServiceError::RiskRejected { score: risk_score });
        }

        let materialized = match self
            .materializer
            .materialize(&session, &input.payment)
            .await
        {
            Ok(materialized) => materialized,
            Err(err @ ServiceError::InsufficientStock { .. }) => {
                counter!("checkout_rejections_total", 1, "reason" => "inventory");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        Ok(CheckoutCompleted {
            order_id: materialized.order.id,
            payment_id: materialized.payment.id,
        })
    }

    async fn load_session(
        &self,
        store_id: Uuid,
        session_id: Uuid,
    ) -> Result<CheckoutSessionModel, ServiceError> {
        CheckoutSession::find_by_id(session_id)
            .filter(checkout_session::Column::StoreId.eq(store_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Checkout session {} not found", session_id))
            })
    }
}
