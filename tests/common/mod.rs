#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use storefront_api::{
    config::{AppConfig, PaymentProviderKind},
    db,
    entities::commerce::{
        product, product_variant, store, store_setting, tax_rate, ProductVariant,
        ProductVariantModel, StoreModel,
    },
    events::{self, EventSender},
    services::{
        commerce::{AddToCartInput, CompleteCheckoutInput, CreateCheckoutSessionInput},
        fulfillment::{FulfillmentGateway, ManualFulfillment},
        payments::{
            sandbox::SandboxLedger, stripe::StripeAdapter, CaptureResult, CaptureStatus,
            CreateIntentRequest, PaymentIntent, PaymentProvider, ProviderError, RefundRequest,
            RefundResult, WebhookEvent,
        },
    },
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
/// Provider timeout used by every test app
pub const PROVIDER_TIMEOUT_MS: u64 = 250;

/// How the scripted provider answers capture calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureScript {
    /// Defer to the sandbox ledger
    Ledger,
    Status(CaptureStatus),
    TransportError,
    /// Sleep past the gateway timeout
    Stall,
}

/// Test double injected through the same constructor the binary uses.
/// Intents, refunds and webhook handling go through a real Stripe-style
/// adapter; capture follows the current script.
pub struct ScriptedProvider {
    inner: StripeAdapter,
    capture_script: Mutex<CaptureScript>,
    fail_intents: AtomicBool,
    pub capture_calls: AtomicUsize,
    pub refund_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            inner: StripeAdapter::new(
                SandboxLedger::default(),
                Some(WEBHOOK_SECRET.to_string()),
                300,
            ),
            capture_script: Mutex::new(CaptureScript::Ledger),
            fail_intents: AtomicBool::new(false),
            capture_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
        }
    }

    pub fn script_capture(&self, script: CaptureScript) {
        *self.capture_script.lock().unwrap() = script;
    }

    pub fn fail_intents(&self, fail: bool) {
        self.fail_intents.store(fail, Ordering::SeqCst);
    }

    pub fn captures(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }

    pub fn refunds(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Stripe
    }

    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ProviderError> {
        if self.fail_intents.load(Ordering::SeqCst) {
            return Err(ProviderError::Transport("scripted outage".into()));
        }
        self.inner.create_payment_intent(request).await
    }

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, ProviderError> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        let script = *self.capture_script.lock().unwrap();
        match script {
            CaptureScript::Ledger => self.inner.capture_payment(intent_id).await,
            CaptureScript::Status(status) => Ok(CaptureResult {
                id: intent_id.to_string(),
                status,
            }),
            CaptureScript::TransportError => {
                Err(ProviderError::Transport("scripted capture failure".into()))
            }
            CaptureScript::Stall => {
                tokio::time::sleep(Duration::from_millis(PROVIDER_TIMEOUT_MS * 8)).await;
                self.inner.capture_payment(intent_id).await
            }
        }
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.refund(request).await
    }

    fn verify_webhook(&self, signature: Option<&str>, raw_body: &[u8]) -> bool {
        self.inner.verify_webhook(signature, raw_body)
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        self.inner.signature_headers()
    }

    fn parse_webhook_event(&self, payload: &Value) -> Option<WebhookEvent> {
        self.inner.parse_webhook_event(payload)
    }
}

/// Application over a fresh SQLite file, migrated, with the full router.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub provider: Arc<ScriptedProvider>,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_fulfillment(Arc::new(ManualFulfillment)).await
    }

    pub async fn with_fulfillment(fulfillment: Arc<dyn FulfillmentGateway>) -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for sqlite");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payments.timeout_ms = PROVIDER_TIMEOUT_MS;
        cfg.payments.stripe_webhook_secret = Some(WEBHOOK_SECRET.to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let provider = Arc::new(ScriptedProvider::new());
        let state = AppState::new(
            Arc::new(pool),
            cfg,
            EventSender::new(event_tx),
            provider.clone(),
            fulfillment,
        );
        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            provider,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    /// Send a request with optional JSON body and extra headers.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Raw-body POST, used for signed webhooks.
    pub async fn post_raw(&self, uri: &str, body: &[u8], headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_vec()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Store with USD settings and an 8.5% California rate.
    pub async fn seed_store(&self, slug: &str) -> StoreModel {
        let store = store::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(Uuid::new_v4()),
            slug: Set(slug.to_string()),
            name: Set(format!("Store {}", slug)),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed store");

        store_setting::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store.id),
            currency: Set("USD".to_string()),
        }
        .insert(self.db())
        .await
        .expect("seed store settings");

        self.seed_tax_rate(&store, "US", Some("CA"), Decimal::new(85, 1))
            .await;
        store
    }

    pub async fn seed_tax_rate(
        &self,
        store: &StoreModel,
        country: &str,
        state: Option<&str>,
        percentage: Decimal,
    ) {
        tax_rate::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store.id),
            country: Set(country.to_string()),
            state: Set(state.map(str::to_string)),
            percentage: Set(percentage),
        }
        .insert(self.db())
        .await
        .expect("seed tax rate");
    }

    pub async fn seed_variant(
        &self,
        store: &StoreModel,
        sku: &str,
        price: Decimal,
        stock: i32,
    ) -> ProductVariantModel {
        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store.id),
            name: Set(format!("Product {}", sku)),
            created_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed product");

        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            sku: Set(sku.to_string()),
            name: Set("Default".to_string()),
            price: Set(price),
            inventory_quantity: Set(stock),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed variant")
    }

    pub async fn stock_of(&self, variant_id: Uuid) -> i32 {
        ProductVariant::find_by_id(variant_id)
            .one(self.db())
            .await
            .expect("variant lookup")
            .expect("variant exists")
            .inventory_quantity
    }

    pub async fn set_stock(&self, variant_id: Uuid, quantity: i32) {
        let variant = ProductVariant::find_by_id(variant_id)
            .one(self.db())
            .await
            .expect("variant lookup")
            .expect("variant exists");
        let mut active: product_variant::ActiveModel = variant.into();
        active.inventory_quantity = Set(quantity);
        active.update(self.db()).await.expect("update stock");
    }

    /// Opens a cart through the service layer and fills it.
    pub async fn cart_with(&self, store_slug: &str, lines: &[(Uuid, i32)]) -> Uuid {
        let cart = &self.state.services.cart;
        let (view, _) = cart
            .get_or_create(store_slug, None)
            .await
            .expect("create cart");
        for (variant_id, quantity) in lines {
            cart.add_item(
                store_slug,
                view.id,
                AddToCartInput {
                    variant_id: *variant_id,
                    quantity: *quantity,
                },
            )
            .await
            .expect("add cart line");
        }
        view.id
    }

    /// Cart, session and completion through the services; returns the order id.
    pub async fn place_order(&self, store_slug: &str, lines: &[(Uuid, i32)]) -> Uuid {
        let cart_id = self.cart_with(store_slug, lines).await;
        let checkout = &self.state.services.checkout;
        let session = checkout
            .create_session(
                store_slug,
                cart_id,
                serde_json::from_value::<CreateCheckoutSessionInput>(
                    serde_json::json!({ "shipping_address": california_address() }),
                )
                .expect("session input"),
            )
            .await
            .expect("create checkout session");
        let completed = checkout
            .complete_session(
                store_slug,
                serde_json::from_value::<CompleteCheckoutInput>(serde_json::json!({
                    "session_id": session.session_id,
                    "payment": { "method": "card" }
                }))
                .expect("completion input"),
            )
            .await
            .expect("complete checkout");
        completed.order_id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Shipping address body for a California buyer
pub fn california_address() -> Value {
    serde_json::json!({
        "line1": "1 Market St",
        "city": "San Francisco",
        "state": "CA",
        "postal_code": "94105",
        "country": "US"
    })
}
