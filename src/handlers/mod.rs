pub mod commerce;
pub mod common;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::repositories::{CatalogRepository, OrderRepository};
use crate::services::{
    commerce::{CartService, CheckoutService, OrderMaterializer, PricingService, RiskService},
    fulfillment::FulfillmentGateway,
    orders::OrderService,
    payments::{PaymentGateway, PaymentProvider, WebhookReconciler},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub reconciler: Arc<WebhookReconciler>,
}

impl AppServices {
    /// Wires every service around one provider adapter and one fulfillment
    /// collaborator. Tests pass doubles through the same constructor.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
        fulfillment: Arc<dyn FulfillmentGateway>,
    ) -> Self {
        let catalog = CatalogRepository::new(db.clone());
        let order_repository = OrderRepository::new(db.clone());
        let gateway = PaymentGateway::new(provider, config.payments.timeout());

        let cart = Arc::new(CartService::new(
            db.clone(),
            catalog.clone(),
            event_sender.clone(),
        ));

        let materializer =
            OrderMaterializer::new(db.clone(), gateway.clone(), event_sender.clone());
        let checkout = Arc::new(CheckoutService::new(
            db,
            catalog.clone(),
            PricingService::from_config(&config.shipping),
            RiskService::new(config.risk.clone()),
            gateway.clone(),
            materializer,
            event_sender.clone(),
            config.default_currency.clone(),
        ));

        let orders = Arc::new(OrderService::new(
            catalog,
            order_repository.clone(),
            gateway.clone(),
            fulfillment,
            event_sender.clone(),
        ));

        let reconciler = Arc::new(WebhookReconciler::new(
            gateway,
            order_repository,
            event_sender,
        ));

        Self {
            cart,
            checkout,
            orders,
            reconciler,
        }
    }
}
