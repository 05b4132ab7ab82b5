//! Storefront API Library
//!
//! Checkout orchestration and payment settlement for a multi-store commerce
//! backend: carts, priced and risk-scored checkout sessions, atomic order
//! materialization, and vendor webhook reconciliation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod money;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::services::{fulfillment::FulfillmentGateway, payments::PaymentProvider};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// The provider adapter and fulfillment collaborator are built by the
    /// caller, once, and injected here.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
        provider: Arc<dyn PaymentProvider>,
        fulfillment: Arc<dyn FulfillmentGateway>,
    ) -> Self {
        let event_sender = Arc::new(event_sender);
        let services = handlers::AppServices::new(
            db.clone(),
            &config,
            event_sender.clone(),
            provider,
            fulfillment,
        );
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Versioned API surface, mounted at `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    let store_routes = Router::new()
        .merge(handlers::commerce::carts_routes())
        .merge(handlers::commerce::checkout_routes())
        .merge(handlers::orders::orders_routes())
        .merge(handlers::payments::payment_routes());

    Router::new()
        // Status and health endpoints
        .route("/status", get(handlers::health::api_status))
        .route("/health", get(handlers::health::health_check))
        // Storefront, checkout, order and payment operations per store
        .nest("/stores/:store_slug", store_routes)
}

/// Full HTTP application: API, vendor webhooks, OpenAPI document and the
/// shared middleware stack.
pub fn app_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(|| async { "storefront-api up" }))
        .nest("/api/v1", api_v1_routes())
        // Vendor callbacks carry no auth; the signature is the credential
        .route(
            "/webhooks/:provider",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .merge(openapi::openapi_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

/// Explicit origins when configured, permissive otherwise
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured_origins {
        Some(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        None => {
            ::tracing::info!("Using permissive CORS because no origins were configured");
            CorsLayer::permissive()
        }
    }
}

pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::money::*;
    pub use crate::AppState;
}
