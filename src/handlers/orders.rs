use axum::{
    extract::{Path, State},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Router,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use std::{convert::Infallible, time::Duration};
use tokio::time::MissedTickBehavior;
use tracing::warn;
use uuid::Uuid;

use crate::handlers::common::{created_response, success_response};
use crate::services::orders::OrderStreamEntry;
use crate::{errors::ServiceError, AppState};

/// Interval between live order snapshots
pub const ORDER_STREAM_INTERVAL: Duration = Duration::from_secs(5);

/// Order routes, nested under `/stores/:store_slug`
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/stream", get(orders_stream))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/invoice", post(issue_invoice))
        .route("/orders/:order_id/fulfillment", post(start_fulfillment))
}

#[utoipa::path(
    get,
    path = "/api/v1/stores/{store_slug}/orders",
    params(("store_slug" = String, Path, description = "Store slug")),
    responses(
        (status = 200, description = "Newest orders first", body = [crate::services::orders::OrderSummary]),
        (status = 400, description = "Unknown store", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_orders(&store_slug).await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/stores/{store_slug}/orders/{order_id}",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("order_id" = Uuid, Path, description = "Order id")
    ),
    responses(
        (status = 200, description = "Order with items and payment", body = crate::services::orders::OrderDetail),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path((store_slug, order_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_order(&store_slug, order_id)
        .await?;
    Ok(success_response(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_slug}/orders/{order_id}/invoice",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("order_id" = Uuid, Path, description = "Order id")
    ),
    responses(
        (status = 201, description = "Invoice issued", body = crate::services::orders::OrderDetail),
        (status = 400, description = "Order is past invoicing", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent status change", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn issue_invoice(
    State(state): State<AppState>,
    Path((store_slug, order_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .issue_invoice(&store_slug, order_id)
        .await?;
    Ok(created_response(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_slug}/orders/{order_id}/fulfillment",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("order_id" = Uuid, Path, description = "Order id")
    ),
    responses(
        (status = 201, description = "Fulfillment started", body = crate::services::orders::OrderDetail),
        (status = 400, description = "Order already in fulfillment", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent status change", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn start_fulfillment(
    State(state): State<AppState>,
    Path((store_slug, order_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .start_fulfillment(&store_slug, order_id)
        .await?;
    Ok(created_response(order))
}

#[derive(Serialize)]
struct OrdersSnapshot<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    orders: &'a [OrderStreamEntry],
}

/// Server-sent events: a snapshot of the most recent orders immediately,
/// then every [`ORDER_STREAM_INTERVAL`] until the client disconnects.
#[utoipa::path(
    get,
    path = "/api/v1/stores/{store_slug}/orders/stream",
    params(("store_slug" = String, Path, description = "Store slug")),
    responses(
        (status = 200, description = "text/event-stream of order snapshots"),
        (status = 400, description = "Unknown store", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn orders_stream(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServiceError> {
    let store_id = state.services.orders.resolve_store_id(&store_slug).await?;
    let orders = state.services.orders.clone();

    let mut ticker = tokio::time::interval(ORDER_STREAM_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let events = stream::unfold((orders, ticker), move |(orders, mut ticker)| async move {
        ticker.tick().await;
        let event = match orders.stream_snapshot(store_id).await {
            Ok(entries) => SseEvent::default()
                .event("orders:update")
                .json_data(OrdersSnapshot {
                    kind: "orders:update",
                    orders: &entries,
                })
                .unwrap_or_else(|err| {
                    warn!(%store_id, error = %err, "failed to encode order snapshot");
                    SseEvent::default().comment("snapshot unavailable")
                }),
            Err(err) => {
                warn!(%store_id, error = %err, "order snapshot query failed");
                SseEvent::default().comment("snapshot unavailable")
            }
        };
        Some((Ok(event), (orders, ticker)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
