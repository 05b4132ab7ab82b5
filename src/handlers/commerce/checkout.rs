use crate::handlers::common::{created_response, require_cart_id, success_response};
use crate::{
    errors::ServiceError,
    services::commerce::{CompleteCheckoutInput, CreateCheckoutSessionInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

/// Checkout routes, nested under `/stores/:store_slug`
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/sessions", post(create_checkout_session))
        .route("/checkout/sessions/:session_id", get(get_checkout_session))
        .route("/checkout/complete", post(complete_checkout))
}

/// Price, risk-score and open a payment intent for the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_slug}/checkout/sessions",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("x-cart-id" = String, Header, description = "Cart id")
    ),
    request_body = CreateCheckoutSessionInput,
    responses(
        (status = 201, description = "Session created", body = crate::services::commerce::checkout_service::CheckoutSessionCreated),
        (status = 400, description = "Empty cart or invalid address", body = crate::errors::ErrorResponse),
        (status = 403, description = "Blocked by risk policy", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<CreateCheckoutSessionInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart_id = require_cart_id(&headers)?;
    let session = state
        .services
        .checkout
        .create_session(&store_slug, cart_id, payload)
        .await?;
    Ok(created_response(session))
}

#[utoipa::path(
    get,
    path = "/api/v1/stores/{store_slug}/checkout/sessions/{session_id}",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("session_id" = Uuid, Path, description = "Checkout session id")
    ),
    responses(
        (status = 200, description = "Session state", body = crate::services::commerce::checkout_service::CheckoutSessionView),
        (status = 404, description = "Session not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn get_checkout_session(
    State(state): State<AppState>,
    Path((store_slug, session_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .services
        .checkout
        .get_session(&store_slug, session_id)
        .await?;
    Ok(success_response(session))
}

/// Turn a PENDING session into an order with a captured payment
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_slug}/checkout/complete",
    params(("store_slug" = String, Path, description = "Store slug")),
    request_body = CompleteCheckoutInput,
    responses(
        (status = 201, description = "Order created", body = crate::services::commerce::checkout_service::CheckoutCompleted),
        (status = 402, description = "Payment declined or needs action", body = crate::errors::ErrorResponse),
        (status = 403, description = "Blocked by risk policy", body = crate::errors::ErrorResponse),
        (status = 409, description = "Stock conflict or session already settled", body = crate::errors::ErrorResponse),
        (status = 504, description = "Payment status unknown", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn complete_checkout(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
    Json(payload): Json<CompleteCheckoutInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let completed = state
        .services
        .checkout
        .complete_session(&store_slug, payload)
        .await?;
    Ok(created_response(completed))
}
