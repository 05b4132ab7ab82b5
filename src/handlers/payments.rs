use crate::errors::ServiceError;
use crate::handlers::common::created_response;
use crate::services::orders::{CapturePaymentRequest, RefundPaymentRequest};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::post,
    Router,
};

/// Post-checkout payment operations, nested under `/stores/:store_slug`
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments/capture", post(capture_payment))
        .route("/payments/refund", post(refund_payment))
}

/// Re-run capture for an order's payment
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_slug}/payments/capture",
    params(("store_slug" = String, Path, description = "Store slug")),
    request_body = CapturePaymentRequest,
    responses(
        (status = 201, description = "Capture attempted", body = crate::services::orders::CapturePaymentResponse),
        (status = 404, description = "Order or payment not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = crate::errors::ErrorResponse),
        (status = 504, description = "Payment status unknown", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn capture_payment(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
    Json(payload): Json<CapturePaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .services
        .orders
        .capture_order_payment(&store_slug, payload.order_id)
        .await?;
    Ok(created_response(result))
}

/// Refund all or part of an order's captured payment
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_slug}/payments/refund",
    params(("store_slug" = String, Path, description = "Store slug")),
    request_body = RefundPaymentRequest,
    responses(
        (status = 201, description = "Refund attempted", body = crate::services::orders::RefundPaymentResponse),
        (status = 400, description = "Payment not refundable or amount out of range", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or payment not found", body = crate::errors::ErrorResponse),
        (status = 504, description = "Payment status unknown", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
    Json(payload): Json<RefundPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .services
        .orders
        .refund_order_payment(&store_slug, payload.order_id, payload.amount.as_deref())
        .await?;
    Ok(created_response(result))
}
