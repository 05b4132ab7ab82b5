use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront Checkout API

Carts, checkout sessions, order materialization and payment settlement for
multi-store commerce.

## Money

Every amount is a decimal string with two fractional digits (`"118.50"`).
Amounts are never sent as JSON numbers.

## Carts

Storefront clients keep the cart id returned by `POST /stores/{store_slug}/cart`
and send it back in the `x-cart-id` header.

## Error Handling

Errors share one body shape with a machine-readable `category`:

```json
{
  "error": "Conflict",
  "category": "conflict",
  "message": "Insufficient stock: requested 3, available 1",
  "details": {"variant_id": "...", "requested": 3, "available": 1},
  "timestamp": "2024-01-01T00:00:00Z"
}
```

A `504` with category `payment` means the provider's answer is unknown. Do
not retry it automatically.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "Cart", description = "Storefront cart endpoints"),
        (name = "Checkout", description = "Checkout session lifecycle"),
        (name = "Orders", description = "Order reads and fulfillment transitions"),
        (name = "Payments", description = "Capture, refund and vendor webhooks"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Cart
        crate::handlers::commerce::carts::get_or_create_cart,
        crate::handlers::commerce::carts::add_to_cart,
        crate::handlers::commerce::carts::update_cart_item,
        crate::handlers::commerce::carts::remove_cart_item,
        crate::handlers::commerce::carts::variant_inventory,

        // Checkout
        crate::handlers::commerce::checkout::create_checkout_session,
        crate::handlers::commerce::checkout::get_checkout_session,
        crate::handlers::commerce::checkout::complete_checkout,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::issue_invoice,
        crate::handlers::orders::start_fulfillment,
        crate::handlers::orders::orders_stream,

        // Payments
        crate::handlers::payments::capture_payment,
        crate::handlers::payments::refund_payment,
        crate::handlers::payment_webhooks::payment_webhook,

        // Health
        crate::handlers::health::health_check,
        crate::handlers::health::api_status,
    ),
    components(
        schemas(
            // Cart types
            crate::services::commerce::AddToCartInput,
            crate::services::commerce::UpdateCartItemInput,
            crate::services::commerce::CartView,
            crate::services::commerce::cart_service::CartLineView,
            crate::services::commerce::cart_service::VariantInventory,
            crate::entities::commerce::CartStatus,

            // Checkout types
            crate::services::commerce::ShippingAddress,
            crate::services::commerce::CreateCheckoutSessionInput,
            crate::services::commerce::CompleteCheckoutInput,
            crate::services::commerce::checkout_service::PaymentDetails,
            crate::services::commerce::checkout_service::CheckoutSessionCreated,
            crate::services::commerce::checkout_service::CheckoutSessionView,
            crate::services::commerce::checkout_service::CheckoutCompleted,
            crate::entities::commerce::CheckoutSessionStatus,

            // Order types
            crate::services::orders::OrderSummary,
            crate::services::orders::OrderItemView,
            crate::services::orders::OrderDetail,
            crate::services::orders::OrderStreamEntry,
            crate::services::orders::PaymentView,
            crate::entities::OrderStatus,

            // Payment types
            crate::services::orders::CapturePaymentRequest,
            crate::services::orders::CapturePaymentResponse,
            crate::services::orders::RefundPaymentRequest,
            crate::services::orders::RefundPaymentResponse,
            crate::services::payments::RefundStatus,
            crate::services::payments::WebhookAck,
            crate::entities::PaymentStatus,
            crate::entities::PaymentMethod,

            // Health types
            crate::handlers::health::HealthResponse,
            crate::handlers::health::StatusResponse,
            crate::handlers::health::ComponentHealth,
            crate::handlers::health::ComponentStatus,

            // Error types
            crate::errors::ErrorResponse,
            crate::errors::ErrorCategory
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_checkout_paths() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/stores/{store_slug}/checkout/complete"));
        assert!(json.contains("/webhooks/{provider}"));
        assert!(json.contains("ErrorResponse"));
    }
}
