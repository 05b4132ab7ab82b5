use crate::handlers::common::{
    cart_id_from_headers, created_response, require_cart_id, success_response, with_cart_id,
};
use crate::{
    errors::ServiceError,
    services::commerce::{AddToCartInput, UpdateCartItemInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

/// Cart routes, nested under `/stores/:store_slug`
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", post(get_or_create_cart))
        .route("/cart/items", post(add_to_cart))
        .route(
            "/cart/items/:item_id",
            put(update_cart_item).delete(remove_cart_item),
        )
        .route("/inventory/:variant_id", get(variant_inventory))
}

/// Resolve the caller's cart or open a new one
#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_slug}/cart",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("x-cart-id" = Option<String>, Header, description = "Existing cart id")
    ),
    responses(
        (status = 201, description = "Cart created", body = crate::services::commerce::CartView),
        (status = 200, description = "Existing cart", body = crate::services::commerce::CartView),
        (status = 400, description = "Unknown store", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn get_or_create_cart(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let cart_id = cart_id_from_headers(&headers)?;
    let (cart, created) = state
        .services
        .cart
        .get_or_create(&store_slug, cart_id)
        .await?;

    let id = cart.id;
    let response = if created {
        created_response(cart)
    } else {
        success_response(cart)
    };
    Ok(with_cart_id(response, id))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_slug}/cart/items",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("x-cart-id" = String, Header, description = "Cart id")
    ),
    request_body = AddToCartInput,
    responses(
        (status = 201, description = "Item added", body = crate::services::commerce::CartView),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart_id = require_cart_id(&headers)?;
    let cart = state
        .services
        .cart
        .add_item(&store_slug, cart_id, payload)
        .await?;
    Ok(created_response(cart))
}

#[utoipa::path(
    put,
    path = "/api/v1/stores/{store_slug}/cart/items/{item_id}",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("item_id" = Uuid, Path, description = "Cart line id"),
        ("x-cart-id" = String, Header, description = "Cart id")
    ),
    request_body = UpdateCartItemInput,
    responses(
        (status = 200, description = "Quantity updated", body = crate::services::commerce::CartView),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Path((store_slug, item_id)): Path<(String, Uuid)>,
    headers: HeaderMap,
    Json(payload): Json<UpdateCartItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart_id = require_cart_id(&headers)?;
    let cart = state
        .services
        .cart
        .update_item_quantity(&store_slug, cart_id, item_id, payload)
        .await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stores/{store_slug}/cart/items/{item_id}",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("item_id" = Uuid, Path, description = "Cart line id"),
        ("x-cart-id" = String, Header, description = "Cart id")
    ),
    responses(
        (status = 200, description = "Item removed", body = crate::services::commerce::CartView),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path((store_slug, item_id)): Path<(String, Uuid)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let cart_id = require_cart_id(&headers)?;
    let cart = state
        .services
        .cart
        .remove_item(&store_slug, cart_id, item_id)
        .await?;
    Ok(success_response(cart))
}

/// Live stock for a variant
#[utoipa::path(
    get,
    path = "/api/v1/stores/{store_slug}/inventory/{variant_id}",
    params(
        ("store_slug" = String, Path, description = "Store slug"),
        ("variant_id" = Uuid, Path, description = "Variant id")
    ),
    responses(
        (status = 200, description = "Current inventory", body = crate::services::commerce::cart_service::VariantInventory),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn variant_inventory(
    State(state): State<AppState>,
    Path((store_slug, variant_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let inventory = state
        .services
        .cart
        .variant_inventory(&store_slug, variant_id)
        .await?;
    Ok(success_response(inventory))
}
