use crate::errors::ServiceError;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the storefront cart id between requests
pub const CART_ID_HEADER: &str = "x-cart-id";

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Reads the optional cart id header. A present but malformed value is a
/// client error rather than a silent new cart.
pub fn cart_id_from_headers(headers: &HeaderMap) -> Result<Option<Uuid>, ServiceError> {
    match headers.get(CART_ID_HEADER) {
        None => Ok(None),
        Some(raw) => {
            let raw = raw
                .to_str()
                .map_err(|_| ServiceError::BadRequest("x-cart-id is not valid text".to_string()))?;
            Uuid::parse_str(raw.trim())
                .map(Some)
                .map_err(|_| ServiceError::BadRequest("x-cart-id must be a UUID".to_string()))
        }
    }
}

/// Cart id header for endpoints that operate on an existing cart
pub fn require_cart_id(headers: &HeaderMap) -> Result<Uuid, ServiceError> {
    cart_id_from_headers(headers)?
        .ok_or_else(|| ServiceError::BadRequest("x-cart-id header is required".to_string()))
}

/// Echoes the cart id so clients can persist it
pub fn with_cart_id(mut response: Response, cart_id: Uuid) -> Response {
    if let Ok(value) = HeaderValue::from_str(&cart_id.to_string()) {
        response.headers_mut().insert(CART_ID_HEADER, value);
    }
    response
}
