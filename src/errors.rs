use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Machine-readable error class, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Payment,
    Server,
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "category": "conflict",
    "message": "Insufficient stock: requested 3, available 1",
    "details": {"variant_id": "550e8400-e29b-41d4-a716-446655440000", "requested": 3, "available": 1},
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status reason (e.g., "Not Found", "Conflict")
    pub error: String,
    pub category: ErrorCategory,
    /// Human-readable error description
    pub message: String,
    /// Structured context, e.g. the available quantity on stock conflicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error was produced
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        variant_id: Option<Uuid>,
        requested: i32,
        available: i32,
    },

    #[error("Checkout blocked by risk policy (score {score})")]
    RiskRejected { score: i32 },

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Payment status unknown: {0}")]
    PaymentStatusUnknown(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Invalid webhook signature")]
    InvalidWebhookSignature,

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn insufficient_stock(variant_id: Option<Uuid>, requested: i32, available: i32) -> Self {
        ServiceError::InsufficientStock {
            variant_id,
            requested,
            available: available.max(0),
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::BadRequest(_)
            | Self::InvalidWebhookSignature => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::RiskRejected { .. } => StatusCode::FORBIDDEN,
            Self::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::PaymentStatusUnknown(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::BadRequest(_)
            | Self::InvalidWebhookSignature => ErrorCategory::Validation,
            Self::Conflict(_) | Self::InsufficientStock { .. } => ErrorCategory::Conflict,
            Self::RiskRejected { .. } => ErrorCategory::Forbidden,
            Self::PaymentFailed(_)
            | Self::PaymentStatusUnknown(_)
            | Self::ExternalServiceError(_) => ErrorCategory::Payment,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                ErrorCategory::Server
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::ExternalServiceError(_) => "Payment provider unavailable".to_string(),
            Self::PaymentStatusUnknown(_) => {
                "Payment status unknown; do not retry automatically".to_string()
            }
            _ => self.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::InsufficientStock {
                variant_id,
                requested,
                available,
            } => Some(json!({
                "variant_id": variant_id,
                "requested": requested,
                "available": available,
            })),
            Self::RiskRejected { score } => Some(json!({ "risk_score": score })),
            _ => None,
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database",
            Self::InternalError(_) => "internal",
            Self::Other(_) => "other",
            Self::ExternalServiceError(_) => "external_service",
            Self::PaymentStatusUnknown(_) => "payment_status_unknown",
            _ => "business",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.error_kind(), error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            category: self.category(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.category, ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn insufficient_stock_exposes_available_quantity() {
        let response = ServiceError::insufficient_stock(Some(Uuid::new_v4()), 3, 1).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["category"], "conflict");
        assert_eq!(payload["details"]["available"], 1);
        assert_eq!(payload["details"]["requested"], 3);
    }

    #[test]
    fn negative_availability_is_reported_as_zero() {
        match ServiceError::insufficient_stock(None, 2, -4) {
            ServiceError::InsufficientStock { available, .. } => assert_eq!(available, 0),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::RiskRejected { score: 90 }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::PaymentFailed("x".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ServiceError::PaymentStatusUnknown("x".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ServiceError::ExternalServiceError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::InvalidWebhookSignature.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn risk_rejection_is_distinct_category() {
        assert_eq!(
            ServiceError::RiskRejected { score: 70 }.category(),
            ErrorCategory::Forbidden
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        assert_eq!(
            ServiceError::InternalError("pool poisoned".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("syntax".into())).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::NotFound("Order not found".into()).response_message(),
            "Not found: Order not found"
        );
    }
}
