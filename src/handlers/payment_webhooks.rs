use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use std::str::FromStr;
use tracing::warn;

use crate::config::PaymentProviderKind;
use crate::{errors::ServiceError, AppState};

/// Vendor callback endpoint. The raw body is handed to the reconciler
/// untouched because the signature covers its exact bytes.
#[utoipa::path(
    post,
    path = "/webhooks/{provider}",
    params(("provider" = String, Path, description = "stripe, adyen or pagarme")),
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted", body = crate::services::payments::WebhookAck),
        (status = 400, description = "Invalid signature or payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Provider not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let configured = state.config.payments.provider;
    match PaymentProviderKind::from_str(&provider) {
        Ok(kind) if kind == configured => {}
        _ => {
            warn!(%provider, %configured, "webhook for a provider this process is not wired to");
            return Err(ServiceError::NotFound(format!(
                "No webhook endpoint for provider '{}'",
                provider
            )));
        }
    }

    let reconciler = &state.services.reconciler;
    let signature = reconciler
        .signature_headers()
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok());

    let ack = reconciler.reconcile(signature, &body).await?;
    Ok(Json(ack))
}
