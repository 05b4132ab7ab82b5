use metrics::counter;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use super::{
    CaptureResult, CreateIntentRequest, PaymentIntent, PaymentProvider, ProviderError,
    RefundRequest, RefundResult,
};
use crate::errors::ServiceError;

/// Timeout and error policy around the configured [`PaymentProvider`].
///
/// Intent creation happens before anything is persisted, so any failure there
/// is a plain upstream error. For capture and refund a timeout leaves the
/// vendor-side outcome unknown, which is reported as
/// [`ServiceError::PaymentStatusUnknown`] instead of being guessed.
#[derive(Clone)]
pub struct PaymentGateway {
    provider: Arc<dyn PaymentProvider>,
    timeout: Duration,
}

enum CallFailure {
    TimedOut,
    Provider(ProviderError),
}

impl PaymentGateway {
    pub fn new(provider: Arc<dyn PaymentProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider(&self) -> &dyn PaymentProvider {
        self.provider.as_ref()
    }

    pub fn provider_name(&self) -> String {
        self.provider.kind().to_string()
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, CallFailure>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let outcome = match timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CallFailure::Provider(err)),
            Err(_) => Err(CallFailure::TimedOut),
        };
        let label = match &outcome {
            Ok(_) => "ok",
            Err(CallFailure::TimedOut) => "timeout",
            Err(CallFailure::Provider(_)) => "error",
        };
        counter!(
            "payment_provider_calls_total",
            1,
            "provider" => self.provider_name(),
            "operation" => operation,
            "outcome" => label
        );
        outcome
    }

    #[instrument(skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
    pub async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        match self
            .call("create_intent", self.provider.create_payment_intent(request))
            .await
        {
            Ok(intent) => {
                info!(intent_id = %intent.id, status = ?intent.status, "payment intent created");
                Ok(intent)
            }
            Err(CallFailure::TimedOut) => {
                error!(timeout = ?self.timeout, "payment intent creation timed out");
                Err(ServiceError::ExternalServiceError(
                    "Payment provider timed out creating the intent".to_string(),
                ))
            }
            Err(CallFailure::Provider(err)) => {
                error!(error = %err, "payment intent creation failed");
                Err(ServiceError::ExternalServiceError(err.to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn capture(&self, intent_id: &str) -> Result<CaptureResult, ServiceError> {
        match self
            .call("capture", self.provider.capture_payment(intent_id))
            .await
        {
            Ok(result) => {
                info!(status = %result.status, "capture answered");
                Ok(result)
            }
            Err(CallFailure::TimedOut) => {
                error!(timeout = ?self.timeout, "capture timed out; outcome unknown");
                Err(ServiceError::PaymentStatusUnknown(format!(
                    "Capture of {} did not complete in time",
                    intent_id
                )))
            }
            Err(CallFailure::Provider(err)) => {
                error!(error = %err, "capture failed");
                Err(ServiceError::ExternalServiceError(err.to_string()))
            }
        }
    }

    #[instrument(skip(self, request), fields(transaction_id = %request.transaction_id))]
    pub async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ServiceError> {
        let transaction_id = request.transaction_id.clone();
        match self.call("refund", self.provider.refund(request)).await {
            Ok(result) => {
                info!(refund_id = %result.id, status = %result.status, "refund answered");
                Ok(result)
            }
            Err(CallFailure::TimedOut) => {
                error!(timeout = ?self.timeout, "refund timed out; outcome unknown");
                Err(ServiceError::PaymentStatusUnknown(format!(
                    "Refund of {} did not complete in time",
                    transaction_id
                )))
            }
            Err(CallFailure::Provider(err)) => {
                warn!(error = %err, "refund failed");
                Err(ServiceError::ExternalServiceError(err.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGateway")
            .field("provider", &self.provider_name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
