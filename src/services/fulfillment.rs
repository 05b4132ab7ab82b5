use async_trait::async_trait;
use chrono::Utc;

use crate::entities::order;
use crate::errors::ServiceError;
use crate::services::payments::sandbox::random_hex;

/// Outbound boundary to invoicing and logistics systems. Implementations
/// return the external reference the order should record.
#[async_trait]
pub trait FulfillmentGateway: Send + Sync {
    async fn issue_invoice(&self, order: &order::Model) -> Result<String, ServiceError>;

    async fn start_fulfillment(&self, order: &order::Model) -> Result<String, ServiceError>;
}

/// Default collaborator: mints references locally and performs no external
/// work. Stores that fulfil by hand use these references on their paperwork.
#[derive(Debug, Clone, Default)]
pub struct ManualFulfillment;

#[async_trait]
impl FulfillmentGateway for ManualFulfillment {
    async fn issue_invoice(&self, order: &order::Model) -> Result<String, ServiceError> {
        let short = order.id.simple().to_string();
        Ok(format!(
            "INV-{}-{}",
            Utc::now().format("%Y%m%d"),
            short[..8].to_uppercase()
        ))
    }

    async fn start_fulfillment(&self, _order: &order::Model) -> Result<String, ServiceError> {
        Ok(format!("FUL-{}", random_hex(6).to_uppercase()))
    }
}
