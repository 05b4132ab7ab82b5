use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::order::{self, Entity as Order, Model as OrderModel};
use crate::entities::order_item::{Entity as OrderItem, Model as OrderItemModel};
use crate::entities::payment::{self, Entity as Payment, Model as PaymentModel};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

/// Read access to materialized orders and their payments
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find an order scoped to a store
    pub async fn find_for_store(
        &self,
        store_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find_by_id(order_id)
            .filter(order::Column::StoreId.eq(store_id))
            .one(self.base.get_db())
            .await?)
    }

    /// Newest first, capped at `limit`
    pub async fn list_by_store(
        &self,
        store_id: Uuid,
        limit: u64,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::StoreId.eq(store_id))
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit)
            .all(self.base.get_db())
            .await?)
    }

    pub async fn find_items(&self, order: &OrderModel) -> Result<Vec<OrderItemModel>, ServiceError> {
        Ok(order.find_related(OrderItem).all(self.base.get_db()).await?)
    }

    pub async fn find_payment_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<PaymentModel>, ServiceError> {
        Ok(Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(self.base.get_db())
            .await?)
    }

    /// Webhook reconciliation path: the vendor id is the only key available.
    pub async fn find_payment_by_provider_transaction(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<PaymentModel>, ServiceError> {
        Ok(Payment::find()
            .filter(payment::Column::ProviderTransactionId.eq(provider_transaction_id))
            .one(self.base.get_db())
            .await?)
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
