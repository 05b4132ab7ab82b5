use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::commerce::{
    product_variant, store, store_setting, tax_rate, Product, ProductModel,
    ProductVariant, ProductVariantModel, Store, StoreModel, StoreSetting, StoreSettingModel,
    TaxRate,
};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

/// Read-only lookups against the store and catalog tables. The checkout
/// pipeline never writes through here; inventory decrements live in the
/// inventory gate.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    base: BaseRepository,
}

impl CatalogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_store_by_slug(&self, slug: &str) -> Result<Option<StoreModel>, ServiceError> {
        Ok(Store::find()
            .filter(store::Column::Slug.eq(slug))
            .one(self.base.get_db())
            .await?)
    }

    /// Resolves a slug or fails with a validation error, which is how an
    /// unknown store surfaces to storefront callers.
    pub async fn require_store(&self, slug: &str) -> Result<StoreModel, ServiceError> {
        self.find_store_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::ValidationError(format!("Store '{}' not found", slug)))
    }

    pub async fn find_store_setting(
        &self,
        store_id: Uuid,
    ) -> Result<Option<StoreSettingModel>, ServiceError> {
        Ok(StoreSetting::find()
            .filter(store_setting::Column::StoreId.eq(store_id))
            .one(self.base.get_db())
            .await?)
    }

    /// Loads a variant together with its product, scoped to the given store.
    /// Variants of other stores are reported as missing.
    pub async fn find_variant(
        &self,
        store_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Option<(ProductVariantModel, ProductModel)>, ServiceError> {
        find_variant_in(self.base.get_db(), store_id, variant_id).await
    }

    /// Tax percentage for a destination: a country+state row wins over a
    /// country-wide row; `None` means no applicable rate.
    pub async fn find_tax_rate(
        &self,
        store_id: Uuid,
        country: &str,
        state: Option<&str>,
    ) -> Result<Option<Decimal>, ServiceError> {
        let rates = TaxRate::find()
            .filter(tax_rate::Column::StoreId.eq(store_id))
            .filter(tax_rate::Column::Country.eq(country.to_uppercase()))
            .all(self.base.get_db())
            .await?;

        let state = state.map(|s| s.trim().to_uppercase());
        let exact = state.as_deref().and_then(|wanted| {
            rates.iter().find(|r| {
                r.state
                    .as_deref()
                    .map(|s| s.eq_ignore_ascii_case(wanted))
                    .unwrap_or(false)
            })
        });

        Ok(exact
            .or_else(|| rates.iter().find(|r| r.state.is_none()))
            .map(|r| r.percentage))
    }
}

/// Same lookup as [`CatalogRepository::find_variant`] but usable inside a
/// transaction.
pub async fn find_variant_in<C: ConnectionTrait>(
    conn: &C,
    store_id: Uuid,
    variant_id: Uuid,
) -> Result<Option<(ProductVariantModel, ProductModel)>, ServiceError> {
    let found = ProductVariant::find_by_id(variant_id)
        .find_also_related(Product)
        .one(conn)
        .await?;

    Ok(match found {
        Some((variant, Some(product))) if product.store_id == store_id => Some((variant, product)),
        _ => None,
    })
}

/// Current stock for a set of variants, used to enrich cart views.
pub async fn inventory_for<C: ConnectionTrait>(
    conn: &C,
    variant_ids: Vec<Uuid>,
) -> Result<Vec<(Uuid, i32)>, ServiceError> {
    if variant_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = ProductVariant::find()
        .filter(product_variant::Column::Id.is_in(variant_ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|v| (v.id, v.inventory_quantity)).collect())
}
