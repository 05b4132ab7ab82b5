//! Stock checks and the guarded decrement.
//!
//! `inventory_quantity` is only ever lowered through [`reserve`], a single
//! conditional `UPDATE ... WHERE inventory_quantity >= qty`. Two buyers racing
//! for the last units both reach the database; at most one update matches.

use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entities::commerce::{product_variant, ProductVariant};
use crate::errors::ServiceError;

/// Quantity a cart line needs from one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRequirement {
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// Checks each requirement in order and stops at the first shortfall.
/// Missing variants count as zero stock.
pub async fn ensure_available<C: ConnectionTrait>(
    conn: &C,
    requirements: &[StockRequirement],
) -> Result<(), ServiceError> {
    for req in requirements {
        let available = available(conn, req.variant_id).await?.unwrap_or(0);

        if available < req.quantity {
            warn!(
                variant_id = %req.variant_id,
                requested = req.quantity,
                available,
                "insufficient inventory"
            );
            return Err(ServiceError::insufficient_stock(
                Some(req.variant_id),
                req.quantity,
                available,
            ));
        }
    }
    Ok(())
}

/// Decrements stock by `quantity` only if enough remains. On a lost race the
/// current level is re-read so the caller can report what is left.
pub async fn reserve<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::ValidationError(
            "Reserved quantity must be at least 1".to_string(),
        ));
    }

    let result = ProductVariant::update_many()
        .col_expr(
            product_variant::Column::InventoryQuantity,
            Expr::col(product_variant::Column::InventoryQuantity).sub(quantity),
        )
        .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_variant::Column::Id.eq(variant_id))
        .filter(product_variant::Column::InventoryQuantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        debug!(%variant_id, quantity, "inventory decremented");
        return Ok(());
    }

    let available = available(conn, variant_id).await?.unwrap_or(0);
    warn!(%variant_id, requested = quantity, available, "inventory reservation lost");
    Err(ServiceError::insufficient_stock(
        Some(variant_id),
        quantity,
        available,
    ))
}

/// Current stock for a single variant, `None` if it does not exist.
pub async fn available<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
) -> Result<Option<i32>, ServiceError> {
    Ok(ProductVariant::find_by_id(variant_id)
        .one(conn)
        .await?
        .map(|v| v.inventory_quantity))
}
