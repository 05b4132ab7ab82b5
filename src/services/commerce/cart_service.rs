use super::inventory_gate;
use crate::{
    entities::commerce::{
        cart, cart_item, Cart, CartItem, CartItemModel, CartModel, CartStatus, Product,
        ProductVariant,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::{line_total, serialize_amount},
    repositories::{
        catalog_repository::{find_variant_in, inventory_for},
        CatalogRepository,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Storefront cart management.
///
/// Carts are scoped to a store and addressed by id (clients keep it in the
/// `x-cart-id` header). Every line holds a price snapshot taken when the line
/// was last written; checkout prices from those snapshots, not from the
/// live catalog.
///
/// Stock is checked on every add and quantity change so shoppers hear about
/// shortages early, but nothing is held here. The authoritative decrement
/// happens when the order is materialized.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    catalog: CatalogRepository,
    event_sender: Arc<EventSender>,
}

/// Input for adding a variant to a cart
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub variant_id: Uuid,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateCartItemInput {
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub quantity: i32,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String, example = "19.99")]
    pub unit_price: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String, example = "59.97")]
    pub total_price: Decimal,
    /// Live stock level of the variant
    pub available: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub store_id: Uuid,
    pub status: CartStatus,
    pub items: Vec<CartLineView>,
    pub item_count: i32,
    #[serde(serialize_with = "serialize_amount")]
    #[schema(value_type = String, example = "59.97")]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VariantInventory {
    pub variant_id: Uuid,
    pub sku: String,
    pub inventory_quantity: i32,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: CatalogRepository,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            catalog,
            event_sender,
        }
    }

    /// Returns the cart named by `cart_id` when it belongs to this store,
    /// otherwise opens a fresh one. The flag reports whether a cart was
    /// created.
    #[instrument(skip(self))]
    pub async fn get_or_create(
        &self,
        store_slug: &str,
        cart_id: Option<Uuid>,
    ) -> Result<(CartView, bool), ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;

        if let Some(id) = cart_id {
            let existing = Cart::find_by_id(id)
                .filter(cart::Column::StoreId.eq(store.id))
                .one(&*self.db)
                .await?;
            if let Some(cart) = existing {
                return Ok((self.view(&cart).await?, false));
            }
        }

        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store.id),
            organization_id: Set(store.organization_id),
            customer_id: Set(None),
            status: Set(CartStatus::Open),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CartCreated(cart.id))
            .await;
        info!(cart_id = %cart.id, store = %store.slug, "cart created");

        Ok((self.view(&cart).await?, true))
    }

    /// Adds a variant, merging into the existing line when the variant is
    /// already in the cart. The merged quantity must be in stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        store_slug: &str,
        cart_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let store = self.catalog.require_store(store_slug).await?;

        let txn = self.db.begin().await?;
        let cart = load_open_cart(&txn, store.id, cart_id).await?;

        let (variant, _product) = find_variant_in(&txn, store.id, input.variant_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Variant {} not found", input.variant_id))
            })?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::VariantId.eq(variant.id))
            .one(&txn)
            .await?;

        let wanted = existing.as_ref().map(|i| i.quantity).unwrap_or(0) + input.quantity;
        if variant.inventory_quantity < wanted {
            warn!(variant_id = %variant.id, wanted, available = variant.inventory_quantity, "add to cart exceeds stock");
            return Err(ServiceError::insufficient_stock(
                Some(variant.id),
                wanted,
                variant.inventory_quantity,
            ));
        }

        let now = Utc::now();
        match existing {
            Some(item) => {
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(wanted);
                item.unit_price = Set(variant.price);
                item.total_price = Set(line_total(variant.price, wanted));
                item.updated_at = Set(now);
                item.update(&txn).await?;
            }
            None => {
                let position = CartItem::find()
                    .filter(cart_item::Column::CartId.eq(cart.id))
                    .count(&txn)
                    .await? as i32;
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(variant.product_id),
                    variant_id: Set(Some(variant.id)),
                    quantity: Set(wanted),
                    unit_price: Set(variant.price),
                    total_price: Set(line_total(variant.price, wanted)),
                    position: Set(position),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }

        let cart = touch(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                variant_id: variant.id,
            })
            .await;
        info!(cart_id = %cart.id, variant_id = %variant.id, quantity = wanted, "cart line written");

        self.view(&cart).await
    }

    /// Sets a line's quantity. The total is re-derived from the line's own
    /// unit price snapshot.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        store_slug: &str,
        cart_id: Uuid,
        item_id: Uuid,
        input: UpdateCartItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let store = self.catalog.require_store(store_slug).await?;

        let txn = self.db.begin().await?;
        let cart = load_open_cart(&txn, store.id, cart_id).await?;
        let item = load_line(&txn, cart.id, item_id).await?;

        if let Some(variant_id) = item.variant_id {
            let available = inventory_gate::available(&txn, variant_id)
                .await?
                .unwrap_or(0);
            if available < input.quantity {
                return Err(ServiceError::insufficient_stock(
                    Some(variant_id),
                    input.quantity,
                    available,
                ));
            }
        }

        let unit_price = item.unit_price;
        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(input.quantity);
        item.total_price = Set(line_total(unit_price, input.quantity));
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        let cart = touch(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
            })
            .await;

        self.view(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        store_slug: &str,
        cart_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;

        let txn = self.db.begin().await?;
        let cart = load_open_cart(&txn, store.id, cart_id).await?;
        let item = load_line(&txn, cart.id, item_id).await?;
        CartItem::delete_by_id(item.id).exec(&txn).await?;
        let cart = touch(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        self.view(&cart).await
    }

    /// Real-time stock read for a variant of this store
    #[instrument(skip(self))]
    pub async fn variant_inventory(
        &self,
        store_slug: &str,
        variant_id: Uuid,
    ) -> Result<VariantInventory, ServiceError> {
        let store = self.catalog.require_store(store_slug).await?;
        let (variant, _) = self
            .catalog
            .find_variant(store.id, variant_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))?;

        Ok(VariantInventory {
            variant_id: variant.id,
            sku: variant.sku,
            inventory_quantity: variant.inventory_quantity,
        })
    }

    async fn view(&self, cart: &CartModel) -> Result<CartView, ServiceError> {
        let items = cart_lines(&*self.db, cart.id).await?;

        let variant_ids: Vec<Uuid> = items.iter().filter_map(|i| i.variant_id).collect();
        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();

        let stock: HashMap<Uuid, i32> = inventory_for(&*self.db, variant_ids.clone())
            .await?
            .into_iter()
            .collect();

        let variant_names: HashMap<Uuid, String> = if variant_ids.is_empty() {
            HashMap::new()
        } else {
            ProductVariant::find()
                .filter(crate::entities::commerce::product_variant::Column::Id.is_in(variant_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|v| (v.id, v.name))
                .collect()
        };
        let product_names: HashMap<Uuid, String> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(crate::entities::commerce::product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect()
        };

        let lines: Vec<CartLineView> = items
            .into_iter()
            .map(|item| {
                let product_name = product_names
                    .get(&item.product_id)
                    .cloned()
                    .unwrap_or_default();
                let name = match item.variant_id.and_then(|v| variant_names.get(&v)) {
                    Some(variant_name) => format!("{} - {}", product_name, variant_name),
                    None => product_name,
                };
                CartLineView {
                    id: item.id,
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                    name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                    available: item.variant_id.and_then(|v| stock.get(&v).copied()),
                }
            })
            .collect();

        Ok(CartView {
            id: cart.id,
            store_id: cart.store_id,
            status: cart.status,
            item_count: lines.iter().map(|l| l.quantity).sum(),
            subtotal: lines
                .iter()
                .fold(Decimal::ZERO, |acc, l| acc + l.total_price),
            items: lines,
        })
    }
}

/// Cart lines in insertion order
pub async fn cart_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<CartItemModel>, ServiceError> {
    Ok(CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::Position)
        .order_by_asc(cart_item::Column::CreatedAt)
        .all(conn)
        .await?)
}

async fn load_open_cart<C: ConnectionTrait>(
    conn: &C,
    store_id: Uuid,
    cart_id: Uuid,
) -> Result<CartModel, ServiceError> {
    let cart = Cart::find_by_id(cart_id)
        .filter(cart::Column::StoreId.eq(store_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

    if cart.status != CartStatus::Open {
        return Err(ServiceError::InvalidOperation(
            "Cart has already been checked out".to_string(),
        ));
    }
    Ok(cart)
}

async fn load_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    item_id: Uuid,
) -> Result<CartItemModel, ServiceError> {
    CartItem::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))
}

async fn touch<C: ConnectionTrait>(conn: &C, cart: CartModel) -> Result<CartModel, ServiceError> {
    let mut active: cart::ActiveModel = cart.into();
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}
