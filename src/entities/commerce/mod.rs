//! Storefront-side entities: stores and their catalog lookups, carts, and
//! checkout sessions.
pub mod cart;
pub mod cart_item;
pub mod checkout_session;
pub mod product;
pub mod product_variant;
pub mod store;
pub mod store_setting;
pub mod tax_rate;

pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use checkout_session::{
    CheckoutSessionStatus, Entity as CheckoutSession, Model as CheckoutSessionModel,
};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
pub use store::{Entity as Store, Model as StoreModel};
pub use store_setting::{Entity as StoreSetting, Model as StoreSettingModel};
pub use tax_rate::{Entity as TaxRate, Model as TaxRateModel};
