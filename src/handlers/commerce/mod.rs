//! Storefront handlers: carts and checkout
pub mod carts;
pub mod checkout;

pub use carts::carts_routes;
pub use checkout::checkout_routes;
