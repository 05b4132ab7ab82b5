//! Storefront checkout pipeline: carts, pricing, risk, stock checks, session
//! lifecycle and order materialization.
pub mod cart_service;
pub mod checkout_service;
pub mod inventory_gate;
pub mod order_materializer;
pub mod pricing_service;
pub mod risk_service;

pub use cart_service::{AddToCartInput, CartService, CartView, UpdateCartItemInput};
pub use checkout_service::{
    CheckoutService, CompleteCheckoutInput, CreateCheckoutSessionInput, ShippingAddress,
};
pub use order_materializer::{MaterializedOrder, OrderMaterializer};
pub use pricing_service::{FlatRateShipping, PriceBreakdown, PricingService, ShippingPolicy};
pub use risk_service::{RiskContext, RiskService};
