// Storefront checkout pipeline
pub mod commerce;

// Post-checkout order operations
pub mod fulfillment;
pub mod orders;

// Payment vendor adapters and settlement
pub mod payments;
