//! Fixed-point money helpers. Amounts are `rust_decimal::Decimal` end to end;
//! they are parsed from strings and leave the process as strings.

use crate::errors::ServiceError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serializer;

/// Minor-unit precision used for every charged amount.
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds half away from zero to cents.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `unit × quantity`, exact.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Renders an amount with exactly two fractional digits ("8.5" becomes "8.50").
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = round_currency(amount);
    rounded.rescale(CURRENCY_SCALE);
    rounded.to_string()
}

/// Parses a decimal string without ever passing through a binary float.
pub fn parse_amount(raw: &str) -> Result<Decimal, ServiceError> {
    Decimal::from_str_exact(raw.trim())
        .map_err(|_| ServiceError::ValidationError(format!("'{}' is not a decimal amount", raw)))
}

/// `serialize_with` adapter for response DTOs.
pub fn serialize_amount<S>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_amount(*amount))
}
