use crate::{
    config::ShippingConfig,
    money::{round_currency, serialize_amount},
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Destination fields the pricing rules look at
#[derive(Debug, Clone, Copy)]
pub struct Destination<'a> {
    pub country: &'a str,
    pub state: Option<&'a str>,
}

/// Deterministic mapping from a destination to a non-negative shipping charge.
pub trait ShippingPolicy: Send + Sync {
    fn quote(&self, destination: Destination<'_>) -> Decimal;
}

/// Two-tier table: home country pays the domestic rate, everyone else the
/// international rate.
#[derive(Debug, Clone)]
pub struct FlatRateShipping {
    home_country: String,
    domestic_rate: Decimal,
    international_rate: Decimal,
}

impl FlatRateShipping {
    pub fn new(home_country: &str, domestic_rate: Decimal, international_rate: Decimal) -> Self {
        Self {
            home_country: home_country.trim().to_uppercase(),
            domestic_rate: domestic_rate.max(Decimal::ZERO),
            international_rate: international_rate.max(Decimal::ZERO),
        }
    }
}

impl From<&ShippingConfig> for FlatRateShipping {
    fn from(cfg: &ShippingConfig) -> Self {
        Self::new(&cfg.home_country, cfg.domestic_rate, cfg.international_rate)
    }
}

impl ShippingPolicy for FlatRateShipping {
    fn quote(&self, destination: Destination<'_>) -> Decimal {
        if destination.country.trim().eq_ignore_ascii_case(&self.home_country) {
            self.domestic_rate
        } else {
            self.international_rate
        }
    }
}

/// The four amounts a checkout is charged, kept separately for receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    #[serde(serialize_with = "serialize_amount")]
    pub subtotal: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    pub tax_amount: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    pub shipping_amount: Decimal,
    #[serde(serialize_with = "serialize_amount")]
    pub total: Decimal,
}

#[derive(Clone)]
pub struct PricingService {
    shipping: Arc<dyn ShippingPolicy>,
}

impl PricingService {
    pub fn new(shipping: Arc<dyn ShippingPolicy>) -> Self {
        Self { shipping }
    }

    pub fn from_config(cfg: &ShippingConfig) -> Self {
        Self::new(Arc::new(FlatRateShipping::from(cfg)))
    }

    /// Sum of line totals; zero for an empty cart.
    pub fn sum_subtotal<I>(&self, line_totals: I) -> Decimal
    where
        I: IntoIterator<Item = Decimal>,
    {
        line_totals.into_iter().fold(Decimal::ZERO, |acc, t| acc + t)
    }

    /// `subtotal × rate / 100`, rounded to cents. No rate means 0%.
    pub fn calculate_taxes(&self, subtotal: Decimal, rate_percentage: Option<Decimal>) -> Decimal {
        match rate_percentage {
            Some(rate) => round_currency(subtotal * rate / Decimal::ONE_HUNDRED),
            None => Decimal::ZERO,
        }
    }

    pub fn calculate_shipping(&self, destination: Destination<'_>) -> Decimal {
        self.shipping.quote(destination)
    }

    pub fn price<I>(
        &self,
        line_totals: I,
        destination: Destination<'_>,
        rate_percentage: Option<Decimal>,
    ) -> PriceBreakdown
    where
        I: IntoIterator<Item = Decimal>,
    {
        let subtotal = self.sum_subtotal(line_totals);
        let tax_amount = self.calculate_taxes(subtotal, rate_percentage);
        let shipping_amount = self.calculate_shipping(destination);
        PriceBreakdown {
            subtotal,
            tax_amount,
            shipping_amount,
            total: subtotal + tax_amount + shipping_amount,
        }
    }
}

impl std::fmt::Debug for PricingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::format_amount;
    use rust_decimal_macros::dec;

    fn service() -> PricingService {
        PricingService::new(Arc::new(FlatRateShipping::new("US", dec!(10.00), dec!(25.00))))
    }

    fn us() -> Destination<'static> {
        Destination {
            country: "US",
            state: Some("CA"),
        }
    }

    #[test]
    fn empty_cart_has_zero_subtotal() {
        assert_eq!(service().sum_subtotal(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn tax_on_hundred_at_eight_and_a_half_percent() {
        let svc = service();
        let tax = svc.calculate_taxes(dec!(100.00), Some(dec!(8.5)));
        assert_eq!(format_amount(tax), "8.50");
    }

    #[test]
    fn missing_rate_means_no_tax() {
        assert_eq!(service().calculate_taxes(dec!(250), None), Decimal::ZERO);
    }

    #[test]
    fn shipping_tiers_by_country() {
        let svc = service();
        assert_eq!(svc.calculate_shipping(us()), dec!(10.00));
        let lower = Destination {
            country: "us",
            state: None,
        };
        assert_eq!(svc.calculate_shipping(lower), dec!(10.00));
        let abroad = Destination {
            country: "BR",
            state: None,
        };
        assert_eq!(svc.calculate_shipping(abroad), dec!(25.00));
    }

    #[test]
    fn breakdown_is_reproducible() {
        let svc = service();
        let first = svc.price(vec![dec!(59.97), dec!(40.03)], us(), Some(dec!(8.5)));
        let second = svc.price(vec![dec!(59.97), dec!(40.03)], us(), Some(dec!(8.5)));
        assert_eq!(first, second);
        assert_eq!(format_amount(first.subtotal), "100.00");
        assert_eq!(format_amount(first.tax_amount), "8.50");
        assert_eq!(format_amount(first.shipping_amount), "10.00");
        assert_eq!(format_amount(first.total), "118.50");
    }

    #[test]
    fn negative_rates_are_clamped() {
        let policy = FlatRateShipping::new("US", dec!(-1), dec!(-5));
        assert_eq!(policy.quote(us()), Decimal::ZERO);
    }
}
