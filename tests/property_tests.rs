use proptest::prelude::*;
use rust_decimal::Decimal;
use storefront_api::{
    config::{RiskConfig, ShippingConfig},
    money::{format_amount, line_total, parse_amount, round_currency},
    services::commerce::{
        pricing_service::Destination, PricingService, RiskContext, RiskService,
    },
};

fn cents() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|c| Decimal::new(c, 2))
}

fn rate() -> impl Strategy<Value = Option<Decimal>> {
    prop::option::of((0i64..2_500).prop_map(|bps| Decimal::new(bps, 2)))
}

fn country() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["US", "us", "CA", "BR", "NG", "DE", "PK"]).prop_map(String::from)
}

proptest! {
    #[test]
    fn total_is_sum_of_parts(
        lines in prop::collection::vec((cents(), 1i32..50), 0..8),
        rate in rate(),
        country in country(),
    ) {
        let pricing = PricingService::from_config(&ShippingConfig::default());
        let totals: Vec<Decimal> = lines.iter().map(|(p, q)| line_total(*p, *q)).collect();
        let destination = Destination { country: &country, state: None };

        let breakdown = pricing.price(totals.clone(), destination, rate);

        prop_assert_eq!(breakdown.subtotal, totals.iter().copied().sum::<Decimal>());
        prop_assert_eq!(
            breakdown.total,
            breakdown.subtotal + breakdown.tax_amount + breakdown.shipping_amount
        );
        prop_assert!(breakdown.tax_amount >= Decimal::ZERO);
        prop_assert!(breakdown.shipping_amount >= Decimal::ZERO);
        prop_assert!(breakdown.tax_amount.scale() <= 2);
        prop_assert_eq!(breakdown, pricing.price(totals, destination, rate));
    }

    #[test]
    fn missing_rate_is_untaxed(subtotal in cents()) {
        let pricing = PricingService::from_config(&ShippingConfig::default());
        prop_assert_eq!(pricing.calculate_taxes(subtotal, None), Decimal::ZERO);
    }

    #[test]
    fn risk_score_is_monotonic_in_subtotal(
        low in cents(),
        extra in cents(),
        items in 1i32..40,
        country in country(),
        disposable in any::<bool>(),
    ) {
        let risk = RiskService::new(RiskConfig::default());
        let email = if disposable { "x@mailinator.com" } else { "x@example.com" };
        let score_at = |subtotal| risk.compute_score(&RiskContext {
            subtotal,
            shipping_country: &country,
            customer_email: Some(email),
            item_count: items,
        });

        let low_score = score_at(low);
        prop_assert!(low_score >= 0);
        prop_assert!(score_at(low + extra) >= low_score);
    }

    #[test]
    fn risk_score_is_monotonic_in_item_count(
        subtotal in cents(),
        items in 1i32..40,
        more in 0i32..40,
    ) {
        let risk = RiskService::new(RiskConfig::default());
        let score_at = |item_count| risk.compute_score(&RiskContext {
            subtotal,
            shipping_country: "US",
            customer_email: None,
            item_count,
        });
        prop_assert!(score_at(items + more) >= score_at(items));
    }

    #[test]
    fn formatted_amounts_parse_back_to_the_rounded_value(
        mantissa in -10_000_000_000i64..10_000_000_000,
        scale in 0u32..6,
    ) {
        let amount = Decimal::new(mantissa, scale);
        let text = format_amount(amount);

        let (_, fraction) = text.split_once('.').expect("two fractional digits");
        prop_assert_eq!(fraction.len(), 2);
        prop_assert_eq!(parse_amount(&text).unwrap(), round_currency(amount));
    }

    #[test]
    fn garbage_never_parses(text in "[a-zA-Z ]{1,12}") {
        prop_assert!(parse_amount(&text).is_err());
    }
}
