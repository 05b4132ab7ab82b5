use crate::config::RiskConfig;
use rust_decimal::Decimal;

/// Inputs the fraud heuristics look at
#[derive(Debug, Clone)]
pub struct RiskContext<'a> {
    pub subtotal: Decimal,
    pub shipping_country: &'a str,
    pub customer_email: Option<&'a str>,
    pub item_count: i32,
}

/// Additive rule-based scoring. Weights and thresholds come from
/// [`RiskConfig`]; nothing here is hardcoded.
#[derive(Debug, Clone)]
pub struct RiskService {
    config: RiskConfig,
}

impl RiskService {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> i32 {
        self.config.threshold
    }

    pub fn compute_score(&self, ctx: &RiskContext<'_>) -> i32 {
        let cfg = &self.config;
        let mut score = 0;

        if ctx.subtotal > cfg.high_value_amount {
            score += cfg.high_value_weight;
        }
        if ctx.subtotal > cfg.very_high_value_amount {
            score += cfg.very_high_value_weight;
        }

        if let Some(domain) = ctx.customer_email.and_then(email_domain) {
            if cfg
                .disposable_email_domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(domain))
            {
                score += cfg.disposable_email_weight;
            }
        }

        if ctx.item_count >= cfg.bulk_quantity {
            score += cfg.bulk_quantity_weight;
        }
        if ctx.item_count >= cfg.very_bulk_quantity {
            score += cfg.very_bulk_quantity_weight;
        }

        let country = ctx.shipping_country.trim();
        if cfg
            .high_risk_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
        {
            score += cfg.high_risk_country_weight;
        }

        score
    }

    pub fn is_high_risk(&self, score: i32) -> bool {
        score >= self.config.threshold
    }
}

fn email_domain(email: &str) -> Option<&str> {
    email
        .trim()
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn engine() -> RiskService {
        RiskService::new(RiskConfig::default())
    }

    #[test]
    fn every_rule_stacks() {
        let ctx = RiskContext {
            subtotal: dec!(1200.00),
            shipping_country: "NG",
            customer_email: Some("a@mailinator.com"),
            item_count: 25,
        };
        let svc = engine();
        let score = svc.compute_score(&ctx);
        assert_eq!(score, 140);
        assert!(svc.is_high_risk(score));
    }

    #[test_case(dec!(100), 0 ; "small order")]
    #[test_case(dec!(500), 0 ; "boundary is exclusive")]
    #[test_case(dec!(500.01), 30 ; "high value")]
    #[test_case(dec!(1200), 50 ; "very high value")]
    fn value_rules(subtotal: Decimal, expected: i32) {
        let ctx = RiskContext {
            subtotal,
            shipping_country: "US",
            customer_email: None,
            item_count: 1,
        };
        assert_eq!(engine().compute_score(&ctx), expected);
    }

    #[test_case(9, 0)]
    #[test_case(10, 15)]
    #[test_case(20, 35)]
    fn quantity_rules(item_count: i32, expected: i32) {
        let ctx = RiskContext {
            subtotal: dec!(10),
            shipping_country: "US",
            customer_email: None,
            item_count,
        };
        assert_eq!(engine().compute_score(&ctx), expected);
    }

    #[test]
    fn country_and_email_matching_ignores_case() {
        let ctx = RiskContext {
            subtotal: dec!(10),
            shipping_country: "pk",
            customer_email: Some("Buyer@TempMail.com"),
            item_count: 1,
        };
        assert_eq!(engine().compute_score(&ctx), 55);
    }

    #[test]
    fn malformed_email_is_ignored() {
        let ctx = RiskContext {
            subtotal: dec!(10),
            shipping_country: "US",
            customer_email: Some("not-an-address@"),
            item_count: 1,
        };
        assert_eq!(engine().compute_score(&ctx), 0);
    }

    #[test]
    fn threshold_is_inclusive_and_tunable() {
        let svc = engine();
        assert!(!svc.is_high_risk(69));
        assert!(svc.is_high_risk(70));

        let strict = RiskService::new(RiskConfig {
            threshold: 30,
            ..RiskConfig::default()
        });
        assert!(strict.is_high_risk(30));
    }
}
