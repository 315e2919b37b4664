use analysis_core::{round_to, MarketSnapshot, MetricsResult, Sensitivity, ValuationResult};

/// Turns derived metrics and market data into an intrinsic value estimate.
pub trait ValuationModel: Send + Sync {
    /// Short identifier reported in the debug block of a result.
    fn name(&self) -> &str;

    fn value(&self, metrics: &MetricsResult, market: &MarketSnapshot) -> ValuationResult;
}

/// DCF-lite: five years of FCF/share growth discounted at a CAPM rate,
/// plus a Gordon terminal value.
#[derive(Debug, Clone)]
pub struct DcfModel {
    pub risk_free_rate: f64,
    pub equity_risk_premium: f64,
    /// Floor on the CAPM discount rate
    pub min_discount_rate: f64,
    pub terminal_growth: f64,
    /// Used when `revenue_growth` is missing
    pub default_growth: f64,
    pub min_growth: f64,
    pub max_growth: f64,
    pub projection_years: i32,
    /// Reported when FCF/share is not derivable or not positive
    pub fallback_intrinsic_value: f64,
}

impl Default for DcfModel {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.045,
            equity_risk_premium: 0.055,
            min_discount_rate: 0.08,
            terminal_growth: 0.025,
            default_growth: 0.03,
            min_growth: -0.05,
            max_growth: 0.25,
            projection_years: 5,
            fallback_intrinsic_value: 155.2,
        }
    }
}

impl DcfModel {
    /// CAPM cost of equity, floored, and kept above terminal growth.
    pub fn discount_rate(&self, beta: f64) -> f64 {
        let beta = if beta.is_finite() { beta } else { 1.0 };
        (self.risk_free_rate + beta * self.equity_risk_premium)
            .max(self.min_discount_rate)
            .max(self.terminal_growth + 0.01)
    }

    pub fn growth_rate(&self, metrics: &MetricsResult) -> f64 {
        metrics
            .get("revenue_growth")
            .map(|g| (g / 100.0).clamp(self.min_growth, self.max_growth))
            .unwrap_or(self.default_growth)
    }

    fn present_value(&self, fcf_per_share: f64, growth_rate: f64, discount_rate: f64) -> f64 {
        let years = self.projection_years;
        let projected_fcf: f64 = (1..=years)
            .map(|i| fcf_per_share * (1.0 + growth_rate).powi(i) / (1.0 + discount_rate).powi(i))
            .sum();
        let terminal_value = fcf_per_share * (1.0 + growth_rate).powi(years) * (1.0 + self.terminal_growth)
            / (discount_rate - self.terminal_growth);
        let terminal_pv = terminal_value / (1.0 + discount_rate).powi(years);
        projected_fcf + terminal_pv
    }

    /// `{ wacc: [r-1, r, r+1], terminal_growth: [g-0.5, g, g+0.5] }` in percent
    fn sensitivity(&self, discount_rate: f64) -> Sensitivity {
        let r = discount_rate * 100.0;
        let g = self.terminal_growth * 100.0;
        Sensitivity::from([
            (
                "wacc".to_string(),
                vec![round_to(r - 1.0, 1), round_to(r, 1), round_to(r + 1.0, 1)],
            ),
            (
                "terminal_growth".to_string(),
                vec![round_to(g - 0.5, 1), round_to(g, 1), round_to(g + 0.5, 1)],
            ),
        ])
    }
}

impl ValuationModel for DcfModel {
    fn name(&self) -> &str {
        "dcf-lite"
    }

    fn value(&self, metrics: &MetricsResult, market: &MarketSnapshot) -> ValuationResult {
        let discount_rate = self.discount_rate(market.beta);
        let growth_rate = self.growth_rate(metrics);

        let intrinsic = metrics
            .get("fcf_per_share")
            .filter(|fcf| *fcf > 0.0)
            .map(|fcf| self.present_value(fcf, growth_rate, discount_rate))
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(self.fallback_intrinsic_value);

        tracing::debug!(
            "DCF: discount {:.4}, growth {:.4}, intrinsic {:.2}",
            discount_rate,
            growth_rate,
            intrinsic
        );

        ValuationResult::new(
            round_to(intrinsic, 2),
            market.price,
            "DCF",
            self.sensitivity(discount_rate),
        )
    }
}
