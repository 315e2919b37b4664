use analysis_core::{AnalysisError, Recommendation, SummaryPayload, Summarizer};
use async_trait::async_trait;

/// Offline summarizer that renders a fixed sentence template from the payload.
/// Used when no summarization endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct TemplateSummarizer;

impl TemplateSummarizer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose(payload: &SummaryPayload<'_>) -> String {
        let cash = match payload.metrics.get("free_cash_flow") {
            Some(fcf) if fcf > 0.0 => "Stable cash generation",
            Some(_) => "Negative free cash flow",
            None => "Limited cash flow disclosure",
        };
        let growth = payload
            .metrics
            .get("revenue_growth")
            .map(|g| format!(" and revenue growth of {:.1}%", g))
            .unwrap_or_default();

        let v = payload.valuation;
        let gap = v.implied_overvaluation_pct;
        let position = if gap > 0.0 {
            format!("trading {:.1}% above", gap)
        } else if gap < 0.0 {
            format!("trading {:.1}% below", gap.abs())
        } else {
            "trading at".to_string()
        };

        let stance = match payload.recommendation {
            Recommendation::Buy => "buy rating while the price sits near or below fair value",
            Recommendation::Hold => "hold rating until pricing aligns with fair value",
            Recommendation::Sell => "sell rating given the premium to fair value",
        };

        format!(
            "{}: {}{}, {} the {} intrinsic value of {:.2} (market price {:.2}); {}.",
            payload.ticker, cash, growth, position, v.valuation_method, v.intrinsic_value, v.market_price, stance
        )
    }
}

#[async_trait]
impl Summarizer for TemplateSummarizer {
    async fn summarize(&self, payload: &SummaryPayload<'_>) -> Result<String, AnalysisError> {
        Ok(Self::compose(payload))
    }
}
