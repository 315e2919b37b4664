use serde::{Deserialize, Serialize};

/// Discrete call derived from the valuation gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::Sell => "SELL",
        }
    }
}

/// Map the implied overvaluation percentage to a recommendation.
///
/// Buckets are checked top-down and boundaries fall into the lower bucket:
/// 25.0 is HOLD, 10.0 is BUY.
pub fn recommend(overvaluation_pct: f64) -> Recommendation {
    if overvaluation_pct > 25.0 {
        Recommendation::Sell
    } else if overvaluation_pct > 10.0 {
        Recommendation::Hold
    } else {
        Recommendation::Buy
    }
}
