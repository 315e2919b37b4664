use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Recommendation, Ticker};

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub vwap: Option<f64>,
}

/// Text bodies of the latest regulatory filing set for one ticker.
/// Request-scoped: never cached on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingSections {
    pub mda: String,
    pub risk_factors: String,
    pub financials: String,
}

impl FilingSections {
    /// First `max_chars` characters of the MD&A body, on a char boundary.
    pub fn mda_excerpt(&self, max_chars: usize) -> String {
        self.mda.chars().take(max_chars).collect()
    }
}

/// Market indicators for one ticker at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: f64,
    pub beta: f64,
    pub rsi: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    /// Any further indicators the provider reports
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, f64>,
}

impl MarketSnapshot {
    /// All indicators as a single named mapping.
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        let mut map = self.extra.clone();
        map.insert("price".to_string(), self.price);
        map.insert("beta".to_string(), self.beta);
        map.insert("rsi".to_string(), self.rsi);
        map.insert("sma_50".to_string(), self.sma_50);
        map.insert("sma_200".to_string(), self.sma_200);
        map
    }

    /// Subset reported in the momentum block of a response.
    pub fn momentum(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("50d_sma".to_string(), self.sma_50),
            ("200d_sma".to_string(), self.sma_200),
            ("rsi".to_string(), self.rsi),
            ("beta".to_string(), self.beta),
        ])
    }
}

/// Named financial ratios derived from filings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsResult(BTreeMap<String, f64>);

impl MetricsResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for MetricsResult {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Scenario grid: parameter name -> ordered scenario values
pub type Sensitivity = BTreeMap<String, Vec<f64>>;

/// Intrinsic value estimate against the observed market price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub intrinsic_value: f64,
    pub market_price: f64,
    pub implied_overvaluation_pct: f64,
    pub valuation_method: String,
    pub sensitivity: Sensitivity,
}

impl ValuationResult {
    /// Build a result; the overvaluation percentage is always derived from
    /// the two prices given here.
    pub fn new(
        intrinsic_value: f64,
        market_price: f64,
        valuation_method: impl Into<String>,
        sensitivity: Sensitivity,
    ) -> Self {
        Self {
            intrinsic_value,
            market_price,
            implied_overvaluation_pct: overvaluation_pct(market_price, intrinsic_value),
            valuation_method: valuation_method.into(),
            sensitivity,
        }
    }
}

/// `(market - intrinsic) / intrinsic * 100`, rounded to one decimal place.
pub fn overvaluation_pct(market_price: f64, intrinsic_value: f64) -> f64 {
    round_to((market_price - intrinsic_value) / intrinsic_value * 100.0, 1)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerMetric {
    pub ticker: String,
    pub metric: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerComparison {
    pub peers: Vec<PeerMetric>,
}

/// Debug block attached to every result. Known fields are typed; anything
/// else goes through `extensions` and is flattened into the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    pub filing_insights: String,
    pub valuation_model: String,
    pub llm_prompt: String,
    pub latency_ms: f64,
    #[serde(flatten, default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

/// Full response aggregate for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ticker: Ticker,
    /// Generation date (YYYY-MM-DD), frozen at assembly time
    pub as_of: String,
    pub summary: String,
    pub financials: MetricsResult,
    pub valuation: ValuationResult,
    pub risks: Vec<String>,
    pub peer_comparison: PeerComparison,
    pub momentum: BTreeMap<String, f64>,
    pub recommendation: Recommendation,
    pub reasoning: String,
    pub raw: RawBlock,
}

/// Everything the summarizer sees, so the narrative is grounded in the
/// same numbers returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryPayload<'a> {
    pub ticker: &'a Ticker,
    pub metrics: &'a MetricsResult,
    pub valuation: &'a ValuationResult,
    pub market_data: BTreeMap<String, f64>,
    pub filings: &'a FilingSections,
    pub recommendation: Recommendation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overvaluation_matches_formula() {
        let v = ValuationResult::new(155.2, 181.3, "DCF", Sensitivity::new());
        assert_eq!(v.implied_overvaluation_pct, 16.8);
    }

    #[test]
    fn test_undervaluation_is_negative() {
        assert_eq!(overvaluation_pct(90.0, 100.0), -10.0);
    }

    #[test]
    fn test_momentum_keys() {
        let snap = MarketSnapshot {
            price: 181.3,
            beta: 1.12,
            rsi: 63.2,
            sma_50: 175.1,
            sma_200: 169.4,
            extra: BTreeMap::new(),
        };
        let momentum = snap.momentum();
        assert_eq!(momentum.get("50d_sma"), Some(&175.1));
        assert_eq!(momentum.get("200d_sma"), Some(&169.4));
        assert_eq!(momentum.len(), 4);
        assert!(!momentum.contains_key("price"));
        assert_eq!(snap.as_map().get("price"), Some(&181.3));
    }

    #[test]
    fn test_raw_block_flattens_extensions() {
        let mut extensions = BTreeMap::new();
        extensions.insert("filing_form".to_string(), serde_json::json!("10-K"));
        let raw = RawBlock {
            filing_insights: "MD&A".to_string(),
            valuation_model: "dcf".to_string(),
            llm_prompt: "omitted".to_string(),
            latency_ms: 12.5,
            extensions,
        };
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["filing_form"], "10-K");
        assert_eq!(json["latency_ms"], 12.5);
    }

    #[test]
    fn test_mda_excerpt_respects_char_boundaries() {
        let filings = FilingSections {
            mda: "é".repeat(300),
            risk_factors: String::new(),
            financials: String::new(),
        };
        assert_eq!(filings.mda_excerpt(200).chars().count(), 200);
    }
}
