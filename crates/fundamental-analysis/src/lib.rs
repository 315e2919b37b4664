//! Metric and valuation engine
//!
//! Pure, deterministic functions from filings and market data to ratios, an
//! intrinsic value estimate, headline risks and peer multiples.

pub mod metrics;
pub mod peers;
pub mod risks;
pub mod valuation;

use analysis_core::{FilingSections, MarketSnapshot, MetricsResult, PeerComparison, Ticker, ValuationResult};
use std::sync::Arc;

pub use metrics::{derive_metrics, BASELINE_METRICS};
pub use peers::peer_comparison;
pub use risks::{extract_risks, GENERIC_RISKS};
pub use valuation::{DcfModel, ValuationModel};

/// Value a company with the default [`DcfModel`].
pub fn value(metrics: &MetricsResult, market: &MarketSnapshot) -> ValuationResult {
    DcfModel::default().value(metrics, market)
}

/// Bundles the engine functions behind one pluggable valuation model.
#[derive(Clone)]
pub struct FundamentalAnalysisEngine {
    model: Arc<dyn ValuationModel>,
}

impl FundamentalAnalysisEngine {
    pub fn new() -> Self {
        Self::with_model(Arc::new(DcfModel::default()))
    }

    pub fn with_model(model: Arc<dyn ValuationModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn derive_metrics(&self, filings: &FilingSections) -> MetricsResult {
        derive_metrics(filings)
    }

    pub fn value(&self, metrics: &MetricsResult, market: &MarketSnapshot) -> ValuationResult {
        self.model.value(metrics, market)
    }

    pub fn risks(&self, filings: &FilingSections) -> Vec<String> {
        extract_risks(filings)
    }

    pub fn peers(&self, ticker: &Ticker) -> PeerComparison {
        peer_comparison(ticker)
    }
}

impl Default for FundamentalAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}
