//! Counting fakes for the upstream traits.

use analysis_core::{
    AnalysisError, AnalysisResult, FilingSections, FilingSource, MarketDataSource, MarketSnapshot, MetricsResult,
    PeerComparison, RawBlock, Recommendation, Summarizer, SummaryPayload, Ticker, ValuationResult,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn sample_filings() -> FilingSections {
    FilingSections {
        mda: format!("Net sales increased due to higher iPhone and Services revenue. {}", "Detail. ".repeat(40)),
        risk_factors: "The Company's operations depend on outsourcing partners located primarily in Asia.".to_string(),
        financials: "Total net sales: 391035 | 383285\nGross margin: 180683 | 169148".to_string(),
    }
}

pub fn sample_snapshot() -> MarketSnapshot {
    MarketSnapshot {
        price: 181.3,
        beta: 1.12,
        rsi: 63.2,
        sma_50: 175.1,
        sma_200: 169.4,
        extra: BTreeMap::new(),
    }
}

pub fn sample_result(ticker: &Ticker) -> AnalysisResult {
    AnalysisResult {
        ticker: ticker.clone(),
        as_of: "2024-01-02".to_string(),
        summary: "summary".to_string(),
        financials: MetricsResult::new(),
        valuation: ValuationResult::new(155.2, 181.3, "DCF", BTreeMap::new()),
        risks: Vec::new(),
        peer_comparison: PeerComparison::default(),
        momentum: sample_snapshot().momentum(),
        recommendation: Recommendation::Hold,
        reasoning: "summary".to_string(),
        raw: RawBlock {
            filing_insights: String::new(),
            valuation_model: "dcf-lite".to_string(),
            llm_prompt: "omitted".to_string(),
            latency_ms: 0.0,
            extensions: BTreeMap::new(),
        },
    }
}

/// Injected failure for the next calls, if set.
type Failure = Mutex<Option<AnalysisError>>;

fn injected(failure: &Failure) -> Result<(), AnalysisError> {
    match failure.lock().unwrap().as_ref() {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

#[derive(Default)]
pub struct FakeFilings {
    calls: AtomicUsize,
    pub delay: Duration,
    pub failure: Failure,
}

impl FakeFilings {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FilingSource for FakeFilings {
    async fn fetch_filings(&self, _ticker: &Ticker) -> Result<FilingSections, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        injected(&self.failure)?;
        Ok(sample_filings())
    }
}

#[derive(Default)]
pub struct FakeMarket {
    calls: AtomicUsize,
    pub failure: Failure,
}

impl FakeMarket {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for FakeMarket {
    async fn fetch_market_data(&self, _ticker: &Ticker) -> Result<MarketSnapshot, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        injected(&self.failure)?;
        Ok(sample_snapshot())
    }
}

#[derive(Default)]
pub struct FakeSummarizer {
    calls: AtomicUsize,
    pub failure: Failure,
}

impl FakeSummarizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, payload: &SummaryPayload<'_>) -> Result<String, AnalysisError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        injected(&self.failure)?;
        Ok(format!(
            "{} call {}: {} rating",
            payload.ticker,
            call,
            payload.recommendation.as_str().to_lowercase()
        ))
    }
}
