use async_trait::async_trait;
use crate::{AnalysisError, FilingSections, MarketSnapshot, SummaryPayload, Ticker};

/// Source of the latest regulatory filing sections for a ticker
#[async_trait]
pub trait FilingSource: Send + Sync {
    async fn fetch_filings(&self, ticker: &Ticker) -> Result<FilingSections, AnalysisError>;
}

/// Source of quotes and technical indicators for a ticker
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_market_data(&self, ticker: &Ticker) -> Result<MarketSnapshot, AnalysisError>;
}

/// Produces the narrative summary for an assembled analysis
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, payload: &SummaryPayload<'_>) -> Result<String, AnalysisError>;
}
