//! SEC EDGAR filing client
//!
//! Resolves a ticker to its CIK, locates the latest annual (or quarterly)
//! report and cuts the MD&A, risk factors and financial statements sections
//! out of the primary document.

pub mod models;
pub mod sections;

use analysis_core::{AnalysisError, FilingSections, FilingSource, RateLimiter, Ticker};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use std::time::Duration;

pub use models::FilingRef;
pub use sections::{extract_sections, html_to_text};

use models::{CompanyTickers, Submissions};

const WWW_BASE: &str = "https://www.sec.gov";
const DATA_BASE: &str = "https://data.sec.gov";

/// EDGAR fair-access policy: no more than 10 requests per second
const EDGAR_MAX_REQUESTS_PER_SEC: usize = 10;

#[derive(Clone)]
pub struct SecClient {
    client: Client,
    user_agent: String,
    www_base: String,
    data_base: String,
    rate_limiter: RateLimiter,
    /// EDGAR ticker (BRK-B style) -> CIK, loaded once per process
    cik_cache: std::sync::Arc<DashMap<String, u64>>,
}

impl SecClient {
    /// `user_agent` identifies the caller to EDGAR, e.g. `"ticker-analyzer/0.1 ops@example.com"`.
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        let user_agent = user_agent.into();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.clone())
            .gzip(true)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client for EDGAR: {}", e);
                Client::new()
            });

        Self {
            client,
            user_agent,
            www_base: WWW_BASE.to_string(),
            data_base: DATA_BASE.to_string(),
            rate_limiter: RateLimiter::new("SEC EDGAR", EDGAR_MAX_REQUESTS_PER_SEC, Duration::from_secs(1)),
            cik_cache: std::sync::Arc::new(DashMap::new()),
        }
    }

    /// Override both EDGAR hosts (mirrors, test servers).
    pub fn with_base_urls(mut self, www_base: impl Into<String>, data_base: impl Into<String>) -> Self {
        self.www_base = www_base.into().trim_end_matches('/').to_string();
        self.data_base = data_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, AnalysisError> {
        self.rate_limiter.acquire().await;
        // User-Agent is also set per request; EDGAR rejects anonymous clients
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| AnalysisError::UpstreamUnavailable(format!("EDGAR request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AnalysisError::UpstreamUnavailable(format!(
                "EDGAR HTTP {} for {}",
                response.status(),
                url
            )));
        }
        Ok(response)
    }

    /// Resolve a ticker to its CIK via EDGAR's company ticker index.
    pub async fn resolve_cik(&self, ticker: &Ticker) -> Result<u64, AnalysisError> {
        let edgar_ticker = edgar_symbol(ticker);
        if let Some(cik) = self.cik_cache.get(&edgar_ticker) {
            return Ok(*cik);
        }

        let url = format!("{}/files/company_tickers.json", self.www_base);
        let index: CompanyTickers = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| AnalysisError::UpstreamFormat(format!("Company ticker index: {}", e)))?;

        tracing::debug!("Loaded {} EDGAR registrants", index.len());
        for entry in index.values() {
            self.cik_cache.insert(entry.ticker.to_uppercase(), entry.cik_str);
        }

        self.cik_cache
            .get(&edgar_ticker)
            .map(|cik| *cik)
            .ok_or_else(|| AnalysisError::UpstreamFormat(format!("No EDGAR registrant for {}", ticker)))
    }

    /// Latest 10-K (or 10-Q when no annual report is listed) for a CIK.
    pub async fn latest_report(&self, cik: u64) -> Result<FilingRef, AnalysisError> {
        let url = format!("{}/submissions/CIK{:010}.json", self.data_base, cik);
        let submissions: Submissions = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| AnalysisError::UpstreamFormat(format!("Submissions for CIK {}: {}", cik, e)))?;

        submissions.filings.recent.latest_report(cik).ok_or_else(|| {
            AnalysisError::UpstreamFormat(format!(
                "No 10-K or 10-Q listed for {}",
                submissions.name.unwrap_or_else(|| format!("CIK {}", cik))
            ))
        })
    }

    /// Download a filing's primary document as text.
    pub async fn fetch_document_text(&self, filing: &FilingRef) -> Result<String, AnalysisError> {
        let url = filing.document_url(&self.www_base);
        let html = self
            .get(&url)
            .await?
            .text()
            .await
            .map_err(|e| AnalysisError::UpstreamUnavailable(format!("Reading {}: {}", url, e)))?;

        // Parsing multi-megabyte documents is CPU-bound
        tokio::task::spawn_blocking(move || html_to_text(&html))
            .await
            .map_err(|e| AnalysisError::UpstreamFormat(format!("Document parsing aborted: {}", e)))
    }
}

#[async_trait]
impl FilingSource for SecClient {
    async fn fetch_filings(&self, ticker: &Ticker) -> Result<FilingSections, AnalysisError> {
        let cik = self.resolve_cik(ticker).await?;
        let filing = self.latest_report(cik).await?;
        tracing::info!(
            "Fetching {} filed {} for {} (CIK {})",
            filing.form,
            filing.filing_date,
            ticker,
            cik
        );

        let text = self.fetch_document_text(&filing).await?;
        extract_sections(&text, &filing.form)
    }
}

/// EDGAR writes class suffixes with a dash (BRK.B -> BRK-B).
fn edgar_symbol(ticker: &Ticker) -> String {
    ticker.as_str().replace('.', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edgar_symbol_uses_dash_suffix() {
        assert_eq!(edgar_symbol(&Ticker::parse("BRK.B").unwrap()), "BRK-B");
        assert_eq!(edgar_symbol(&Ticker::parse("AAPL").unwrap()), "AAPL");
    }

    #[tokio::test]
    async fn test_cached_cik_skips_network() {
        // Unroutable hosts: any request would fail
        let client = SecClient::new("test-agent/0.1 test@example.com", Duration::from_millis(50))
            .with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
        client.cik_cache.insert("AAPL".to_string(), 320193);

        let cik = client.resolve_cik(&Ticker::parse("AAPL").unwrap()).await.unwrap();
        assert_eq!(cik, 320193);
    }

    #[tokio::test]
    async fn test_unreachable_edgar_is_unavailable() {
        let client = SecClient::new("test-agent/0.1 test@example.com", Duration::from_millis(200))
            .with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9");

        let err = client
            .fetch_filings(&Ticker::parse("MSFT").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UpstreamUnavailable");
    }
}
