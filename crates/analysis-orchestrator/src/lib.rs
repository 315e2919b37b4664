use analysis_core::{
    recommend, round_to, AnalysisError, AnalysisResult, FilingSource, MarketDataSource, RawBlock, Summarizer,
    SummaryPayload, Ticker,
};
use chrono::Local;
use dashmap::DashMap;
use fundamental_analysis::FundamentalAnalysisEngine;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

pub mod cache;
pub use cache::AnalysisCache;

#[cfg(test)]
mod test_support;

/// Characters of MD&A reported in the debug block
const FILING_INSIGHTS_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub cache_ttl: Duration,
    /// Bound on each upstream call
    pub upstream_timeout: Duration,
    /// Concurrent misses for one ticker share a single pipeline run
    pub coalesce_in_flight: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(900),
            upstream_timeout: Duration::from_secs(30),
            coalesce_in_flight: true,
        }
    }
}

/// How a result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Refresh requested: cache read skipped, result still stored
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Bypass => "bypass",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: Arc<AnalysisResult>,
    pub cache: CacheStatus,
}

type InFlight = Arc<OnceCell<Result<Arc<AnalysisResult>, AnalysisError>>>;

/// Drops a caller's claim on an in-flight run. The map entry goes once the
/// run has resolved, or once nobody but the map still holds an abandoned cell.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<Ticker, InFlight>,
    ticker: &'a Ticker,
    cell: InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // Map and guard hold two references; more means someone is waiting
        self.in_flight.remove_if(self.ticker, |_, current| {
            Arc::ptr_eq(current, &self.cell) && (self.cell.initialized() || Arc::strong_count(current) <= 2)
        });
    }
}

/// Runs the fetch, derive, summarize and cache pipeline for one ticker.
pub struct AnalysisOrchestrator {
    filings: Arc<dyn FilingSource>,
    market_data: Arc<dyn MarketDataSource>,
    summarizer: Arc<dyn Summarizer>,
    engine: FundamentalAnalysisEngine,
    cache: Arc<AnalysisCache>,
    config: OrchestratorConfig,
    in_flight: DashMap<Ticker, InFlight>,
}

impl AnalysisOrchestrator {
    pub fn new(
        filings: Arc<dyn FilingSource>,
        market_data: Arc<dyn MarketDataSource>,
        summarizer: Arc<dyn Summarizer>,
        cache: Arc<AnalysisCache>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            filings,
            market_data,
            summarizer,
            engine: FundamentalAnalysisEngine::new(),
            cache,
            config,
            in_flight: DashMap::new(),
        }
    }

    /// Replace the default DCF engine.
    pub fn with_engine(mut self, engine: FundamentalAnalysisEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Serve `ticker` from cache, or run the pipeline and cache its result.
    ///
    /// `force_refresh` skips the cache read but still stores the new result.
    /// Failures are never cached and leave any previous entry in place.
    pub async fn analyze(&self, ticker: &Ticker, force_refresh: bool) -> Result<AnalysisOutcome, AnalysisError> {
        if force_refresh {
            tracing::info!("Refresh requested for {}, bypassing cache", ticker);
            let result = self.run_and_store(ticker).await?;
            return Ok(AnalysisOutcome {
                result,
                cache: CacheStatus::Bypass,
            });
        }

        if let Some(result) = self.cache.lookup(ticker) {
            tracing::info!("Cache hit for {}", ticker);
            return Ok(AnalysisOutcome {
                result,
                cache: CacheStatus::Hit,
            });
        }

        tracing::info!("Cache miss for {}", ticker);
        let result = if self.config.coalesce_in_flight {
            self.run_coalesced(ticker).await?
        } else {
            self.run_and_store(ticker).await?
        };

        Ok(AnalysisOutcome {
            result,
            cache: CacheStatus::Miss,
        })
    }

    /// Join the in-flight run for `ticker`, or lead a new one. Every caller
    /// that joined a run gets its outcome, failure included. A cancelled
    /// leader hands the run to the next waiter.
    async fn run_coalesced(&self, ticker: &Ticker) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let cell = self
            .in_flight
            .entry(ticker.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let guard = InFlightGuard {
            in_flight: &self.in_flight,
            ticker,
            cell,
        };

        let outcome = guard.cell.get_or_init(|| self.run_and_store(ticker)).await.clone();
        drop(guard);
        outcome
    }

    async fn run_and_store(&self, ticker: &Ticker) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let result = match self.run_pipeline(ticker).await {
            Ok(result) => Arc::new(result),
            Err(e) => {
                tracing::warn!("Analysis failed for {}: {} ({})", ticker, e, e.kind());
                return Err(e);
            }
        };

        self.cache.store(ticker.clone(), Arc::clone(&result), self.config.cache_ttl);
        tracing::info!(
            "Cached analysis for {} ({}, {:.1}% vs intrinsic) for {}s",
            ticker,
            result.recommendation.as_str(),
            result.valuation.implied_overvaluation_pct,
            self.config.cache_ttl.as_secs()
        );
        Ok(result)
    }

    async fn run_pipeline(&self, ticker: &Ticker) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();

        tracing::debug!("Fetching filings and market data for {}", ticker);
        let (filings, market) = tokio::try_join!(
            self.with_timeout("filing source", self.filings.fetch_filings(ticker)),
            self.with_timeout("market data", self.market_data.fetch_market_data(ticker)),
        )?;

        tracing::debug!("Deriving metrics and valuation for {}", ticker);
        let metrics = self.engine.derive_metrics(&filings);
        let valuation = self.engine.value(&metrics, &market);
        let recommendation = recommend(valuation.implied_overvaluation_pct);
        let risks = self.engine.risks(&filings);
        let peer_comparison = self.engine.peers(ticker);

        tracing::debug!("Summarizing {} ({})", ticker, recommendation.as_str());
        let payload = SummaryPayload {
            ticker,
            metrics: &metrics,
            valuation: &valuation,
            market_data: market.as_map(),
            filings: &filings,
            recommendation,
        };
        let summary = self
            .with_timeout("summarizer", self.summarizer.summarize(&payload))
            .await?;

        let as_of = Local::now().format("%Y-%m-%d").to_string();
        let latency_ms = round_to(started.elapsed().as_secs_f64() * 1000.0, 2);

        Ok(AnalysisResult {
            ticker: ticker.clone(),
            as_of,
            reasoning: summary.clone(),
            summary,
            financials: metrics,
            valuation,
            risks,
            peer_comparison,
            momentum: market.momentum(),
            recommendation,
            raw: RawBlock {
                filing_insights: filings.mda_excerpt(FILING_INSIGHTS_CHARS),
                valuation_model: self.engine.model_name().to_string(),
                llm_prompt: "omitted".to_string(),
                latency_ms,
                extensions: BTreeMap::new(),
            },
        })
    }

    /// Bound an upstream call; running out of time counts as unavailability.
    async fn with_timeout<T>(
        &self,
        upstream: &str,
        call: impl Future<Output = Result<T, AnalysisError>>,
    ) -> Result<T, AnalysisError> {
        let limit = self.config.upstream_timeout;
        tokio::time::timeout(limit, call).await.map_err(|_| {
            AnalysisError::UpstreamUnavailable(format!("{} did not respond within {:?}", upstream, limit))
        })?
    }
}
