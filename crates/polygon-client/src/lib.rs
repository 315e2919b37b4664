use analysis_core::{AnalysisError, Bar, MarketDataSource, MarketSnapshot, RateLimiter, Ticker};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const BASE_URL: &str = "https://api.polygon.io";

/// Calendar days of daily bars requested; enough for a 200-session SMA.
const HISTORY_DAYS: i64 = 400;
const SMA_SHORT: usize = 50;
const SMA_LONG: usize = 200;
const RSI_PERIOD: usize = 14;
/// Benchmark used for beta
const BENCHMARK: &str = "SPY";
/// Requests sent before a 429 becomes a quota error
const MAX_ATTEMPTS: u32 = 3;
/// Longest wait between 429 retries, whatever `Retry-After` asks for
const MAX_RETRY_WAIT: Duration = Duration::from_secs(5);

/// Market-data client backed by the Polygon REST API.
#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
    retry_wait: Duration,
}

impl PolygonClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        // Default 500 req/min for Starter plan. Free tier users should set POLYGON_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::new("Polygon API", rate_limit, Duration::from_secs(60)),
            retry_wait: Duration::from_secs(2),
        }
    }

    /// Point the client at a different host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Default wait between 429 retries when the response has no usable
    /// `Retry-After`. Capped at five seconds.
    pub fn with_retry_wait(mut self, retry_wait: Duration) -> Self {
        self.retry_wait = retry_wait.min(MAX_RETRY_WAIT);
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder
            .build()
            .map_err(|e| AnalysisError::UpstreamUnavailable(e.to_string()))?;

        for attempt in 1..=MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::UpstreamUnavailable("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| AnalysisError::UpstreamUnavailable(format!("Polygon request failed: {}", e)))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }
            if attempt == MAX_ATTEMPTS {
                break;
            }

            let wait = retry_after(&response).unwrap_or(self.retry_wait).min(MAX_RETRY_WAIT);
            tracing::warn!(
                "Polygon 429 rate limited, waiting {:?} before retry {}/{}",
                wait,
                attempt,
                MAX_ATTEMPTS - 1
            );
            tokio::time::sleep(wait).await;
        }

        Err(AnalysisError::UpstreamQuotaExceeded(format!(
            "Rate limited by Polygon after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    /// Get daily aggregates (bars) for a symbol
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, AnalysisError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::UpstreamUnavailable(format!(
                "Aggregates HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::UpstreamFormat(format!("Aggregates payload: {}", e)))?;

        Ok(agg_response
            .results
            .into_iter()
            .filter_map(|r| {
                Some(Bar {
                    timestamp: DateTime::from_timestamp_millis(r.t)?,
                    open: r.o,
                    high: r.h,
                    low: r.l,
                    close: r.c,
                    volume: r.v,
                    vwap: r.vw,
                })
            })
            .collect())
    }

    /// Get snapshot for a ticker (near-real-time last trade, today's OHLCV, prev day)
    pub async fn get_snapshot(&self, symbol: &str) -> Result<SnapshotTicker, AnalysisError> {
        let url = format!(
            "{}/v2/snapshot/locale/us/markets/stocks/tickers/{}",
            self.base_url, symbol
        );

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::UpstreamUnavailable(format!(
                "Snapshot HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let snap_response: SnapshotResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::UpstreamFormat(format!("Snapshot payload: {}", e)))?;

        Ok(snap_response.ticker)
    }
}

#[async_trait]
impl MarketDataSource for PolygonClient {
    async fn fetch_market_data(&self, ticker: &Ticker) -> Result<MarketSnapshot, AnalysisError> {
        let now = Utc::now();
        let start = now - ChronoDuration::days(HISTORY_DAYS);

        let (bars, benchmark_bars, snapshot) = tokio::join!(
            self.get_daily_bars(ticker.as_str(), start, now),
            self.get_daily_bars(BENCHMARK, start, now),
            self.get_snapshot(ticker.as_str()),
        );
        let bars = bars?;

        // Benchmark and snapshot only refine the result
        let benchmark_bars = benchmark_bars.unwrap_or_else(|e| {
            tracing::warn!("Benchmark bars unavailable for beta of {}: {}", ticker, e);
            Vec::new()
        });
        let snapshot = snapshot
            .map_err(|e| tracing::warn!("Snapshot unavailable for {}, using last close: {}", ticker, e))
            .ok();

        build_snapshot(ticker, &bars, &benchmark_bars, snapshot.as_ref())
    }
}

/// `Retry-After` in whole seconds; HTTP-date values are ignored.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

/// Derive the indicator snapshot from daily bars.
pub fn build_snapshot(
    ticker: &Ticker,
    bars: &[Bar],
    benchmark_bars: &[Bar],
    snapshot: Option<&SnapshotTicker>,
) -> Result<MarketSnapshot, AnalysisError> {
    if bars.len() < SMA_LONG {
        return Err(AnalysisError::UpstreamFormat(format!(
            "{} has {} daily bars; {} required for indicators",
            ticker,
            bars.len(),
            SMA_LONG
        )));
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let last_close = closes[closes.len() - 1];

    let snapshot_price = snapshot
        .and_then(|snap| snap.last_trade.as_ref())
        .and_then(|lt| lt.p)
        .filter(|p| *p > 0.0);
    let price = snapshot_price.unwrap_or(last_close);

    let sma_50 = technical_analysis::sma(&closes, SMA_SHORT).last().copied();
    let sma_200 = technical_analysis::sma(&closes, SMA_LONG).last().copied();
    let rsi = technical_analysis::rsi(&closes, RSI_PERIOD).last().copied();
    let (sma_50, sma_200, rsi) = match (sma_50, sma_200, rsi) {
        (Some(s50), Some(s200), Some(r)) => (s50, s200, r),
        _ => {
            return Err(AnalysisError::UpstreamFormat(format!(
                "Could not compute indicators for {}",
                ticker
            )))
        }
    };

    let (asset_returns, benchmark_returns) = technical_analysis::paired_returns(bars, benchmark_bars);
    let beta = technical_analysis::beta(&asset_returns, &benchmark_returns).unwrap_or_else(|| {
        tracing::debug!("Not enough benchmark overlap for {}, defaulting beta to 1.0", ticker);
        1.0
    });

    let mut extra = BTreeMap::new();
    extra.insert("last_close".to_string(), last_close);
    if let Some(change) = snapshot.and_then(|s| s.todays_change_perc) {
        extra.insert("day_change_pct".to_string(), change);
    }

    Ok(MarketSnapshot {
        price,
        beta,
        rsi,
        sma_50,
        sma_200,
        extra,
    })
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    v: f64, // volume
    #[serde(default)]
    vw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    ticker: SnapshotTicker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTicker {
    pub day: Option<SnapshotDay>,
    #[serde(rename = "lastTrade")]
    pub last_trade: Option<SnapshotLastTrade>,
    #[serde(rename = "prevDay")]
    pub prev_day: Option<SnapshotDay>,
    #[serde(rename = "todaysChangePerc")]
    pub todays_change_perc: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDay {
    pub o: Option<f64>,
    pub h: Option<f64>,
    pub l: Option<f64>,
    pub c: Option<f64>,
    pub v: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLastTrade {
    pub p: Option<f64>,
    pub s: Option<i64>,
    pub t: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn bars(n: usize, start: f64, step: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = start + step * i as f64;
                Bar {
                    timestamp: Utc::now() - ChronoDuration::days((n - i) as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1.0,
                    vwap: None,
                }
            })
            .collect()
    }

    fn ticker() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    #[test]
    fn test_snapshot_from_bars_uses_last_close_without_quote() {
        let history = bars(250, 100.0, 0.5);
        let snap = build_snapshot(&ticker(), &history, &[], None).unwrap();

        assert_eq!(snap.price, 100.0 + 0.5 * 249.0);
        assert_eq!(snap.beta, 1.0);
        assert_eq!(snap.rsi, 100.0);
        assert!(snap.sma_50 > snap.sma_200);
        assert!(snap.extra.contains_key("last_close"));
    }

    #[test]
    fn test_snapshot_prefers_last_trade_price() {
        let history = bars(210, 50.0, 0.1);
        let quote = SnapshotTicker {
            day: None,
            last_trade: Some(SnapshotLastTrade { p: Some(77.7), s: None, t: None }),
            prev_day: None,
            todays_change_perc: Some(1.25),
        };
        let snap = build_snapshot(&ticker(), &history, &[], Some(&quote)).unwrap();
        assert_eq!(snap.price, 77.7);
        assert_eq!(snap.extra.get("day_change_pct"), Some(&1.25));
    }

    #[test]
    fn test_short_history_is_format_error() {
        let history = bars(120, 10.0, 0.1);
        let err = build_snapshot(&ticker(), &history, &[], None).unwrap_err();
        assert_eq!(err.kind(), "UpstreamFormatError");
    }

    #[test]
    fn test_snapshot_payload_parses() {
        let raw = r#"{"ticker":{"day":{"o":1.0,"h":2.0,"l":0.5,"c":1.5,"v":100.0},
            "lastTrade":{"p":181.3,"s":100,"t":1700000000000},"todaysChangePerc":0.8}}"#;
        let parsed: SnapshotResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.ticker.last_trade.unwrap().p, Some(181.3));
    }

    /// Local server answering every request with `429`. Returns its base URL
    /// and a counter of requests served.
    async fn rate_limited_server(retry_after: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&served);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    let response = format!(
                        "HTTP/1.1 429 Too Many Requests\r\nretry-after: {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        retry_after
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}", addr), served)
    }

    #[tokio::test]
    async fn test_persistent_429_is_quota_exceeded() {
        let (base_url, served) = rate_limited_server("0").await;
        let client = PolygonClient::new("test-key".to_string(), Duration::from_secs(5)).with_base_url(base_url);

        let err = client.get_snapshot("AAPL").await.unwrap_err();

        assert_eq!(err.kind(), "UpstreamQuotaExceeded");
        assert_eq!(served.load(Ordering::SeqCst), MAX_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_retry_wait_stays_within_call_budget() {
        let (base_url, _) = rate_limited_server("3600").await;
        let client = PolygonClient::new("test-key".to_string(), Duration::from_secs(5))
            .with_base_url(base_url)
            .with_retry_wait(Duration::from_secs(600));
        assert_eq!(client.retry_wait, MAX_RETRY_WAIT);

        let started = std::time::Instant::now();
        let err = client.get_snapshot("AAPL").await.unwrap_err();

        assert_eq!(err.kind(), "UpstreamQuotaExceeded");
        // Two capped waits, well inside the default 30s upstream timeout
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
