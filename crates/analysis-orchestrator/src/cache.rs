use analysis_core::{AnalysisResult, Ticker};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct CacheEntry {
    result: Arc<AnalysisResult>,
    expires_at: Instant,
}

/// Per-ticker store of finished analyses with a fixed time-to-live.
///
/// Results are shared read-only through `Arc` and replaced wholesale,
/// never mutated in place. Expired entries are evicted lazily on lookup;
/// [`AnalysisCache::spawn_sweeper`] adds optional periodic eviction.
#[derive(Default)]
pub struct AnalysisCache {
    entries: DashMap<Ticker, CacheEntry>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh entry for `ticker`, if any. An expired entry is removed under
    /// the same shard lock that observed it.
    pub fn lookup(&self, ticker: &Ticker) -> Option<Arc<AnalysisResult>> {
        if !self.entries.contains_key(ticker) {
            return None;
        }

        match self.entries.entry(ticker.clone()) {
            Entry::Occupied(entry) => {
                if Instant::now() >= entry.get().expires_at {
                    entry.remove();
                    tracing::debug!("Evicted expired analysis for {}", ticker);
                    None
                } else {
                    Some(Arc::clone(&entry.get().result))
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Insert or replace the entry for `ticker`, expiring `ttl` from now.
    pub fn store(&self, ticker: Ticker, result: Arc<AnalysisResult>, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(ticker, CacheEntry { result, expires_at });
    }

    pub fn invalidate(&self, ticker: &Ticker) -> bool {
        self.entries.remove(ticker).is_some()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    /// Entry count, including expired entries not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Background task purging expired entries every `interval`.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            // First tick completes immediately
            timer.tick().await;
            loop {
                timer.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    tracing::debug!("Cache sweep purged {} expired analyses", purged);
                }
            }
        })
    }
}
