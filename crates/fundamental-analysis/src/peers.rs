use analysis_core::{PeerComparison, PeerMetric, Ticker};

pub const PEER_METRIC: &str = "EV/EBITDA";
pub const PEER_COUNT: usize = 2;

/// Reference EV/EBITDA multiples for large-cap comparables.
const PEER_TABLE: &[(&str, f64)] = &[
    ("AAPL", 24.1),
    ("MSFT", 22.5),
    ("GOOGL", 15.3),
    ("AMZN", 18.7),
    ("META", 14.2),
    ("NVDA", 45.3),
];

/// Peers from the static reference table, never including the ticker itself.
pub fn peer_comparison(ticker: &Ticker) -> PeerComparison {
    let peers = PEER_TABLE
        .iter()
        .filter(|(symbol, _)| *symbol != ticker.base())
        .take(PEER_COUNT)
        .map(|(symbol, value)| PeerMetric {
            ticker: symbol.to_string(),
            metric: PEER_METRIC.to_string(),
            value: *value,
        })
        .collect();

    PeerComparison { peers }
}
