use analysis_core::Bar;
use std::collections::BTreeMap;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    let mut window_sum: f64 = data[..period].iter().sum();
    result.push(window_sum / period as f64);
    for i in period..data.len() {
        window_sum += data[i] - data[i - period];
        result.push(window_sum / period as f64);
    }
    result
}

/// Relative Strength Index (Wilder smoothing). One value per bar after the
/// first `period` changes.
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period + 1 {
        return vec![];
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = data
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut rsi_values = Vec::with_capacity(gains.len() - period + 1);
    rsi_values.push(rsi_from_averages(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        rsi_values.push(rsi_from_averages(avg_gain, avg_loss));
    }

    rsi_values
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return 50.0;
        }
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Period-over-period close returns of `asset` and `benchmark` over the
/// sessions both series traded, paired by calendar date.
///
/// A session missing from either series is skipped in both, so a return
/// always spans the same two dates on each side. Windows starting at a
/// zero close are dropped from both series.
pub fn paired_returns(asset: &[Bar], benchmark: &[Bar]) -> (Vec<f64>, Vec<f64>) {
    let benchmark_closes: BTreeMap<_, f64> = benchmark
        .iter()
        .map(|bar| (bar.timestamp.date_naive(), bar.close))
        .collect();
    let asset_closes: BTreeMap<_, f64> = asset
        .iter()
        .map(|bar| (bar.timestamp.date_naive(), bar.close))
        .collect();

    let common: Vec<(f64, f64)> = asset_closes
        .iter()
        .filter_map(|(date, close)| benchmark_closes.get(date).map(|bench| (*close, *bench)))
        .collect();

    common
        .windows(2)
        .filter(|w| w[0].0 != 0.0 && w[0].1 != 0.0)
        .map(|w| ((w[1].0 - w[0].0) / w[0].0, (w[1].1 - w[0].1) / w[0].1))
        .unzip()
}

/// Beta of `asset` returns against `benchmark` returns, using the most
/// recent observations of each; pass date-paired series from
/// [`paired_returns`]. `None` with fewer than 20 pairs or a flat
/// benchmark.
pub fn beta(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let n = asset.len().min(benchmark.len());
    if n < 20 {
        return None;
    }
    let a = &asset[asset.len() - n..];
    let b = &benchmark[benchmark.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let covariance = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64;
    let variance = b.iter().map(|y| (y - mean_b).powi(2)).sum::<f64>() / (n - 1) as f64;

    if variance == 0.0 {
        None
    } else {
        Some(covariance / variance)
    }
}
