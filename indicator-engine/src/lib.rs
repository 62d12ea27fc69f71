//! Per-symbol technical indicators: SMA, RSI, and VWAP.
//!
//! Trades are grouped by symbol into parallel price/volume series in input
//! order, then each series is reduced to one [`IndicatorRow`]. The
//! effective window is `min(period, records for the symbol)`.

use std::collections::HashMap;

use log::info;

use core_types::types::{IndicatorRow, Trade};

#[derive(Default)]
struct SymbolSeries {
    prices: Vec<f64>,
    volumes: Vec<u32>,
}

pub fn compute_all(trades: &[Trade], period: usize) -> Vec<IndicatorRow> {
    if trades.is_empty() {
        return Vec::new();
    }

    let mut by_symbol: HashMap<&str, SymbolSeries> = HashMap::new();
    for trade in trades {
        let series = by_symbol.entry(trade.symbol.as_str()).or_default();
        series.prices.push(trade.price);
        series.volumes.push(trade.volume);
    }

    let mut rows = Vec::with_capacity(by_symbol.len());
    for (symbol, series) in &by_symbol {
        let effective = period.min(series.prices.len());
        rows.push(IndicatorRow {
            symbol: (*symbol).to_string(),
            sma: sma(&series.prices, effective),
            rsi: rsi(&series.prices, effective),
            vwap: vwap(&series.prices, &series.volumes),
            period: effective,
        });
    }
    info!(
        "computed indicators for {} symbols over {} trades",
        rows.len(),
        trades.len()
    );
    rows
}

/// Arithmetic mean of the last `period` prices.
fn sma(prices: &[f64], period: usize) -> f64 {
    if prices.is_empty() || period == 0 {
        return 0.0;
    }
    let window = &prices[prices.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

/// Relative strength over the differences of the last `period + 1` prices
/// (fewer if unavailable). No differences is neutral; no losses saturates.
fn rsi(prices: &[f64], period: usize) -> f64 {
    let start = prices.len().saturating_sub(period + 1);
    let window = &prices[start..];
    if window.len() < 2 {
        return 50.0;
    }

    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut count = 0usize;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gain += change;
        } else {
            loss -= change;
        }
        count += 1;
    }

    let avg_gain = gain / count as f64;
    let avg_loss = loss / count as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Volume-weighted average price over ALL records for the symbol.
fn vwap(prices: &[f64], volumes: &[u32]) -> f64 {
    let mut total_value = 0.0;
    let mut total_volume = 0.0;
    for (price, volume) in prices.iter().zip(volumes) {
        total_value += price * f64::from(*volume);
        total_volume += f64::from(*volume);
    }
    if total_volume == 0.0 {
        return 0.0;
    }
    total_value / total_volume
}
