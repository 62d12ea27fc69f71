use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One trade execution as parsed from the exchange flatfile.
///
/// `symbol` is the only owned allocation; everything else is inline.
/// Ordering and equality are defined on `(timestamp, trade_id)`, and
/// `trade_id` is unique within a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub order_id: u64,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub symbol: String,
    pub price: f64,
    pub volume: u32,
    /// 'B' = buy, 'S' = sell, 'N' = unknown.
    pub side: char,
    /// Order type: 'M' = market, 'L' = limit, 'I' = IOC. Persisted as `type`.
    pub kind: char,
    /// Institutional flag ('1' in the feed).
    pub is_pro: bool,
}

impl Trade {
    fn sort_key(&self) -> (i64, u64) {
        (self.timestamp, self.trade_id)
    }
}

impl PartialEq for Trade {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Trade {}

impl PartialOrd for Trade {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Trade {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Derived per-symbol metrics for one pipeline run.
///
/// The shared `computed_at` run stamp is assigned by the database sink at
/// persist time, not carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub symbol: String,
    pub sma: f64,
    /// 0..=100 oscillator.
    pub rsi: f64,
    pub vwap: f64,
    /// Effective window: `min(configured period, records for symbol)`.
    pub period: usize,
}

/// Outcome of validating a single [`Trade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Ok,
    Reject { reason: String },
}

impl ValidationOutcome {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(timestamp: i64, trade_id: u64) -> Trade {
        Trade {
            trade_id,
            order_id: 0,
            timestamp,
            symbol: "TCS".to_string(),
            price: 1.0,
            volume: 1,
            side: 'B',
            kind: 'L',
            is_pro: false,
        }
    }

    #[test]
    fn orders_by_timestamp_then_trade_id() {
        let mut trades = vec![trade(20, 1), trade(10, 2), trade(10, 1)];
        trades.sort();
        let keys: Vec<(i64, u64)> = trades.iter().map(|t| (t.timestamp, t.trade_id)).collect();
        assert_eq!(keys, vec![(10, 1), (10, 2), (20, 1)]);
    }

    #[test]
    fn equality_ignores_payload_fields() {
        let mut a = trade(10, 1);
        let mut b = trade(10, 1);
        a.price = 100.0;
        b.price = 200.0;
        assert_eq!(a, b);
    }
}
