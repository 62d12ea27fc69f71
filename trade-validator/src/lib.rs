//! Stateless trade validation.
//!
//! Six ordered checks; the first failure wins and its reason embeds the
//! offending value. Rejects are diagnostics, not errors: `validate_batch`
//! reports them through the log facade and returns only the clean stream.

use std::sync::LazyLock;

use log::{info, warn};
use regex::Regex;

use core_types::types::{Trade, ValidationOutcome};

static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Z]{1,10}$").expect("symbol pattern compiles"));

pub fn validate(trade: &Trade) -> ValidationOutcome {
    if !SYMBOL_RE.is_match(&trade.symbol) {
        return ValidationOutcome::reject(format!(
            "invalid symbol '{}': must be 1-10 uppercase letters",
            trade.symbol
        ));
    }
    // Written as a negated range so NaN fails too.
    if !(trade.price > 0.0 && trade.price < 1_000_000.0) {
        return ValidationOutcome::reject(format!(
            "invalid price {}: must be between 0 and 1000000",
            trade.price
        ));
    }
    if trade.volume == 0 {
        return ValidationOutcome::reject("invalid volume 0: must be > 0");
    }
    if !matches!(trade.side, 'B' | 'S' | 'N') {
        return ValidationOutcome::reject(format!(
            "invalid side '{}': must be B, S, or N",
            trade.side
        ));
    }
    if !matches!(trade.kind, 'M' | 'L' | 'I') {
        return ValidationOutcome::reject(format!(
            "invalid type '{}': must be M, L, or I",
            trade.kind
        ));
    }
    if trade.timestamp <= 0 {
        return ValidationOutcome::reject(format!(
            "invalid timestamp {}: must be positive nanoseconds since epoch",
            trade.timestamp
        ));
    }
    ValidationOutcome::Ok
}

/// Filter a batch down to its clean subsequence, preserving order. Passing
/// records are moved, not copied; rejects are counted and logged.
pub fn validate_batch(trades: Vec<Trade>) -> Vec<Trade> {
    let mut clean = Vec::with_capacity(trades.len());
    let mut rejected = 0usize;
    for trade in trades {
        match validate(&trade) {
            ValidationOutcome::Ok => clean.push(trade),
            ValidationOutcome::Reject { reason } => {
                rejected += 1;
                warn!("rejected trade_id={}: {reason}", trade.trade_id);
            }
        }
    }
    info!(
        "validation complete: {} clean, {} rejected",
        clean.len(),
        rejected
    );
    clean
}
