use std::collections::HashSet;

use tracing::debug;

use crate::models::transaction::{RawTransaction, TradeKey};

/// Removes repeated rows from an export.
///
/// Rows are considered repeats when they share a [`TradeKey`]. The key is a
/// heuristic, not a transaction id: two real fills with identical date,
/// symbol, action, quantity and price are collapsed into one.
pub struct DedupService;

impl DedupService {
    pub fn new() -> Self {
        Self
    }

    /// Keep the first occurrence of every trade key, in input order.
    pub fn dedupe(&self, transactions: Vec<RawTransaction>) -> Vec<RawTransaction> {
        let before = transactions.len();
        let mut seen: HashSet<TradeKey> = HashSet::with_capacity(before);
        let kept: Vec<RawTransaction> = transactions
            .into_iter()
            .filter(|tx| seen.insert(tx.trade_key()))
            .collect();

        if kept.len() < before {
            debug!(removed = before - kept.len(), kept = kept.len(), "Dropped duplicate rows");
        }
        kept
    }
}

impl Default for DedupService {
    fn default() -> Self {
        Self::new()
    }
}
