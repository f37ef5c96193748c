use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::models::trade::{MatchResult, MatchedTrade};
use crate::models::transaction::RawTransaction;

/// Group key: (symbol, account). `None` when the export has no accounts.
type GroupKey = (String, Option<String>);

/// Pairs buys with sells into closed round trips.
///
/// Policy, per (symbol, account) group:
/// 1. Rows are stable-sorted by transaction date.
/// 2. Each buy, earliest first, takes the first unconsumed sell in sorted
///    order whose absolute quantity equals its own.
/// 3. Unpaired buys and sells stay open. No partial fills, no splitting,
///    and no pairing across symbols or accounts.
///
/// Sell selection is positional ("first available"), not "earliest sell
/// after the buy": a sell dated before its buy can still be picked.
/// Switching to FIFO lots or date-constrained matching changes results.
pub struct MatchingService;

impl MatchingService {
    pub fn new() -> Self {
        Self
    }

    /// Match every buy/sell pair in the (already deduplicated) transactions.
    ///
    /// Rows whose action is neither buy nor sell are ignored. Groups are
    /// visited in (symbol, account) order so output is deterministic.
    pub fn match_trades(&self, transactions: &[RawTransaction]) -> MatchResult {
        let mut groups: BTreeMap<GroupKey, Vec<&RawTransaction>> = BTreeMap::new();
        for tx in transactions {
            groups
                .entry((tx.symbol.clone(), tx.account.clone()))
                .or_default()
                .push(tx);
        }

        let mut result = MatchResult::default();
        for ((symbol, account), mut rows) in groups {
            // sort_by_key is stable: same-date rows keep input order
            rows.sort_by_key(|tx| tx.transaction_date);
            let before = result.trades.len();
            Self::match_group(&rows, &mut result);
            debug!(
                symbol = %symbol,
                account = account.as_deref().unwrap_or("-"),
                matched = result.trades.len() - before,
                "Matched group"
            );
        }

        info!(
            matched = result.trades.len(),
            unmatched_buys = result.unmatched_buys.len(),
            unmatched_sells = result.unmatched_sells.len(),
            "Trade matching complete"
        );
        result
    }

    /// Match a single date-sorted group, appending to `result`.
    fn match_group(rows: &[&RawTransaction], result: &mut MatchResult) {
        let buys: Vec<&RawTransaction> = rows.iter().copied().filter(|t| t.action.is_buy()).collect();
        let sells: Vec<&RawTransaction> = rows.iter().copied().filter(|t| t.action.is_sell()).collect();
        let mut consumed = vec![false; sells.len()];

        for buy in buys {
            let magnitude = buy.quantity.abs();
            let candidate = (0..sells.len())
                .find(|&i| !consumed[i] && sells[i].quantity.abs() == magnitude);

            match candidate {
                Some(i) => {
                    consumed[i] = true;
                    result.trades.push(MatchedTrade::from_legs(buy, sells[i]));
                }
                None => result.unmatched_buys.push(buy.clone()),
            }
        }

        result.unmatched_sells.extend(
            sells
                .iter()
                .zip(&consumed)
                .filter(|(_, used)| !**used)
                .map(|(sell, _)| (*sell).clone()),
        );
    }
}

impl Default for MatchingService {
    fn default() -> Self {
        Self::new()
    }
}
