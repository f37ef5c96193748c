use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::transaction::RawTransaction;

/// A closed round trip: one buy paired with one sell of the same magnitude.
///
/// Produced by the matcher and never mutated afterwards. Note that
/// `exit_date >= entry_date` is not guaranteed; the matcher only constrains
/// quantity magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedTrade {
    /// Account of the pair; `None` when the export has no account column
    pub account: Option<String>,

    pub symbol: String,

    /// Date of the buy leg
    pub entry_date: NaiveDateTime,

    /// Date of the sell leg
    pub exit_date: NaiveDateTime,

    pub entry_price: f64,

    pub exit_price: f64,

    /// Shared absolute quantity of both legs
    pub quantity: f64,

    /// Realized PnL: sell net amount + buy net amount
    pub pnl: f64,
}

impl MatchedTrade {
    /// Pair a buy leg with a sell leg.
    pub fn from_legs(buy: &RawTransaction, sell: &RawTransaction) -> Self {
        Self {
            account: buy.account.clone(),
            symbol: buy.symbol.clone(),
            entry_date: buy.transaction_date,
            exit_date: sell.transaction_date,
            entry_price: buy.price,
            exit_price: sell.price,
            quantity: buy.quantity.abs(),
            pnl: sell.net_amount + buy.net_amount,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}

/// Matched trades plus the legs that stayed open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Closed round trips, grouped by (symbol, account) and in buy date order
    pub trades: Vec<MatchedTrade>,

    /// Buys with no unconsumed sell of equal magnitude
    pub unmatched_buys: Vec<RawTransaction>,

    /// Sells never picked by any buy
    pub unmatched_sells: Vec<RawTransaction>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
