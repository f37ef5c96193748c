use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Direction of a brokerage transaction.
///
/// Parsing is case- and whitespace-insensitive. Anything that is not a buy
/// or a sell keeps its normalized label so that two different non-trade
/// actions on the same row data stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    /// Opening leg
    Buy,
    /// Closing leg
    Sell,
    /// Dividends, transfers, fees... (excluded from matching)
    Other(String),
}

impl TradeAction {
    pub fn parse(raw: &str) -> Self {
        let label = raw.trim().to_lowercase();
        match label.as_str() {
            "buy" | "bought" => TradeAction::Buy,
            "sell" | "sold" => TradeAction::Sell,
            _ => TradeAction::Other(label),
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, TradeAction::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, TradeAction::Sell)
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
            TradeAction::Other(label) => write!(f, "{label}"),
        }
    }
}

/// One ingested, normalized row of a brokerage export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// When the transaction happened (midnight when the export has dates only)
    pub transaction_date: NaiveDateTime,

    /// Instrument identifier, trimmed (e.g., "AAPL")
    pub symbol: String,

    /// Buy, sell, or some other activity
    pub action: TradeAction,

    /// Quantity as exported; may be signed
    pub quantity: f64,

    /// Per-unit price in currency units
    pub price: f64,

    /// Signed cash flow: negative for a buy, positive for a sell by convention
    pub net_amount: f64,

    /// Account identifier; `None` when the export has no account column
    #[serde(default)]
    pub account: Option<String>,
}

impl RawTransaction {
    /// Identity used for deduplication.
    pub fn trade_key(&self) -> TradeKey {
        TradeKey::of(self)
    }
}

/// Deterministic identity over (date, symbol, action, quantity, price).
///
/// This is NOT a unique transaction id: two genuinely distinct fills that
/// share all five fields produce the same key and collapse into one row
/// during deduplication. Account and net amount are deliberately excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradeKey {
    pub transaction_date: NaiveDateTime,
    pub symbol: String,
    pub action: TradeAction,
    quantity_bits: u64,
    price_bits: u64,
}

impl TradeKey {
    pub fn of(tx: &RawTransaction) -> Self {
        Self {
            transaction_date: tx.transaction_date,
            symbol: tx.symbol.clone(),
            action: tx.action.clone(),
            quantity_bits: float_bits(tx.quantity),
            price_bits: float_bits(tx.price),
        }
    }
}

/// Bit pattern of a float with `-0.0` folded onto `0.0`.
fn float_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// Which account's transactions an analysis covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountFilter {
    #[default]
    All,
    Only(String),
}

impl AccountFilter {
    pub fn matches(&self, tx: &RawTransaction) -> bool {
        match self {
            AccountFilter::All => true,
            AccountFilter::Only(account) => tx.account.as_deref() == Some(account.as_str()),
        }
    }
}
