use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::trade::MatchedTrade;

/// Label used for trades that carry no account.
pub const UNASSIGNED_ACCOUNT: &str = "Unassigned";

/// Dimension a PnL series is bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketDimension {
    /// Exit date, `YYYY-MM-DD`
    Day,
    /// Exit week, `YYYY-Www` (labelling depends on settings)
    Week,
    /// Exit month, `YYYY-MM`
    Month,
    Symbol,
    Account,
}

impl std::fmt::Display for BucketDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketDimension::Day => write!(f, "Daily"),
            BucketDimension::Week => write!(f, "Weekly"),
            BucketDimension::Month => write!(f, "Monthly"),
            BucketDimension::Symbol => write!(f, "By symbol"),
            BucketDimension::Account => write!(f, "By account"),
        }
    }
}

/// Bucket key → summed PnL. Only buckets with at least one trade appear.
pub type PnlSeries = BTreeMap<String, f64>;

/// Scalar statistics over a set of matched trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlSummary {
    pub trade_count: usize,

    /// Trades with pnl > 0
    pub wins: usize,

    /// Trades with pnl < 0
    pub losses: usize,

    /// Trades with pnl == 0
    pub breakeven: usize,

    /// wins / trade_count, 0 when there are no trades
    pub win_rate: f64,

    pub total_pnl: f64,

    /// 0 when there are no trades
    pub mean_pnl: f64,

    pub max_pnl: Option<f64>,

    pub min_pnl: Option<f64>,

    /// Best trades, highest PnL first
    pub top_trades: Vec<MatchedTrade>,

    /// Worst trades, lowest PnL first
    pub bottom_trades: Vec<MatchedTrade>,
}

/// Every series plus the summary, ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlReport {
    pub daily: PnlSeries,
    pub weekly: PnlSeries,
    pub monthly: PnlSeries,
    pub by_symbol: PnlSeries,
    pub by_account: PnlSeries,
    pub summary: PnlSummary,
}

impl PnlReport {
    /// Look up the series for a dimension.
    pub fn series(&self, dimension: BucketDimension) -> &PnlSeries {
        match dimension {
            BucketDimension::Day => &self.daily,
            BucketDimension::Week => &self.weekly,
            BucketDimension::Month => &self.monthly,
            BucketDimension::Symbol => &self.by_symbol,
            BucketDimension::Account => &self.by_account,
        }
    }
}
