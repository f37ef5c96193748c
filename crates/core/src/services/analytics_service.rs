use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

use tracing::debug;

use crate::models::analytics::{BucketDimension, PnlReport, PnlSeries, PnlSummary, UNASSIGNED_ACCOUNT};
use crate::models::settings::{Settings, WeekLabelStyle};
use crate::models::trade::MatchedTrade;

/// Rolls matched trades up into PnL series and summary statistics.
///
/// Time buckets use the exit (sell) date. Empty buckets are never emitted.
pub struct AnalyticsService {
    week_label: WeekLabelStyle,
    top_n: usize,
}

impl AnalyticsService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            week_label: settings.week_label,
            top_n: settings.top_n,
        }
    }

    /// Bucket key of a trade along one dimension.
    pub fn bucket_key(&self, trade: &MatchedTrade, dimension: BucketDimension) -> String {
        let exit = trade.exit_date.date();
        match dimension {
            BucketDimension::Day => exit.format("%Y-%m-%d").to_string(),
            BucketDimension::Week => self.week_key(exit),
            BucketDimension::Month => exit.format("%Y-%m").to_string(),
            BucketDimension::Symbol => trade.symbol.clone(),
            BucketDimension::Account => trade
                .account
                .clone()
                .unwrap_or_else(|| UNASSIGNED_ACCOUNT.to_string()),
        }
    }

    fn week_key(&self, date: NaiveDate) -> String {
        match self.week_label {
            WeekLabelStyle::Iso => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            WeekLabelStyle::SundayStart => date.format("%Y-W%U").to_string(),
        }
    }

    /// Sum PnL per bucket along one dimension.
    pub fn aggregate(&self, trades: &[MatchedTrade], dimension: BucketDimension) -> PnlSeries {
        let mut series = PnlSeries::new();
        for trade in trades {
            *series.entry(self.bucket_key(trade, dimension)).or_insert(0.0) += trade.pnl;
        }
        series
    }

    /// Count, win/loss split, extremes, and best/worst trades.
    pub fn summarize(&self, trades: &[MatchedTrade]) -> PnlSummary {
        let trade_count = trades.len();
        if trade_count == 0 {
            return PnlSummary::default();
        }

        let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losses = trades.iter().filter(|t| t.pnl < 0.0).count();
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

        // Stable sorts: equal PnL keeps matcher order
        let mut ranked: Vec<MatchedTrade> = trades.to_vec();
        ranked.sort_by(|a, b| b.pnl.total_cmp(&a.pnl));
        let top_trades: Vec<MatchedTrade> = ranked.iter().take(self.top_n).cloned().collect();
        ranked.sort_by(|a, b| a.pnl.total_cmp(&b.pnl));
        let bottom_trades: Vec<MatchedTrade> = ranked.iter().take(self.top_n).cloned().collect();

        PnlSummary {
            trade_count,
            wins,
            losses,
            breakeven: trade_count - wins - losses,
            win_rate: wins as f64 / trade_count as f64,
            total_pnl,
            mean_pnl: total_pnl / trade_count as f64,
            max_pnl: trades.iter().map(|t| t.pnl).max_by(f64::total_cmp),
            min_pnl: trades.iter().map(|t| t.pnl).min_by(f64::total_cmp),
            top_trades,
            bottom_trades,
        }
    }

    /// All five series plus the summary.
    pub fn build_report(&self, trades: &[MatchedTrade]) -> PnlReport {
        let report = PnlReport {
            daily: self.aggregate(trades, BucketDimension::Day),
            weekly: self.aggregate(trades, BucketDimension::Week),
            monthly: self.aggregate(trades, BucketDimension::Month),
            by_symbol: self.aggregate(trades, BucketDimension::Symbol),
            by_account: self.aggregate(trades, BucketDimension::Account),
            summary: self.summarize(trades),
        };
        debug!(
            trades = report.summary.trade_count,
            days = report.daily.len(),
            total_pnl = report.summary.total_pnl,
            "Built PnL report"
        );
        report
    }

    /// (year, month) pairs with at least one exit, ascending.
    pub fn available_months(&self, trades: &[MatchedTrade]) -> Vec<(i32, u32)> {
        trades
            .iter()
            .map(|t| (t.exit_date.year(), t.exit_date.month()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}
