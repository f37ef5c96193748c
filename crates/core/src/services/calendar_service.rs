use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

use tracing::debug;

use crate::errors::CoreError;
use crate::models::calendar::{
    CalendarCell, CalendarDay, CalendarMonth, CalendarWeek, DayClass, DayTradeDetail, DAYS_PER_WEEK,
};
use crate::models::settings::{Settings, WeekStart};
use crate::models::trade::MatchedTrade;

/// Lays realized PnL out as a month grid for calendar display.
///
/// The core computes all the numbers; the frontend only renders.
pub struct CalendarService {
    week_start: WeekStart,
}

impl CalendarService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            week_start: settings.calendar_week_start,
        }
    }

    /// Build the grid for `year`/`month` from trades' exit dates.
    ///
    /// Every row has exactly seven cells. The first row is padded before
    /// day 1 and the last row after the final day of the month.
    pub fn build_month(
        &self,
        year: i32,
        month: u32,
        trades: &[MatchedTrade],
    ) -> Result<CalendarMonth, CoreError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CoreError::Validation(format!("Invalid month {year}-{month:02}")))?;
        let month_len = days_in_month(first)?;

        // Index this month's trades by exit day
        let mut by_day: HashMap<u32, Vec<&MatchedTrade>> = HashMap::new();
        for trade in trades {
            let exit = trade.exit_date.date();
            if exit.year() == year && exit.month() == month {
                by_day.entry(exit.day()).or_default().push(trade);
            }
        }

        let leading = (match self.week_start {
            WeekStart::Monday => first.weekday().num_days_from_monday(),
            WeekStart::Sunday => first.weekday().num_days_from_sunday(),
        }) as usize;

        let mut cells: Vec<CalendarCell> =
            Vec::with_capacity(leading + month_len as usize + DAYS_PER_WEEK);
        cells.resize_with(leading, CalendarCell::default);

        let mut total_pnl = 0.0;
        let mut trading_days = 0;
        for (offset, date) in first.iter_days().take(month_len as usize).enumerate() {
            let day_number = offset as u32 + 1;
            let day_trades = by_day.remove(&day_number).unwrap_or_default();
            let day = Self::summarize_day(date, &day_trades);
            total_pnl += day.pnl;
            if day.trade_count > 0 {
                trading_days += 1;
            }
            cells.push(CalendarCell::Day(day));
        }

        // Right-pad to a whole number of weeks
        let remainder = cells.len() % DAYS_PER_WEEK;
        if remainder != 0 {
            let padded = cells.len() + DAYS_PER_WEEK - remainder;
            cells.resize_with(padded, CalendarCell::default);
        }

        let weeks: Vec<CalendarWeek> = cells
            .chunks(DAYS_PER_WEEK)
            .map(|chunk| CalendarWeek {
                cells: std::array::from_fn(|i| chunk[i].clone()),
            })
            .collect();

        debug!(year, month, weeks = weeks.len(), trading_days, "Built calendar month");

        Ok(CalendarMonth {
            year,
            month,
            week_start: self.week_start,
            weeks,
            total_pnl,
            trading_days,
        })
    }

    fn summarize_day(date: NaiveDate, trades: &[&MatchedTrade]) -> CalendarDay {
        let pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let class = if trades.is_empty() {
            DayClass::NoTrades
        } else if pnl > 0.0 {
            DayClass::Positive
        } else if pnl < 0.0 {
            DayClass::Negative
        } else {
            DayClass::Flat
        };

        CalendarDay {
            date,
            pnl,
            trade_count: trades.len(),
            trades: trades
                .iter()
                .map(|t| DayTradeDetail {
                    symbol: t.symbol.clone(),
                    pnl: t.pnl,
                })
                .collect(),
            class,
        }
    }
}

impl Default for CalendarService {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

/// Length of the month starting at `first`.
fn days_in_month(first: NaiveDate) -> Result<u32, CoreError> {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    let next = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CoreError::Validation(format!("Month after {first} is out of range")))?;
    Ok((next - first).num_days() as u32)
}
