use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::settings::WeekStart;

/// Number of columns in every calendar row.
pub const DAYS_PER_WEEK: usize = 7;

/// Display category of an in-month day. Padding cells have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayClass {
    NoTrades,
    Positive,
    Negative,
    /// Traded, but the day nets to exactly zero
    Flat,
}

/// One contributing trade, for tooltips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTradeDetail {
    pub symbol: String,
    pub pnl: f64,
}

/// An in-month day with its realized PnL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub pnl: f64,
    pub trade_count: usize,
    pub trades: Vec<DayTradeDetail>,
    pub class: DayClass,
}

/// A grid cell: either a day of the month or empty padding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CalendarCell {
    #[default]
    Padding,
    Day(CalendarDay),
}

impl CalendarCell {
    pub fn day(&self) -> Option<&CalendarDay> {
        match self {
            CalendarCell::Day(day) => Some(day),
            CalendarCell::Padding => None,
        }
    }

    pub fn class(&self) -> Option<DayClass> {
        self.day().map(|d| d.class)
    }
}

/// One grid row. Always exactly seven cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarWeek {
    pub cells: [CalendarCell; DAYS_PER_WEEK],
}

/// Month view of realized PnL, laid out as a week grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub week_start: WeekStart,
    pub weeks: Vec<CalendarWeek>,

    /// Sum of PnL over every in-month day
    pub total_pnl: f64,

    /// Days with at least one closing trade
    pub trading_days: usize,
}

impl CalendarMonth {
    /// Iterate over the in-month days in date order.
    pub fn days(&self) -> impl Iterator<Item = &CalendarDay> {
        self.weeks
            .iter()
            .flat_map(|w| w.cells.iter())
            .filter_map(CalendarCell::day)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        self.days().find(|d| d.date == date)
    }
}
