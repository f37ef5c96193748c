use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::CoreError;
use crate::models::mapping::{CanonicalField, ColumnMapping};
use crate::models::settings::{Settings, SignConvention};
use crate::models::table::RawTable;
use crate::models::transaction::{RawTransaction, TradeAction};

/// Date-time layouts tried after any user-configured formats.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Date-only layouts. chrono's `%Y` accepts one to four digits, so the
/// US layouts (two-digit year first) must run before `%Y/%m/%d`.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%Y%m%d",
];

/// Row counts from one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    /// Data rows in the uploaded table
    pub total_rows: usize,

    /// Rows dropped because their activity type is not the trade tag
    pub non_trade_rows: usize,

    /// Rows dropped because a required value was blank or not numeric
    pub rejected_rows: usize,
}

/// Transactions extracted from a table, plus bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTransactions {
    pub transactions: Vec<RawTransaction>,
    pub report: NormalizationReport,
}

/// Resolved positions of every mapped field in a table.
struct FieldColumns {
    date: (usize, String),
    symbol: usize,
    action: usize,
    quantity: usize,
    price: usize,
    net_amount: usize,
    account: Option<usize>,
    activity_type: Option<usize>,
}

/// Canonicalizes column labels and turns table rows into typed transactions.
///
/// Pure business logic with no I/O. Column roles come in as an explicit
/// [`ColumnMapping`]; see [`crate::services::column_resolver`] for the
/// automatic guess.
pub struct SchemaService {
    trade_activity_tag: String,
    date_formats: Vec<String>,
    sign_convention: SignConvention,
}

impl SchemaService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            trade_activity_tag: settings.trade_activity_tag.trim().to_lowercase(),
            date_formats: settings.extra_date_formats.clone(),
            sign_convention: settings.sign_convention,
        }
    }

    /// Canonical form of a header label: trimmed, lower-cased, and every run
    /// of whitespace/hyphens collapsed into a single `_`.
    ///
    /// `"Transaction Date"` → `"transaction_date"`, `"Account #"` → `"account_#"`.
    pub fn normalize_label(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut pending_separator = false;
        for ch in raw.trim().chars() {
            if ch.is_whitespace() || ch == '-' {
                pending_separator = true;
                continue;
            }
            if pending_separator {
                out.push('_');
                pending_separator = false;
            }
            out.extend(ch.to_lowercase());
        }
        out
    }

    /// Return the table with every header label canonicalized.
    pub fn normalize_table(&self, mut table: RawTable) -> RawTable {
        for column in &mut table.columns {
            *column = Self::normalize_label(column);
        }
        table
    }

    /// Extract typed transactions from a table with canonical labels.
    ///
    /// - Rows whose activity type is not the trade tag are dropped first
    ///   (only when an activity-type column is mapped).
    /// - A blank date, symbol, or unparsable number rejects the row.
    /// - A non-blank date that cannot be parsed aborts with `DateParse`.
    /// - Buy/sell net amounts are checked or adjusted per the sign convention.
    pub fn extract_transactions(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
    ) -> Result<NormalizedTransactions, CoreError> {
        let columns = self.resolve_columns(table, mapping)?;
        let mut report = NormalizationReport {
            total_rows: table.row_count(),
            ..Default::default()
        };
        let mut transactions = Vec::with_capacity(table.row_count());

        for (idx, row) in table.rows.iter().enumerate() {
            // 1-based data row number, header excluded
            let row_number = idx + 1;

            if let Some(col) = columns.activity_type {
                if cell(row, col).trim().to_lowercase() != self.trade_activity_tag {
                    report.non_trade_rows += 1;
                    continue;
                }
            }

            match self.parse_row(row, row_number, &columns)? {
                Some(tx) => transactions.push(tx),
                None => report.rejected_rows += 1,
            }
        }

        info!(
            total = report.total_rows,
            kept = transactions.len(),
            non_trade = report.non_trade_rows,
            rejected = report.rejected_rows,
            "Extracted transactions"
        );

        Ok(NormalizedTransactions {
            transactions,
            report,
        })
    }

    /// Map every field in `mapping` onto exactly one table column.
    fn resolve_columns(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
    ) -> Result<FieldColumns, CoreError> {
        let missing = mapping.missing_required();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.name()).collect();
            return Err(CoreError::Schema(format!(
                "No column mapped for required fields: {}",
                names.join(", ")
            )));
        }

        let locate = |field: CanonicalField| -> Result<Option<usize>, CoreError> {
            let Some(label) = mapping.get(field) else {
                return Ok(None);
            };
            let positions = table.column_positions(label);
            match positions.as_slice() {
                [only] => Ok(Some(*only)),
                [] => Err(CoreError::Schema(format!(
                    "Column '{label}' mapped to {field} is not in the table"
                ))),
                _ => Err(CoreError::Schema(format!(
                    "Column '{label}' mapped to {field} appears {} times after normalization",
                    positions.len()
                ))),
            }
        };
        let required = |field: CanonicalField| -> Result<usize, CoreError> {
            locate(field)?.ok_or_else(|| {
                CoreError::Schema(format!("No column mapped for required field {field}"))
            })
        };

        let date = required(CanonicalField::TransactionDate)?;
        Ok(FieldColumns {
            date: (date, table.columns[date].clone()),
            symbol: required(CanonicalField::Symbol)?,
            action: required(CanonicalField::Action)?,
            quantity: required(CanonicalField::Quantity)?,
            price: required(CanonicalField::Price)?,
            net_amount: required(CanonicalField::NetAmount)?,
            account: locate(CanonicalField::Account)?,
            activity_type: locate(CanonicalField::ActivityType)?,
        })
    }

    /// Coerce one row. `Ok(None)` means the row is rejected.
    fn parse_row(
        &self,
        row: &[String],
        row_number: usize,
        columns: &FieldColumns,
    ) -> Result<Option<RawTransaction>, CoreError> {
        let (date_col, date_label) = &columns.date;
        let date_cell = cell(row, *date_col).trim();
        if date_cell.is_empty() {
            warn!(row = row_number, "Rejected row: blank transaction date");
            return Ok(None);
        }
        let transaction_date =
            self.parse_datetime(date_cell)
                .ok_or_else(|| CoreError::DateParse {
                    column: date_label.clone(),
                    row: row_number,
                    value: date_cell.to_string(),
                })?;

        let symbol = cell(row, columns.symbol).trim();
        if symbol.is_empty() {
            warn!(row = row_number, "Rejected row: blank symbol");
            return Ok(None);
        }

        let action = TradeAction::parse(cell(row, columns.action));

        let numbers = (
            parse_number(cell(row, columns.quantity)),
            parse_number(cell(row, columns.price)),
            parse_number(cell(row, columns.net_amount)),
        );
        let (Some(quantity), Some(price), Some(net_amount)) = numbers else {
            warn!(
                row = row_number,
                symbol,
                "Rejected row: quantity, price or net amount is not numeric"
            );
            return Ok(None);
        };

        let net_amount = self.apply_sign_convention(&action, net_amount, row_number)?;

        let account = columns
            .account
            .map(|col| cell(row, col).trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(Some(RawTransaction {
            transaction_date,
            symbol: symbol.to_string(),
            action,
            quantity,
            price,
            net_amount,
            account,
        }))
    }

    fn apply_sign_convention(
        &self,
        action: &TradeAction,
        net_amount: f64,
        row_number: usize,
    ) -> Result<f64, CoreError> {
        let violates = match action {
            TradeAction::Buy => net_amount > 0.0,
            TradeAction::Sell => net_amount < 0.0,
            TradeAction::Other(_) => false,
        };

        match self.sign_convention {
            SignConvention::Trust => Ok(net_amount),
            SignConvention::Strict if violates => Err(CoreError::SignConvention {
                row: row_number,
                action: action.to_string(),
                net_amount,
            }),
            SignConvention::Strict => Ok(net_amount),
            SignConvention::Normalize => {
                if violates {
                    debug!(row = row_number, net_amount, "Flipped net amount sign");
                }
                Ok(match action {
                    TradeAction::Buy => -net_amount.abs(),
                    TradeAction::Sell => net_amount.abs(),
                    TradeAction::Other(_) => net_amount,
                })
            }
        }
    }

    /// Parse a date or date-time cell. Date-only values land on midnight.
    pub fn parse_datetime(&self, value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();

        for fmt in &self.date_formats {
            if let Some(dt) = parse_with_format(value, fmt) {
                return Some(dt);
            }
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.naive_local());
        }

        DATETIME_FORMATS
            .iter()
            .chain(DATE_FORMATS)
            .find_map(|fmt| parse_with_format(value, fmt))
    }
}

impl Default for SchemaService {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

/// Missing cells of a short row read as blank.
fn cell(row: &[String], col: usize) -> &str {
    row.get(col).map(String::as_str).unwrap_or("")
}

fn parse_with_format(value: &str, fmt: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, fmt).ok().or_else(|| {
        NaiveDate::parse_from_str(value, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Parse a currency/quantity cell such as `1,234.50`, `$-12`, or `(45.00)`.
///
/// Returns `None` for blank or non-numeric cells.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negated, inner) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negated { -value } else { value })
}
