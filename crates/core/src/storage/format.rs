use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::{NaiveDateTime, Timelike};

use crate::errors::CoreError;
use crate::models::table::RawTable;
use crate::models::trade::MatchedTrade;

/// Header of the matched-trades export, in column order.
pub const EXPORT_HEADER: [&str; 8] = [
    "Account",
    "Symbol",
    "Buy Date",
    "Sell Date",
    "Entry Price",
    "Exit Price",
    "Quantity",
    "PnL",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Delimiters considered when sniffing a `.txt` export, in tie-break order.
const SNIFF_DELIMITERS: [u8; 4] = [b'\t', b';', b'|', b','];

/// Input file layouts the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimited text with the given field separator
    Delimited(u8),
    /// Delimited text whose separator is sniffed from the header line
    SniffedText,
    /// xlsx / xlsm / xls / ods workbook (first worksheet)
    Spreadsheet,
}

impl FileFormat {
    /// Pick a format from the file extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, CoreError> {
        let extension = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| CoreError::FileFormat(format!("'{name}' has no file extension")))?;

        match extension.as_str() {
            "csv" => Ok(FileFormat::Delimited(b',')),
            "tsv" | "tab" => Ok(FileFormat::Delimited(b'\t')),
            "txt" => Ok(FileFormat::SniffedText),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(FileFormat::Spreadsheet),
            other => Err(CoreError::FileFormat(format!(
                "Unsupported file type '.{other}' (expected .csv, .tsv, .txt, .xlsx, .xls or .ods)"
            ))),
        }
    }
}

/// Decode file bytes into a table of text cells.
pub fn read_table(format: FileFormat, data: &[u8]) -> Result<RawTable, CoreError> {
    match format {
        FileFormat::Delimited(delimiter) => read_delimited(data, delimiter),
        FileFormat::SniffedText => {
            let data = strip_bom(data);
            read_delimited(data, sniff_delimiter(data))
        }
        FileFormat::Spreadsheet => read_spreadsheet(data),
    }
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

/// Most frequent candidate delimiter on the first line; comma if none occur.
pub fn sniff_delimiter(data: &[u8]) -> u8 {
    let first_line = data.split(|b| *b == b'\n').next().unwrap_or_default();
    SNIFF_DELIMITERS
        .iter()
        .map(|d| (*d, first_line.iter().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        // max_by_key keeps the last maximum; reverse so earlier candidates win ties
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Parse delimited text. The first record is the header; ragged rows are
/// padded and fully blank rows skipped.
pub fn read_delimited(data: &[u8], delimiter: u8) -> Result<RawTable, CoreError> {
    let data = strip_bom(data);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(CoreError::FileFormat("File has no header row".into()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable::new(columns, rows))
}

/// Read the first worksheet of a workbook. Date cells become
/// `YYYY-MM-DD HH:MM:SS` text.
pub fn read_spreadsheet(data: &[u8]) -> Result<RawTable, CoreError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CoreError::FileFormat("Workbook has no worksheets".into()))??;

    let mut rows_iter = range.rows();
    let header = rows_iter
        .next()
        .ok_or_else(|| CoreError::FileFormat("Worksheet is empty".into()))?;
    let columns: Vec<String> = header.iter().map(cell_text).collect();
    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(CoreError::FileFormat("Worksheet has no header row".into()));
    }

    let rows = rows_iter
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect();

    Ok(RawTable::new(columns, rows))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
    }
}

/// Integral floats print without a fractional part (`100`, not `100.0`).
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Date column text: date only at midnight, full timestamp otherwise.
pub fn format_export_date(dt: &NaiveDateTime) -> String {
    if dt.time().num_seconds_from_midnight() == 0 && dt.time().nanosecond() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Serialize matched trades as CSV: header row, one row per trade, no index.
pub fn write_trades_csv(trades: &[MatchedTrade]) -> Result<Vec<u8>, CoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for trade in trades {
        writer.write_record([
            trade.account.clone().unwrap_or_default(),
            trade.symbol.clone(),
            format_export_date(&trade.entry_date),
            format_export_date(&trade.exit_date),
            trade.entry_price.to_string(),
            trade.exit_price.to_string(),
            trade.quantity.to_string(),
            trade.pnl.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| CoreError::Serialization(format!("Failed to flush CSV export: {e}")))
}
