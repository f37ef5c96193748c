//! Realized PnL from a brokerage trade export.
//!
//! # Usage
//!
//! ```bash
//! # Analyze an export with automatic column detection
//! trade-pnl activity.csv
//!
//! # Pick columns by hand, one account only, write the matched trades
//! trade-pnl activity.xlsx --map date="run date" --map net_amount=amount \
//!     --account "Z123" --export trades.csv
//!
//! # Show the March 2024 calendar with JSON logs
//! trade-pnl activity.csv --calendar 2024-03 --log-format json
//!
//! # Print the report as JSON instead of text
//! trade-pnl activity.csv --json
//! ```

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::Parser;
use tracing::{error, info};

use trade_pnl_core::{
    logging::{init_logging, LogConfig, LogFormat},
    models::{
        analytics::{BucketDimension, PnlReport},
        calendar::{CalendarCell, CalendarMonth},
        mapping::{CanonicalField, ColumnMapping},
        settings::Settings,
        table::RawTable,
        transaction::AccountFilter,
    },
    services::schema_service::SchemaService,
    AnalysisOutcome, TradePnl,
};

#[derive(Parser)]
#[command(name = "trade-pnl")]
#[command(about = "Match buys with sells in a brokerage export and report realized PnL", long_about = None)]
#[command(version)]
struct Cli {
    /// Export to analyze (.csv, .tsv, .txt, .xlsx, .xls, .ods)
    file: String,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Column override as field=column, e.g. date="Run Date" (repeatable)
    #[arg(short, long = "map", value_name = "FIELD=COLUMN")]
    mappings: Vec<String>,

    /// Only analyze this account
    #[arg(short, long)]
    account: Option<String>,

    /// Write matched trades to this CSV file
    #[arg(short, long)]
    export: Option<String>,

    /// Print the calendar for a month (YYYY-MM)
    #[arg(long, value_name = "YYYY-MM")]
    calendar: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log output format (pretty, json, compact)
    #[arg(long, default_value = "compact")]
    log_format: String,
}

fn main() {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.parse().unwrap_or_default();
    if let Err(e) = init_logging(LogConfig::from_env().with_format(log_format)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = run(cli) {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::default(),
    };
    let mut session = TradePnl::new(settings)?;

    let table = session
        .load_table_from_file(&cli.file)
        .with_context(|| format!("Failed to load {}", cli.file))?;
    println!("Preview ({} rows total)", table.row_count());
    print_table(&session.preview(&table));

    let mapping = build_mapping(&session, &table, &cli.mappings)?;
    let filter = match &cli.account {
        Some(account) => {
            let accounts = session.list_accounts(&table, &mapping)?;
            if !accounts.contains(account) {
                bail!("Account '{account}' not found (available: {})", accounts.join(", "));
            }
            AccountFilter::Only(account.clone())
        }
        None => AccountFilter::All,
    };

    match session.analyze(&table, &mapping, &filter)? {
        AnalysisOutcome::NoMatches {
            transactions,
            normalization,
            store_update,
        } => {
            println!();
            println!(
                "No trades matched ({} transactions, {} non-trade rows, {} rejected rows).",
                transactions.len(),
                normalization.non_trade_rows,
                normalization.rejected_rows
            );
            if let Some(update) = store_update {
                println!("Store: {} new, {} held", update.added, update.total);
            }
            return Ok(());
        }
        AnalysisOutcome::Matched(analysis) => {
            println!();
            println!("Matched trades");
            for trade in &analysis.matches.trades {
                println!(
                    "  {:<12} {:<8} {} -> {}  qty {:>8}  {:>10.2} -> {:>10.2}  pnl {:>10.2}",
                    trade.account.as_deref().unwrap_or("-"),
                    trade.symbol,
                    trade.entry_date.format("%Y-%m-%d"),
                    trade.exit_date.format("%Y-%m-%d"),
                    trade.quantity,
                    trade.entry_price,
                    trade.exit_price,
                    trade.pnl
                );
            }
            println!(
                "  open legs: {} buys, {} sells",
                analysis.matches.unmatched_buys.len(),
                analysis.matches.unmatched_sells.len()
            );
            if cli.json {
                println!("{}", session.report_to_json()?);
            } else {
                print_report(&analysis.report);
            }
        }
    }

    if let Some(path) = &cli.export {
        session
            .export_to_file(path)
            .with_context(|| format!("Failed to write {path}"))?;
        info!(path = %path, "Wrote matched trades");
        println!();
        println!("Exported {} trades to {path}", session.matched_trades().len());
    }

    if let Some(month) = &cli.calendar {
        let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
            .with_context(|| format!("Calendar month must be YYYY-MM, got '{month}'"))?;
        print_calendar(&session.calendar(first.year(), first.month())?);
    } else if let Some((year, month)) = session.available_months().last() {
        println!();
        println!("Latest month with exits: {year}-{month:02} (use --calendar to show it)");
    }

    Ok(())
}

/// Automatic resolution, then `--map` overrides on top.
fn build_mapping(session: &TradePnl, table: &RawTable, overrides: &[String]) -> Result<ColumnMapping> {
    let mut resolution = session.resolve_columns(table);

    for entry in overrides {
        let Some((field, column)) = entry.split_once('=') else {
            bail!("--map expects FIELD=COLUMN, got '{entry}'");
        };
        let field: CanonicalField = field.parse()?;
        let column = SchemaService::normalize_label(column.trim_matches('"'));
        if table.column_positions(&column).is_empty() {
            bail!("Column '{column}' for {field} is not in the file");
        }
        resolution.mapping.set(field, column);
        resolution.ambiguous.remove(&field);
    }

    for (field, candidates) in &resolution.ambiguous {
        if !field.is_required() {
            println!("Ignoring optional {field}: several candidates ({})", candidates.join(", "));
        }
    }

    Ok(resolution.into_mapping()?)
}

fn print_table(table: &RawTable) {
    println!("  {}", table.columns.join(" | "));
    for row in &table.rows {
        println!("  {}", row.join(" | "));
    }
}

fn print_report(report: &PnlReport) {
    let summary = &report.summary;
    println!();
    println!("Summary");
    println!("  trades      {}", summary.trade_count);
    println!(
        "  wins/losses {}/{} ({} breakeven), win rate {:.1}%",
        summary.wins,
        summary.losses,
        summary.breakeven,
        summary.win_rate * 100.0
    );
    println!("  total       {:.2}", summary.total_pnl);
    println!("  mean        {:.2}", summary.mean_pnl);
    if let (Some(max), Some(min)) = (summary.max_pnl, summary.min_pnl) {
        println!("  best/worst  {max:.2} / {min:.2}");
    }

    for dimension in [
        BucketDimension::Day,
        BucketDimension::Week,
        BucketDimension::Month,
        BucketDimension::Symbol,
        BucketDimension::Account,
    ] {
        println!();
        println!("{dimension}");
        for (key, pnl) in report.series(dimension) {
            println!("  {key:<12} {pnl:>12.2}");
        }
    }
}

fn print_calendar(month: &CalendarMonth) {
    println!();
    println!(
        "{}-{:02}: total {:.2} over {} trading days",
        month.year, month.month, month.total_pnl, month.trading_days
    );
    for week in &month.weeks {
        let cells: Vec<String> = week
            .cells
            .iter()
            .map(|cell| match cell {
                CalendarCell::Padding => format!("{:>12}", ""),
                CalendarCell::Day(day) if day.trade_count == 0 => {
                    format!("{:>12}", day.date.day())
                }
                CalendarCell::Day(day) => format!("{:>3} {:>8.2}", day.date.day(), day.pnl),
            })
            .collect();
        println!("  {}", cells.join(" "));
    }
}
