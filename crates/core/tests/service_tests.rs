// ═══════════════════════════════════════════════════════════════════
// Service Tests — SchemaService, ColumnResolver, DedupService,
// AccountService, MatchingService, AnalyticsService, CalendarService
// ═══════════════════════════════════════════════════════════════════

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use trade_pnl_core::errors::CoreError;
use trade_pnl_core::models::analytics::BucketDimension;
use trade_pnl_core::models::calendar::{CalendarCell, DayClass, DAYS_PER_WEEK};
use trade_pnl_core::models::mapping::{CanonicalField, ColumnMapping};
use trade_pnl_core::models::settings::{Settings, SignConvention, WeekLabelStyle, WeekStart};
use trade_pnl_core::models::table::RawTable;
use trade_pnl_core::models::trade::MatchedTrade;
use trade_pnl_core::models::transaction::{AccountFilter, RawTransaction, TradeAction};
use trade_pnl_core::services::account_service::AccountService;
use trade_pnl_core::services::analytics_service::AnalyticsService;
use trade_pnl_core::services::calendar_service::CalendarService;
use trade_pnl_core::services::column_resolver::ColumnResolver;
use trade_pnl_core::services::dedup_service::DedupService;
use trade_pnl_core::services::matching_service::MatchingService;
use trade_pnl_core::services::schema_service::SchemaService;

fn d(y: i32, m: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn leg(
    date: NaiveDateTime,
    symbol: &str,
    action: TradeAction,
    quantity: f64,
    price: f64,
    net_amount: f64,
    account: Option<&str>,
) -> RawTransaction {
    RawTransaction {
        transaction_date: date,
        symbol: symbol.into(),
        action,
        quantity,
        price,
        net_amount,
        account: account.map(str::to_string),
    }
}

fn buy(date: NaiveDateTime, symbol: &str, quantity: f64, net_amount: f64) -> RawTransaction {
    leg(date, symbol, TradeAction::Buy, quantity, net_amount.abs() / quantity.abs(), net_amount, Some("Z1"))
}

fn sell(date: NaiveDateTime, symbol: &str, quantity: f64, net_amount: f64) -> RawTransaction {
    leg(date, symbol, TradeAction::Sell, quantity, net_amount.abs() / quantity.abs(), net_amount, Some("Z1"))
}

fn trade(exit: NaiveDateTime, symbol: &str, account: Option<&str>, pnl: f64) -> MatchedTrade {
    MatchedTrade {
        account: account.map(str::to_string),
        symbol: symbol.into(),
        entry_date: exit,
        exit_date: exit,
        entry_price: 1.0,
        exit_price: 1.0,
        quantity: 1.0,
        pnl,
    }
}

fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Table with canonical labels and the matching mapping.
fn canonical_table(rows: &[&[&str]]) -> (RawTable, ColumnMapping) {
    let table = RawTable::new(
        strings(&["date", "symbol", "action", "quantity", "price", "amount", "account", "activity_type"]),
        rows.iter().map(|r| strings(r)).collect(),
    );
    let mapping = ColumnMapping::new()
        .with(CanonicalField::TransactionDate, "date")
        .with(CanonicalField::Symbol, "symbol")
        .with(CanonicalField::Action, "action")
        .with(CanonicalField::Quantity, "quantity")
        .with(CanonicalField::Price, "price")
        .with(CanonicalField::NetAmount, "amount")
        .with(CanonicalField::Account, "account")
        .with(CanonicalField::ActivityType, "activity_type");
    (table, mapping)
}

// ═══════════════════════════════════════════════════════════════════
// SchemaService
// ═══════════════════════════════════════════════════════════════════

mod schema_service {
    use super::*;

    #[test]
    fn normalize_label_collapses_separators() {
        assert_eq!(SchemaService::normalize_label("  Transaction Date "), "transaction_date");
        assert_eq!(SchemaService::normalize_label("Net-Amount"), "net_amount");
        assert_eq!(SchemaService::normalize_label("Account  #"), "account_#");
        assert_eq!(SchemaService::normalize_label("Buy - Sell"), "buy_sell");
        assert_eq!(SchemaService::normalize_label("SYMBOL"), "symbol");
    }

    #[test]
    fn normalize_table_rewrites_headers_only() {
        let table = RawTable::new(strings(&["Run Date", "Net Amount"]), vec![strings(&["A B", "C-D"])]);
        let table = SchemaService::default().normalize_table(table);
        assert_eq!(table.columns, strings(&["run_date", "net_amount"]));
        assert_eq!(table.rows[0], strings(&["A B", "C-D"]));
    }

    #[test]
    fn extracts_typed_rows() {
        let (table, mapping) = canonical_table(&[
            &["2024-03-01", " AAPL ", "Buy", "100", "10.00", "-1,000.00", "Z1", "Trades"],
            &["03/05/2024 14:30", "AAPL", "SELL", "-100", "$12", "1200", " ", "TRADES"],
        ]);
        let out = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap();

        assert_eq!(out.transactions.len(), 2);
        let first = &out.transactions[0];
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(first.action, TradeAction::Buy);
        assert_eq!(first.net_amount, -1000.0);
        assert_eq!(first.account.as_deref(), Some("Z1"));

        let second = &out.transactions[1];
        assert_eq!(second.transaction_date, d(2024, 3, 5).date().and_hms_opt(14, 30, 0).unwrap());
        assert_eq!(second.quantity, -100.0);
        assert_eq!(second.price, 12.0);
        assert_eq!(second.account, None);
        assert_eq!(out.report.total_rows, 2);
        assert_eq!(out.report.rejected_rows, 0);
    }

    #[test]
    fn non_trade_activity_rows_are_dropped() {
        let (table, mapping) = canonical_table(&[
            &["2024-03-01", "AAPL", "Buy", "100", "10", "-1000", "Z1", "Trades"],
            &["2024-03-02", "AAPL", "Dividend", "0", "0", "12", "Z1", "Dividends"],
        ]);
        let out = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert_eq!(out.transactions.len(), 1);
        assert_eq!(out.report.non_trade_rows, 1);
    }

    #[test]
    fn without_activity_column_every_row_is_a_candidate() {
        let (table, mut mapping) = canonical_table(&[
            &["2024-03-01", "AAPL", "Buy", "100", "10", "-1000", "Z1", "whatever"],
            &["2024-03-02", "AAPL", "Dividend", "0", "0", "12", "Z1", "Dividends"],
        ]);
        mapping.remove(CanonicalField::ActivityType);
        let out = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert_eq!(out.transactions.len(), 2);
        assert_eq!(out.transactions[1].action, TradeAction::Other("dividend".into()));
    }

    #[test]
    fn custom_activity_tag() {
        let settings = Settings {
            trade_activity_tag: "Execution".into(),
            ..Default::default()
        };
        let (table, mapping) = canonical_table(&[
            &["2024-03-01", "AAPL", "Buy", "100", "10", "-1000", "Z1", "EXECUTION"],
            &["2024-03-01", "MSFT", "Buy", "1", "10", "-10", "Z1", "Trades"],
        ]);
        let out = SchemaService::new(&settings)
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert_eq!(out.transactions.len(), 1);
        assert_eq!(out.transactions[0].symbol, "AAPL");
    }

    #[test]
    fn blank_values_reject_the_row() {
        let (table, mapping) = canonical_table(&[
            &["", "AAPL", "Buy", "100", "10", "-1000", "Z1", "Trades"],
            &["2024-03-01", " ", "Buy", "100", "10", "-1000", "Z1", "Trades"],
            &["2024-03-01", "AAPL", "Buy", "n/a", "10", "-1000", "Z1", "Trades"],
            &["2024-03-01", "AAPL", "Buy", "100", "10", "-1000", "Z1", "Trades"],
        ]);
        let out = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert_eq!(out.transactions.len(), 1);
        assert_eq!(out.report.rejected_rows, 3);
    }

    #[test]
    fn unparsable_date_halts_with_row_number() {
        let (table, mapping) = canonical_table(&[
            &["2024-03-01", "AAPL", "Buy", "100", "10", "-1000", "Z1", "Trades"],
            &["next tuesday", "AAPL", "Sell", "100", "12", "1200", "Z1", "Trades"],
        ]);
        let err = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap_err();
        match err {
            CoreError::DateParse { column, row, value } => {
                assert_eq!(column, "date");
                assert_eq!(row, 2);
                assert_eq!(value, "next tuesday");
            }
            other => panic!("expected DateParse, got {other:?}"),
        }
    }

    #[test]
    fn bad_date_on_non_trade_row_is_ignored() {
        let (table, mapping) = canonical_table(&[
            &["pending", "AAPL", "Deposit", "0", "0", "500", "Z1", "Transfers"],
            &["2024-03-01", "AAPL", "Buy", "100", "10", "-1000", "Z1", "Trades"],
        ]);
        let out = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert_eq!(out.transactions.len(), 1);
    }

    #[test]
    fn strict_sign_convention_rejects_positive_buy() {
        let (table, mapping) = canonical_table(&[
            &["2024-03-01", "AAPL", "Buy", "100", "10", "1000", "Z1", "Trades"],
        ]);
        let err = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::SignConvention { row: 1, ref action, net_amount } if action == "buy" && net_amount == 1000.0
        ));
    }

    #[test]
    fn normalize_sign_convention_flips() {
        let settings = Settings {
            sign_convention: SignConvention::Normalize,
            ..Default::default()
        };
        let (table, mapping) = canonical_table(&[
            &["2024-03-01", "AAPL", "Buy", "100", "10", "1000", "Z1", "Trades"],
            &["2024-03-02", "AAPL", "Sell", "100", "12", "-1200", "Z1", "Trades"],
        ]);
        let out = SchemaService::new(&settings)
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert_eq!(out.transactions[0].net_amount, -1000.0);
        assert_eq!(out.transactions[1].net_amount, 1200.0);
    }

    #[test]
    fn trust_sign_convention_keeps_values() {
        let settings = Settings {
            sign_convention: SignConvention::Trust,
            ..Default::default()
        };
        let (table, mapping) = canonical_table(&[
            &["2024-03-01", "AAPL", "Buy", "100", "10", "1000", "Z1", "Trades"],
        ]);
        let out = SchemaService::new(&settings)
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert_eq!(out.transactions[0].net_amount, 1000.0);
    }

    #[test]
    fn missing_required_mapping_is_schema_error() {
        let (table, mut mapping) = canonical_table(&[]);
        mapping.remove(CanonicalField::Price);
        let err = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap_err();
        assert!(matches!(err, CoreError::Schema(ref msg) if msg.contains("price")));
    }

    #[test]
    fn mapped_column_absent_from_table_is_schema_error() {
        let (table, mapping) = canonical_table(&[]);
        let mapping = mapping.with(CanonicalField::Symbol, "ticker");
        assert!(matches!(
            SchemaService::default().extract_transactions(&table, &mapping),
            Err(CoreError::Schema(_))
        ));
    }

    #[test]
    fn duplicated_column_is_schema_error() {
        let table = RawTable::new(
            strings(&["date", "symbol", "action", "quantity", "price", "amount", "amount"]),
            vec![],
        );
        let mapping = ColumnMapping::new()
            .with(CanonicalField::TransactionDate, "date")
            .with(CanonicalField::Symbol, "symbol")
            .with(CanonicalField::Action, "action")
            .with(CanonicalField::Quantity, "quantity")
            .with(CanonicalField::Price, "price")
            .with(CanonicalField::NetAmount, "amount");
        let err = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap_err();
        assert!(matches!(err, CoreError::Schema(ref msg) if msg.contains("2 times")));
    }

    #[test]
    fn short_rows_in_a_hand_built_table_are_rejected() {
        let (padded, mut mapping) = canonical_table(&[]);
        mapping.remove(CanonicalField::ActivityType);
        let table = RawTable {
            columns: padded.columns,
            rows: vec![
                strings(&["2024-03-01", "AAPL", "Buy"]),
                strings(&["2024-03-02", "AAPL", "Buy", "1", "10", "-10", "Z1", "Trades"]),
            ],
        };

        let out = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert_eq!(out.transactions.len(), 1);
        assert_eq!(out.transactions[0].transaction_date, d(2024, 3, 2));
        assert_eq!(out.report.rejected_rows, 1);
    }

    #[test]
    fn short_row_without_activity_cell_is_non_trade() {
        let (padded, mapping) = canonical_table(&[]);
        let table = RawTable {
            columns: padded.columns,
            rows: vec![strings(&["2024-03-01"])],
        };

        let out = SchemaService::default()
            .extract_transactions(&table, &mapping)
            .unwrap();
        assert!(out.transactions.is_empty());
        assert_eq!(out.report.non_trade_rows, 1);
    }

    #[test]
    fn parse_datetime_formats() {
        let svc = SchemaService::default();
        assert_eq!(svc.parse_datetime("2024-03-01"), Some(d(2024, 3, 1)));
        assert_eq!(svc.parse_datetime("3/1/2024"), Some(d(2024, 3, 1)));
        assert_eq!(svc.parse_datetime("2024/03/01"), Some(d(2024, 3, 1)));
        assert_eq!(svc.parse_datetime("01-Mar-2024"), Some(d(2024, 3, 1)));
        assert_eq!(svc.parse_datetime("20240315"), Some(d(2024, 3, 15)));
        assert_eq!(
            svc.parse_datetime("2024-03-01T09:30:00"),
            d(2024, 3, 1).date().and_hms_opt(9, 30, 0)
        );
        assert_eq!(
            svc.parse_datetime("2024-03-01T09:30:00+02:00"),
            d(2024, 3, 1).date().and_hms_opt(9, 30, 0)
        );
        assert_eq!(svc.parse_datetime("soon"), None);
    }
}

// ═══════════════════════════════════════════════════════════════════
// ColumnResolver
// ═══════════════════════════════════════════════════════════════════

mod column_resolver {
    use super::*;

    #[test]
    fn resolves_exact_and_keyword_matches() {
        let table = RawTable::new(
            strings(&[
                "run_date", "symbol", "action", "quantity", "price_($)", "amount_($)", "account", "activity_type",
            ]),
            vec![],
        );
        let resolution = ColumnResolver::new().resolve(&table);

        assert!(resolution.is_complete());
        let m = &resolution.mapping;
        assert_eq!(m.get(CanonicalField::TransactionDate), Some("run_date"));
        assert_eq!(m.get(CanonicalField::Price), Some("price_($)"));
        assert_eq!(m.get(CanonicalField::NetAmount), Some("amount_($)"));
        assert_eq!(m.get(CanonicalField::Account), Some("account"));
        assert_eq!(m.get(CanonicalField::ActivityType), Some("activity_type"));
        assert!(resolution.ambiguous.is_empty());
        assert!(resolution.missing.is_empty());
    }

    #[test]
    fn several_keyword_hits_are_ambiguous() {
        let table = RawTable::new(
            strings(&["order_date", "settle_date", "symbol", "action", "quantity", "price", "amount"]),
            vec![],
        );
        let resolution = ColumnResolver::new().resolve(&table);

        assert!(!resolution.is_complete());
        assert_eq!(resolution.unresolved_required(), vec![CanonicalField::TransactionDate]);
        assert_eq!(
            resolution.ambiguous.get(&CanonicalField::TransactionDate),
            Some(&strings(&["order_date", "settle_date"]))
        );
        assert!(resolution.missing.contains(&CanonicalField::Account));
        assert!(resolution.missing.contains(&CanonicalField::ActivityType));
    }

    #[test]
    fn duplicated_exact_label_is_ambiguous() {
        let table = RawTable::new(
            strings(&["date", "date", "symbol", "action", "quantity", "price", "amount"]),
            vec![],
        );
        let resolution = ColumnResolver::new().resolve(&table);
        assert!(resolution.ambiguous.contains_key(&CanonicalField::TransactionDate));
        assert!(resolution.into_mapping().is_err());
    }

    #[test]
    fn resolves_common_broker_synonyms() {
        let table = RawTable::new(
            strings(&["trade_date", "ticker", "side", "shares", "trade_price", "net"]),
            vec![],
        );
        let m = ColumnResolver::new().resolve(&table).into_mapping().unwrap();
        assert_eq!(m.get(CanonicalField::TransactionDate), Some("trade_date"));
        assert_eq!(m.get(CanonicalField::Symbol), Some("ticker"));
        assert_eq!(m.get(CanonicalField::Action), Some("side"));
        assert_eq!(m.get(CanonicalField::Quantity), Some("shares"));
        assert_eq!(m.get(CanonicalField::Price), Some("trade_price"));
        assert_eq!(m.get(CanonicalField::NetAmount), Some("net"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// DedupService
// ═══════════════════════════════════════════════════════════════════

mod dedup_service {
    use super::*;

    #[test]
    fn identical_buys_collapse_to_one() {
        let rows = vec![
            buy(d(2024, 1, 2), "AAPL", 100.0, -1000.0),
            buy(d(2024, 1, 2), "AAPL", 100.0, -1000.0),
        ];
        assert_eq!(DedupService::new().dedupe(rows).len(), 1);
    }

    #[test]
    fn first_occurrence_wins() {
        let first = leg(d(2024, 1, 2), "AAPL", TradeAction::Buy, 1.0, 10.0, -10.0, Some("A"));
        let second = leg(d(2024, 1, 2), "AAPL", TradeAction::Buy, 1.0, 10.0, -10.0, Some("B"));
        let kept = DedupService::new().dedupe(vec![first.clone(), second]);
        assert_eq!(kept, vec![first]);
    }

    #[test]
    fn order_is_preserved() {
        let rows = vec![
            sell(d(2024, 1, 3), "MSFT", 5.0, 50.0),
            buy(d(2024, 1, 1), "AAPL", 1.0, -10.0),
            sell(d(2024, 1, 3), "MSFT", 5.0, 50.0),
            buy(d(2024, 1, 2), "TSLA", 2.0, -20.0),
        ];
        let kept = DedupService::new().dedupe(rows);
        let symbols: Vec<&str> = kept.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["MSFT", "AAPL", "TSLA"]);
    }

    #[test]
    fn empty_input() {
        assert!(DedupService::new().dedupe(Vec::new()).is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// AccountService
// ═══════════════════════════════════════════════════════════════════

mod account_service {
    use super::*;

    #[test]
    fn accounts_sorted_and_distinct() {
        let mut rows = vec![
            leg(d(2024, 1, 1), "A", TradeAction::Buy, 1.0, 1.0, -1.0, Some("Zeta")),
            leg(d(2024, 1, 1), "B", TradeAction::Buy, 1.0, 1.0, -1.0, Some("Alpha")),
            leg(d(2024, 1, 1), "C", TradeAction::Buy, 1.0, 1.0, -1.0, Some("Zeta")),
        ];
        rows.push(leg(d(2024, 1, 1), "D", TradeAction::Buy, 1.0, 1.0, -1.0, None));
        assert_eq!(AccountService::new().accounts(&rows), strings(&["Alpha", "Zeta"]));
    }

    #[test]
    fn filter_by_account() {
        let rows = vec![
            leg(d(2024, 1, 1), "A", TradeAction::Buy, 1.0, 1.0, -1.0, Some("X")),
            leg(d(2024, 1, 1), "B", TradeAction::Buy, 1.0, 1.0, -1.0, Some("Y")),
        ];
        let svc = AccountService::new();
        assert_eq!(svc.filter(rows.clone(), &AccountFilter::All).len(), 2);
        let only = svc.filter(rows, &AccountFilter::Only("Y".into()));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].symbol, "B");
    }

    #[test]
    fn unassigned_rows_never_match_a_named_account() {
        let rows = vec![leg(d(2024, 1, 1), "A", TradeAction::Buy, 1.0, 1.0, -1.0, None)];
        assert!(AccountService::new()
            .filter(rows, &AccountFilter::Only("X".into()))
            .is_empty());
    }

    #[test]
    fn filtering_first_keeps_a_row_repeated_in_another_account() {
        let in_a = leg(d(2024, 1, 2), "AAPL", TradeAction::Buy, 10.0, 100.0, -1000.0, Some("A"));
        let in_b = leg(d(2024, 1, 2), "AAPL", TradeAction::Buy, 10.0, 100.0, -1000.0, Some("B"));

        let selected = AccountService::new().filter(vec![in_a, in_b.clone()], &AccountFilter::Only("B".into()));
        let kept = DedupService::new().dedupe(selected);
        assert_eq!(kept, vec![in_b]);
    }
}

// ═══════════════════════════════════════════════════════════════════
// MatchingService
// ═══════════════════════════════════════════════════════════════════

mod matching_service {
    use super::*;

    fn matcher() -> MatchingService {
        MatchingService::new()
    }

    #[test]
    fn single_round_trip() {
        let rows = vec![
            buy(d(2024, 1, 2), "AAPL", 100.0, -1000.0),
            sell(d(2024, 1, 9), "AAPL", 100.0, 1200.0),
        ];
        let result = matcher().match_trades(&rows);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].pnl, 200.0);
        assert_eq!(result.trades[0].entry_price, 10.0);
        assert_eq!(result.trades[0].exit_price, 12.0);
        assert!(result.unmatched_buys.is_empty());
        assert!(result.unmatched_sells.is_empty());
    }

    #[test]
    fn magnitude_mismatch_matches_nothing() {
        let rows = vec![
            buy(d(2024, 1, 2), "AAPL", 50.0, -500.0),
            sell(d(2024, 1, 9), "AAPL", 100.0, 1200.0),
        ];
        let result = matcher().match_trades(&rows);
        assert!(result.is_empty());
        assert_eq!(result.unmatched_buys.len(), 1);
        assert_eq!(result.unmatched_sells.len(), 1);
    }

    #[test]
    fn earliest_sorted_sell_is_taken() {
        let t1 = d(2024, 1, 5);
        let t2 = d(2024, 1, 9);
        // Later sell listed first; the date sort puts T1 ahead
        let rows = vec![
            sell(t2, "AAPL", 100.0, 1300.0),
            buy(d(2024, 1, 2), "AAPL", 100.0, -1000.0),
            sell(t1, "AAPL", 100.0, 1100.0),
        ];
        let result = matcher().match_trades(&rows);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_date, t1);
        assert_eq!(result.trades[0].pnl, 100.0);
        assert_eq!(result.unmatched_sells.len(), 1);
        assert_eq!(result.unmatched_sells[0].transaction_date, t2);
    }

    #[test]
    fn same_date_tie_keeps_input_order() {
        let day = d(2024, 1, 5);
        let rows = vec![
            buy(d(2024, 1, 2), "AAPL", 10.0, -100.0),
            leg(day, "AAPL", TradeAction::Sell, 10.0, 11.0, 110.0, Some("Z1")),
            leg(day, "AAPL", TradeAction::Sell, 10.0, 9.0, 90.0, Some("Z1")),
        ];
        let result = matcher().match_trades(&rows);
        assert_eq!(result.trades[0].exit_price, 11.0);
    }

    #[test]
    fn sell_before_buy_still_matches() {
        let rows = vec![
            sell(d(2024, 1, 1), "AAPL", 10.0, 150.0),
            buy(d(2024, 2, 1), "AAPL", 10.0, -100.0),
        ];
        let result = matcher().match_trades(&rows);
        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert!(t.exit_date < t.entry_date);
        assert_eq!(t.pnl, 50.0);
    }

    #[test]
    fn buys_take_sells_in_order() {
        let rows = vec![
            buy(d(2024, 1, 1), "AAPL", 100.0, -1000.0),
            sell(d(2024, 1, 2), "AAPL", 100.0, 1100.0),
            buy(d(2024, 1, 3), "AAPL", 100.0, -1050.0),
            sell(d(2024, 1, 4), "AAPL", 100.0, 1000.0),
        ];
        let result = matcher().match_trades(&rows);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].entry_date, d(2024, 1, 1));
        assert_eq!(result.trades[0].exit_date, d(2024, 1, 2));
        assert_eq!(result.trades[1].entry_date, d(2024, 1, 3));
        assert_eq!(result.trades[1].exit_date, d(2024, 1, 4));
        assert_eq!(result.trades[1].pnl, -50.0);
    }

    #[test]
    fn signed_quantities_match_on_magnitude() {
        let rows = vec![
            buy(d(2024, 1, 1), "AAPL", 25.0, -250.0),
            sell(d(2024, 1, 2), "AAPL", -25.0, 300.0),
        ];
        let result = matcher().match_trades(&rows);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].quantity, 25.0);
    }

    #[test]
    fn never_matches_across_accounts() {
        let rows = vec![
            leg(d(2024, 1, 1), "AAPL", TradeAction::Buy, 10.0, 10.0, -100.0, Some("A")),
            leg(d(2024, 1, 2), "AAPL", TradeAction::Sell, 10.0, 12.0, 120.0, Some("B")),
        ];
        let result = matcher().match_trades(&rows);
        assert!(result.is_empty());
    }

    #[test]
    fn never_matches_across_symbols() {
        let rows = vec![
            buy(d(2024, 1, 1), "AAPL", 10.0, -100.0),
            sell(d(2024, 1, 2), "MSFT", 10.0, 120.0),
        ];
        assert!(matcher().match_trades(&rows).is_empty());
    }

    #[test]
    fn other_actions_are_ignored() {
        let rows = vec![
            buy(d(2024, 1, 1), "AAPL", 10.0, -100.0),
            leg(d(2024, 1, 2), "AAPL", TradeAction::Other("dividend".into()), 10.0, 1.0, 10.0, Some("Z1")),
        ];
        let result = matcher().match_trades(&rows);
        assert!(result.is_empty());
        assert_eq!(result.unmatched_buys.len(), 1);
        assert!(result.unmatched_sells.is_empty());
    }

    #[test]
    fn groups_come_out_in_symbol_order() {
        let rows = vec![
            buy(d(2024, 1, 1), "MSFT", 1.0, -10.0),
            sell(d(2024, 1, 2), "MSFT", 1.0, 20.0),
            buy(d(2024, 1, 3), "AAPL", 1.0, -10.0),
            sell(d(2024, 1, 4), "AAPL", 1.0, 5.0),
        ];
        let result = matcher().match_trades(&rows);
        let symbols: Vec<&str> = result.trades.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn no_account_column_forms_one_group() {
        let rows = vec![
            leg(d(2024, 1, 1), "AAPL", TradeAction::Buy, 10.0, 10.0, -100.0, None),
            leg(d(2024, 1, 2), "AAPL", TradeAction::Sell, 10.0, 12.0, 120.0, None),
        ];
        let result = matcher().match_trades(&rows);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].account, None);
    }
}

// ═══════════════════════════════════════════════════════════════════
// AnalyticsService
// ═══════════════════════════════════════════════════════════════════

mod analytics_service {
    use super::*;

    fn sample() -> Vec<MatchedTrade> {
        vec![
            trade(d(2024, 12, 30), "AAPL", Some("Z1"), 200.0),
            trade(d(2024, 12, 31), "MSFT", Some("Z2"), -50.0),
            trade(d(2025, 1, 2), "AAPL", None, 0.0),
            trade(d(2025, 1, 2), "TSLA", Some("Z1"), 75.0),
        ]
    }

    #[test]
    fn bucket_keys() {
        let svc = AnalyticsService::default();
        let t = trade(d(2024, 12, 30), "AAPL", None, 1.0);
        assert_eq!(svc.bucket_key(&t, BucketDimension::Day), "2024-12-30");
        assert_eq!(svc.bucket_key(&t, BucketDimension::Week), "2025-W01");
        assert_eq!(svc.bucket_key(&t, BucketDimension::Month), "2024-12");
        assert_eq!(svc.bucket_key(&t, BucketDimension::Symbol), "AAPL");
        assert_eq!(svc.bucket_key(&t, BucketDimension::Account), "Unassigned");
    }

    #[test]
    fn sunday_start_week_labels() {
        let settings = Settings {
            week_label: WeekLabelStyle::SundayStart,
            ..Default::default()
        };
        let svc = AnalyticsService::new(&settings);
        let t = trade(d(2024, 12, 30), "AAPL", None, 1.0);
        assert_eq!(svc.bucket_key(&t, BucketDimension::Week), "2024-W52");
    }

    #[test]
    fn aggregate_daily_and_by_account() {
        let svc = AnalyticsService::default();
        let daily = svc.aggregate(&sample(), BucketDimension::Day);
        assert_eq!(daily.len(), 3);
        assert_eq!(daily["2025-01-02"], 75.0);

        let by_account = svc.aggregate(&sample(), BucketDimension::Account);
        assert_eq!(by_account["Z1"], 275.0);
        assert_eq!(by_account["Z2"], -50.0);
        assert_eq!(by_account["Unassigned"], 0.0);
    }

    #[test]
    fn series_keys_sort_chronologically() {
        let svc = AnalyticsService::default();
        let monthly: Vec<String> = svc
            .aggregate(&sample(), BucketDimension::Month)
            .into_keys()
            .collect();
        assert_eq!(monthly, strings(&["2024-12", "2025-01"]));
    }

    #[test]
    fn empty_buckets_are_absent() {
        let svc = AnalyticsService::default();
        assert!(svc.aggregate(&[], BucketDimension::Day).is_empty());
    }

    #[test]
    fn summary_statistics() {
        let settings = Settings {
            top_n: 2,
            ..Default::default()
        };
        let summary = AnalyticsService::new(&settings).summarize(&sample());
        assert_eq!(summary.trade_count, 4);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.breakeven, 1);
        assert_eq!(summary.win_rate, 0.5);
        assert_eq!(summary.total_pnl, 225.0);
        assert_eq!(summary.mean_pnl, 56.25);
        assert_eq!(summary.max_pnl, Some(200.0));
        assert_eq!(summary.min_pnl, Some(-50.0));

        let top: Vec<f64> = summary.top_trades.iter().map(|t| t.pnl).collect();
        let bottom: Vec<f64> = summary.bottom_trades.iter().map(|t| t.pnl).collect();
        assert_eq!(top, vec![200.0, 75.0]);
        assert_eq!(bottom, vec![-50.0, 0.0]);
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = AnalyticsService::default().summarize(&[]);
        assert_eq!(summary.trade_count, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.mean_pnl, 0.0);
        assert_eq!(summary.max_pnl, None);
        assert!(summary.top_trades.is_empty());
    }

    #[test]
    fn report_totals_agree() {
        let report = AnalyticsService::default().build_report(&sample());
        let daily: f64 = report.daily.values().sum();
        let monthly: f64 = report.monthly.values().sum();
        assert_eq!(daily, report.summary.total_pnl);
        assert_eq!(monthly, report.summary.total_pnl);
        assert_eq!(report.by_symbol.len(), 3);
    }

    #[test]
    fn available_months_ascending_and_distinct() {
        let months = AnalyticsService::default().available_months(&sample());
        assert_eq!(months, vec![(2024, 12), (2025, 1)]);
    }
}

// ═══════════════════════════════════════════════════════════════════
// CalendarService
// ═══════════════════════════════════════════════════════════════════

mod calendar_service {
    use super::*;

    fn monday() -> CalendarService {
        CalendarService::default()
    }

    fn sunday() -> CalendarService {
        CalendarService::new(&Settings {
            calendar_week_start: WeekStart::Sunday,
            ..Default::default()
        })
    }

    fn leading_padding(month: &trade_pnl_core::models::calendar::CalendarMonth) -> usize {
        month.weeks[0]
            .cells
            .iter()
            .take_while(|c| matches!(c, CalendarCell::Padding))
            .count()
    }

    #[test]
    fn leap_february() {
        // 2024-02-01 is a Thursday
        let month = monday().build_month(2024, 2, &[]).unwrap();
        assert_eq!(month.days().count(), 29);
        assert_eq!(leading_padding(&month), 3);
        assert_eq!(month.weeks.len(), 5);

        let month = sunday().build_month(2024, 2, &[]).unwrap();
        assert_eq!(leading_padding(&month), 4);
        assert_eq!(month.weeks.len(), 5);
    }

    #[test]
    fn non_leap_february_on_a_monday_fills_four_rows() {
        let month = monday().build_month(2021, 2, &[]).unwrap();
        assert_eq!(month.days().count(), 28);
        assert_eq!(month.weeks.len(), 4);
        assert_eq!(leading_padding(&month), 0);
    }

    #[test]
    fn six_row_month() {
        // 2024-09-01 is a Sunday
        let month = monday().build_month(2024, 9, &[]).unwrap();
        assert_eq!(leading_padding(&month), 6);
        assert_eq!(month.weeks.len(), 6);

        let month = sunday().build_month(2024, 9, &[]).unwrap();
        assert_eq!(leading_padding(&month), 0);
        assert_eq!(month.weeks.len(), 5);
    }

    #[test]
    fn year_boundary() {
        let december = monday().build_month(2023, 12, &[]).unwrap();
        let january = monday().build_month(2024, 1, &[]).unwrap();
        assert_eq!(december.days().count(), 31);
        assert_eq!(january.days().count(), 31);
        assert_eq!(december.days().last().map(|d| d.date), NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(january.days().next().map(|d| d.date), NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn day_classification() {
        let trades = vec![
            trade(d(2024, 3, 4), "AAPL", None, 120.0),
            trade(d(2024, 3, 5), "MSFT", None, -40.0),
            trade(d(2024, 3, 6), "AAPL", None, 10.0),
            trade(d(2024, 3, 6), "TSLA", None, -10.0),
            // Other months are ignored
            trade(d(2024, 4, 4), "AAPL", None, 999.0),
        ];
        let month = monday().build_month(2024, 3, &trades).unwrap();
        let class = |day| month.day(NaiveDate::from_ymd_opt(2024, 3, day).unwrap()).unwrap().class;

        assert_eq!(class(4), DayClass::Positive);
        assert_eq!(class(5), DayClass::Negative);
        assert_eq!(class(6), DayClass::Flat);
        assert_eq!(class(7), DayClass::NoTrades);
        assert_eq!(month.trading_days, 3);
        assert_eq!(month.total_pnl, 80.0);
    }

    #[test]
    fn day_details_list_contributing_trades() {
        let trades = vec![
            trade(d(2024, 3, 6), "AAPL", None, 10.0),
            trade(d(2024, 3, 6), "TSLA", None, 5.5),
        ];
        let month = monday().build_month(2024, 3, &trades).unwrap();
        let day = month.day(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()).unwrap();
        assert_eq!(day.trade_count, 2);
        assert_eq!(day.pnl, 15.5);
        let symbols: Vec<&str> = day.trades.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "TSLA"]);
    }

    #[test]
    fn padding_cells_carry_no_class() {
        let month = monday().build_month(2024, 2, &[]).unwrap();
        let padding = month
            .weeks
            .iter()
            .flat_map(|w| w.cells.iter())
            .filter(|c| c.class().is_none())
            .count();
        assert_eq!(padding, 5 * DAYS_PER_WEEK - 29);
    }

    #[test]
    fn invalid_month_is_validation_error() {
        assert!(matches!(monday().build_month(2024, 13, &[]), Err(CoreError::Validation(_))));
        assert!(matches!(monday().build_month(2024, 0, &[]), Err(CoreError::Validation(_))));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════

mod properties {
    use super::*;

    const SYMBOLS: [&str; 3] = ["AAPL", "MSFT", "TSLA"];
    const ACCOUNTS: [&str; 2] = ["A", "B"];

    fn arb_transaction() -> impl Strategy<Value = RawTransaction> {
        (0u32..10, 0usize..3, 0usize..2, any::<bool>(), 1u32..4, -500i32..500).prop_map(
            |(day, symbol, account, is_buy, quantity, net)| RawTransaction {
                transaction_date: d(2024, 5, day + 1),
                symbol: SYMBOLS[symbol].into(),
                action: if is_buy { TradeAction::Buy } else { TradeAction::Sell },
                quantity: quantity as f64,
                price: 10.0,
                net_amount: net as f64,
                account: Some(ACCOUNTS[account].into()),
            },
        )
    }

    proptest! {
        #[test]
        fn dedup_is_idempotent(rows in prop::collection::vec(arb_transaction(), 0..40)) {
            let svc = DedupService::new();
            let once = svc.dedupe(rows);
            let twice = svc.dedupe(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn every_leg_is_used_at_most_once(rows in prop::collection::vec(arb_transaction(), 0..40)) {
            let rows = DedupService::new().dedupe(rows);
            let result = MatchingService::new().match_trades(&rows);

            let buys = rows.iter().filter(|t| t.action.is_buy()).count();
            let sells = rows.iter().filter(|t| t.action.is_sell()).count();
            prop_assert_eq!(result.trades.len() + result.unmatched_buys.len(), buys);
            prop_assert_eq!(result.trades.len() + result.unmatched_sells.len(), sells);
        }

        #[test]
        fn matches_per_group_bounded(rows in prop::collection::vec(arb_transaction(), 0..40)) {
            let rows = DedupService::new().dedupe(rows);
            let result = MatchingService::new().match_trades(&rows);

            for symbol in SYMBOLS {
                for account in ACCOUNTS {
                    let in_group = |t: &&RawTransaction| t.symbol == symbol && t.account.as_deref() == Some(account);
                    let buys = rows.iter().filter(in_group).filter(|t| t.action.is_buy()).count();
                    let sells = rows.iter().filter(in_group).filter(|t| t.action.is_sell()).count();
                    let matched = result
                        .trades
                        .iter()
                        .filter(|t| t.symbol == symbol && t.account.as_deref() == Some(account))
                        .count();
                    prop_assert!(matched <= buys.min(sells));
                }
            }
        }

        #[test]
        fn aggregation_conserves_pnl(rows in prop::collection::vec(arb_transaction(), 0..40)) {
            let rows = DedupService::new().dedupe(rows);
            let trades = MatchingService::new().match_trades(&rows).trades;
            let report = AnalyticsService::default().build_report(&trades);

            let total: f64 = trades.iter().map(|t| t.pnl).sum();
            for dimension in [BucketDimension::Day, BucketDimension::Week, BucketDimension::Month, BucketDimension::Symbol, BucketDimension::Account] {
                let bucketed: f64 = report.series(dimension).values().sum();
                prop_assert!((bucketed - total).abs() < 1e-6);
            }
        }

        #[test]
        fn calendar_is_rectangular(year in 1990i32..2100, month in 1u32..=12, sunday_start in any::<bool>()) {
            let settings = Settings {
                calendar_week_start: if sunday_start { WeekStart::Sunday } else { WeekStart::Monday },
                ..Default::default()
            };
            let grid = CalendarService::new(&settings).build_month(year, month, &[]).unwrap();

            prop_assert!((4..=6).contains(&grid.weeks.len()));
            prop_assert!(grid.weeks.iter().all(|w| w.cells.len() == DAYS_PER_WEEK));
            let days: Vec<u32> = grid.days().map(|d| chrono::Datelike::day(&d.date)).collect();
            prop_assert_eq!(days.first().copied(), Some(1));
            prop_assert!((28..=31).contains(&days.len()));
            prop_assert!(days.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }
}
