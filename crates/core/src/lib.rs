pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod storage;

use std::sync::Arc;

use models::{
    analytics::PnlReport,
    calendar::CalendarMonth,
    mapping::{ColumnMapping, ColumnResolution},
    settings::Settings,
    table::RawTable,
    trade::{MatchResult, MatchedTrade},
    transaction::{AccountFilter, RawTransaction},
};
use services::{
    account_service::AccountService,
    analytics_service::AnalyticsService,
    calendar_service::CalendarService,
    column_resolver::ColumnResolver,
    dedup_service::DedupService,
    matching_service::MatchingService,
    schema_service::{NormalizationReport, SchemaService},
};
use storage::{
    manager::StorageManager,
    trade_store::{InMemoryTradeStore, StoreUpdate, TradeStore},
};
use tracing::info;

use errors::CoreError;

/// Everything computed for one upload that produced at least one match.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeAnalysis {
    /// Account-filtered, deduplicated transactions that were fed to the matcher
    pub transactions: Vec<RawTransaction>,
    pub normalization: NormalizationReport,
    pub matches: MatchResult,
    pub report: PnlReport,
    /// Store counts after the merge; `None` unless uploads accumulate
    pub store_update: Option<StoreUpdate>,
}

/// Terminal state of [`TradePnl::analyze`].
///
/// An empty match set is a normal outcome, not an error. The filtered,
/// deduplicated transactions and store counts are still handed back.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Matched(TradeAnalysis),
    NoMatches {
        transactions: Vec<RawTransaction>,
        normalization: NormalizationReport,
        store_update: Option<StoreUpdate>,
    },
}

impl AnalysisOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, AnalysisOutcome::Matched(_))
    }

    /// Store counts after the merge, for either outcome.
    pub fn store_update(&self) -> Option<StoreUpdate> {
        match self {
            AnalysisOutcome::Matched(analysis) => analysis.store_update,
            AnalysisOutcome::NoMatches { store_update, .. } => *store_update,
        }
    }

    /// Transactions that reached the matcher, for either outcome.
    pub fn transactions(&self) -> &[RawTransaction] {
        match self {
            AnalysisOutcome::Matched(analysis) => &analysis.transactions,
            AnalysisOutcome::NoMatches { transactions, .. } => transactions,
        }
    }
}

/// Main entry point for the trade PnL core library.
/// Holds session settings, the trade store, and the latest analysis.
#[must_use]
pub struct TradePnl {
    settings: Settings,
    store: Arc<dyn TradeStore>,
    schema_service: SchemaService,
    column_resolver: ColumnResolver,
    account_service: AccountService,
    dedup_service: DedupService,
    matching_service: MatchingService,
    analytics_service: AnalyticsService,
    calendar_service: CalendarService,
    last_analysis: Option<TradeAnalysis>,
}

impl std::fmt::Debug for TradePnl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradePnl")
            .field("settings", &self.settings)
            .field("stored_transactions", &self.store.len())
            .field(
                "matched_trades",
                &self.last_analysis.as_ref().map(|a| a.matches.trades.len()),
            )
            .finish()
    }
}

impl TradePnl {
    /// Start a session with a private in-memory trade store.
    pub fn new(settings: Settings) -> Result<Self, CoreError> {
        Self::with_store(settings, Arc::new(InMemoryTradeStore::new()))
    }

    /// Start a session backed by a shared store (e.g. one per process).
    pub fn with_store(settings: Settings, store: Arc<dyn TradeStore>) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self {
            schema_service: SchemaService::new(&settings),
            column_resolver: ColumnResolver::new(),
            account_service: AccountService::new(),
            dedup_service: DedupService::new(),
            matching_service: MatchingService::new(),
            analytics_service: AnalyticsService::new(&settings),
            calendar_service: CalendarService::new(&settings),
            settings,
            store,
            last_analysis: None,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Ingestion ───────────────────────────────────────────────────

    /// Decode an uploaded file and canonicalize its header labels.
    /// Use this when the frontend handles file I/O.
    pub fn load_table(&self, file_name: &str, data: &[u8]) -> Result<RawTable, CoreError> {
        let table = StorageManager::load_from_bytes(file_name, data)?;
        Ok(self.schema_service.normalize_table(table))
    }

    /// Read a file from disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_table_from_file(&self, path: &str) -> Result<RawTable, CoreError> {
        let table = StorageManager::load_from_file(path)?;
        Ok(self.schema_service.normalize_table(table))
    }

    /// The first `preview_rows` rows, shown before the user confirms a mapping.
    #[must_use]
    pub fn preview(&self, table: &RawTable) -> RawTable {
        table.preview(self.settings.preview_rows)
    }

    /// Best-effort guess of column roles. Ambiguous or missing fields must
    /// be settled by the user before calling [`Self::analyze`].
    #[must_use]
    pub fn resolve_columns(&self, table: &RawTable) -> ColumnResolution {
        self.column_resolver.resolve(table)
    }

    /// Distinct accounts in the table's trade rows, sorted.
    pub fn list_accounts(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
    ) -> Result<Vec<String>, CoreError> {
        let extracted = self.schema_service.extract_transactions(table, mapping)?;
        Ok(self.account_service.accounts(&extracted.transactions))
    }

    // ── Analysis ────────────────────────────────────────────────────

    /// Run the full pipeline: extract → filter → dedupe → match → aggregate.
    ///
    /// With `accumulate_uploads` the extracted rows are merged into the
    /// trade store first and the analysis covers the whole store.
    pub fn analyze(
        &mut self,
        table: &RawTable,
        mapping: &ColumnMapping,
        filter: &AccountFilter,
    ) -> Result<AnalysisOutcome, CoreError> {
        let extracted = self.schema_service.extract_transactions(table, mapping)?;
        let normalization = extracted.report;

        let (candidates, store_update) = if self.settings.accumulate_uploads {
            let update = self.store.append_dedup(extracted.transactions);
            info!(added = update.added, total = update.total, "Accumulated upload");
            (self.store.snapshot(), Some(update))
        } else {
            (extracted.transactions, None)
        };

        let selected = self.account_service.filter(candidates, filter);
        let transactions = self.dedup_service.dedupe(selected);
        let matches = self.matching_service.match_trades(&transactions);

        if matches.is_empty() {
            info!(transactions = transactions.len(), "No buy/sell pairs matched");
            self.last_analysis = None;
            return Ok(AnalysisOutcome::NoMatches {
                transactions,
                normalization,
                store_update,
            });
        }

        let report = self.analytics_service.build_report(&matches.trades);
        let analysis = TradeAnalysis {
            transactions,
            normalization,
            matches,
            report,
            store_update,
        };
        self.last_analysis = Some(analysis.clone());
        Ok(AnalysisOutcome::Matched(analysis))
    }

    /// Latest successful analysis, if any.
    #[must_use]
    pub fn last_analysis(&self) -> Option<&TradeAnalysis> {
        self.last_analysis.as_ref()
    }

    /// Matched trades of the latest analysis (empty when there is none).
    #[must_use]
    pub fn matched_trades(&self) -> &[MatchedTrade] {
        self.last_analysis
            .as_ref()
            .map(|a| a.matches.trades.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn report(&self) -> Option<&PnlReport> {
        self.last_analysis.as_ref().map(|a| &a.report)
    }

    // ── Calendar ────────────────────────────────────────────────────

    /// Day grid for one month of the latest analysis.
    pub fn calendar(&self, year: i32, month: u32) -> Result<CalendarMonth, CoreError> {
        self.calendar_service
            .build_month(year, month, self.matched_trades())
    }

    /// Months that contain at least one exit, ascending.
    #[must_use]
    pub fn available_months(&self) -> Vec<(i32, u32)> {
        self.analytics_service
            .available_months(self.matched_trades())
    }

    // ── Export ──────────────────────────────────────────────────────

    /// Matched trades as CSV bytes for download.
    pub fn export_csv(&self) -> Result<Vec<u8>, CoreError> {
        StorageManager::export_to_bytes(self.matched_trades())
    }

    /// Write the matched-trade CSV to disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn export_to_file(&self, path: &str) -> Result<(), CoreError> {
        StorageManager::save_export_to_file(self.matched_trades(), path)
    }

    /// Matched trades of the latest analysis as a JSON array.
    pub fn export_trades_to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self.matched_trades())?)
    }

    /// Report of the latest analysis as JSON.
    pub fn report_to_json(&self) -> Result<String, CoreError> {
        let report = self
            .report()
            .ok_or_else(|| CoreError::Validation("No analysis to export".into()))?;
        serde_json::to_string_pretty(report)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize report: {e}")))
    }

    // ── Store ───────────────────────────────────────────────────────

    /// Number of transactions held across uploads.
    #[must_use]
    pub fn stored_transactions(&self) -> usize {
        self.store.len()
    }

    /// Forget every accumulated upload and the latest analysis.
    pub fn clear_store(&mut self) {
        self.store.clear();
        self.last_analysis = None;
    }
}
