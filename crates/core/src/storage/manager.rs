use tracing::{debug, info};

use crate::errors::CoreError;
use crate::models::table::RawTable;
use crate::models::trade::MatchedTrade;

use super::format::{self, FileFormat};

/// High-level file operations: brokerage exports in, matched-trade CSV out.
pub struct StorageManager;

impl StorageManager {
    /// Decode an uploaded export. The format comes from `file_name`'s extension.
    ///
    /// Use this for frontends that handle file I/O themselves.
    pub fn load_from_bytes(file_name: &str, data: &[u8]) -> Result<RawTable, CoreError> {
        let file_format = FileFormat::from_file_name(file_name)?;
        if data.is_empty() {
            return Err(CoreError::FileFormat(format!("'{file_name}' is empty")));
        }

        let table = format::read_table(file_format, data)?;
        info!(
            file = file_name,
            columns = table.column_count(),
            rows = table.row_count(),
            "Loaded transaction table"
        );
        Ok(table)
    }

    /// Read and decode an export from disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<RawTable, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(path, &bytes)
    }

    /// Matched trades as CSV bytes, ready for download.
    pub fn export_to_bytes(trades: &[MatchedTrade]) -> Result<Vec<u8>, CoreError> {
        let bytes = format::write_trades_csv(trades)?;
        debug!(trades = trades.len(), bytes = bytes.len(), "Exported matched trades");
        Ok(bytes)
    }

    /// Write the matched-trade CSV to disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_export_to_file(trades: &[MatchedTrade], path: &str) -> Result<(), CoreError> {
        let bytes = Self::export_to_bytes(trades)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
