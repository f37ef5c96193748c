use thiserror::Error;

/// Unified error type for the entire trade-pnl-core library.
/// Every public function returns `Result<T, CoreError>`.
///
/// An empty set of matched trades is *not* an error; see
/// [`crate::AnalysisOutcome::NoMatches`].
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input file ──────────────────────────────────────────────────
    #[error("Unsupported or unreadable file: {0}")]
    FileFormat(String),

    // ── Schema / row coercion ───────────────────────────────────────
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unparsable date in column '{column}' at row {row}: '{value}'")]
    DateParse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Net amount {net_amount} at row {row} has the wrong sign for a {action}")]
    SignConvention {
        row: usize,
        action: String,
        net_amount: f64,
    },

    // ── Caller input / configuration ────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ── File I/O (native only) ──────────────────────────────────────
    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        // csv wraps I/O failures too; keep those distinct from malformed content.
        if e.is_io_error() {
            return CoreError::FileIO(e.to_string());
        }
        CoreError::FileFormat(e.to_string())
    }
}

impl From<calamine::Error> for CoreError {
    fn from(e: calamine::Error) -> Self {
        CoreError::FileFormat(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(e: toml::de::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
