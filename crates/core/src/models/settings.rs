use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// How `net_amount` signs are treated before PnL is computed.
///
/// The PnL formula `sell.net_amount + buy.net_amount` only holds when buys
/// are cash outflows (negative) and sells are inflows (positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Reject buys with a positive or sells with a negative net amount
    #[default]
    Strict,
    /// Force buy → -|net|, sell → +|net|
    Normalize,
    /// Use net amounts exactly as exported
    Trust,
}

/// Labelling scheme for weekly buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekLabelStyle {
    /// ISO-8601 week-year and week number, e.g. `2025-W01`
    #[default]
    Iso,
    /// Calendar year and Sunday-start week number (`%Y-W%U`)
    SundayStart,
}

/// First column of the calendar grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

/// User-configurable settings for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Activity-type value that marks trade rows (compared case-insensitively).
    pub trade_activity_tag: String,

    pub sign_convention: SignConvention,

    pub week_label: WeekLabelStyle,

    pub calendar_week_start: WeekStart,

    /// Number of best/worst trades listed in the summary
    pub top_n: usize,

    /// Rows shown in the table preview
    pub preview_rows: usize,

    /// chrono format strings tried before the built-in date formats
    pub extra_date_formats: Vec<String>,

    /// Keep every upload in the trade store and analyze the combined set
    pub accumulate_uploads: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trade_activity_tag: "trades".to_string(),
            sign_convention: SignConvention::Strict,
            week_label: WeekLabelStyle::Iso,
            calendar_week_start: WeekStart::Monday,
            top_n: 5,
            preview_rows: 5,
            extra_date_formats: Vec::new(),
            accumulate_uploads: false,
        }
    }
}

impl Settings {
    /// Parse settings from TOML; absent keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, CoreError> {
        let settings: Settings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file on disk.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Cannot read settings file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.trade_activity_tag.trim().is_empty() {
            return Err(CoreError::Config(
                "trade_activity_tag must not be blank".into(),
            ));
        }
        if self.top_n == 0 {
            return Err(CoreError::Config("top_n must be at least 1".into()));
        }
        Ok(())
    }
}
