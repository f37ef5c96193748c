use serde::{Deserialize, Serialize};

/// An uploaded table as text cells, exactly as read from the file.
///
/// Tables built by [`RawTable::new`] (and every reader) have exactly
/// `columns.len()` cells per row. Hand-built tables may be ragged; missing
/// cells read as blank during extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Header labels in file order
    pub columns: Vec<String>,

    /// Data rows, each aligned with `columns`
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table, padding or truncating rows to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Positions of every column carrying exactly this label.
    pub fn column_positions(&self, label: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// The first `n` rows alongside the header, for display before mapping.
    pub fn preview(&self, n: usize) -> RawTable {
        RawTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}
