//! Tabular query results.

use crate::errors::ArxError;
use schemars::JsonSchema;
use serde::Serialize;

/// One output row. Values align with the result's column order; `None`
/// marks a missing value and renders as the empty string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    pub values: Vec<Option<String>>,
}

impl ResultRow {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Cell text at `idx`, empty string when missing.
    pub fn value(&self, idx: usize) -> &str {
        self.values
            .get(idx)
            .and_then(|v| v.as_deref())
            .unwrap_or("")
    }
}

/// Execution statistics reported alongside results.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct ExecStats {
    pub files_total: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    /// Rows accumulated before grouping/ordering/limiting.
    pub raw_rows: usize,
    pub elapsed_secs: f64,
    pub cancelled: bool,
}

/// Ordered rows plus the diagnostics gathered while producing them.
#[derive(Debug, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    pub warnings: Vec<ArxError>,
    pub stats: ExecStats,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate one row as `(column, value)` pairs in column order.
    pub fn named_row(&self, idx: usize) -> impl Iterator<Item = (&str, &str)> {
        let row = &self.rows[idx];
        self.columns
            .iter()
            .enumerate()
            .map(move |(i, c)| (c.as_str(), row.value(i)))
    }
}
