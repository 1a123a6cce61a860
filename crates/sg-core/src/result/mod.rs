//! Query results: a tabular result set or a terminal fallback message.

use serde::{Deserialize, Serialize};

/// Ordered columns and rows, mirroring whatever the executed SQL returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    /// Values of the first column as strings; non-string cells are skipped.
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResult {
    Table(ResultSet),
    Fallback { message: String },
}

impl QueryResult {
    pub fn fallback(message: impl Into<String>) -> Self {
        Self::Fallback {
            message: message.into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}
