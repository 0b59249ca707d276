//! Query result rows and pagination envelope.

use std::collections::HashMap;

use crate::content::PropertyValue;

/// One result row: projected column name to value. A `None` value means
/// the column is null for this row, e.g. the unmatched side of a left
/// join.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    values: HashMap<String, Option<PropertyValue>>,
}

impl ResultRow {
    /// Create an empty row.
    pub fn new() -> Self {
        ResultRow::default()
    }

    /// Set a column value.
    pub fn set(&mut self, column: impl Into<String>, value: Option<PropertyValue>) {
        self.values.insert(column.into(), value);
    }

    /// Get a column value; `None` when the column is absent or null.
    pub fn get(&self, column: &str) -> Option<&PropertyValue> {
        self.values.get(column).and_then(|value| value.as_ref())
    }

    /// Whether the row carries the column at all.
    pub fn has_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An executed query's result: the page of rows plus pagination hints.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// The returned rows, in final order.
    pub rows: Vec<ResultRow>,
    /// Total number of rows before offset/limit.
    pub total_count: u64,
    /// Whether rows beyond this page exist.
    pub has_more: bool,
}

impl QueryResult {
    /// Number of returned rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the page is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
