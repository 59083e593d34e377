//! INSERT statement assembly.

use super::Statement;
use crate::error::{ensure_same_len, Result};
use crate::value::SqlValue;

/// Columns managed by the engine or the persistence layer, never inserted.
pub const IMMUTABLE_COLUMNS: [&str; 3] = ["rowid", "created_at", "modified_at"];

/// Assembles `INSERT INTO t (c1, c2) VALUES (?, ?)`.
///
/// Immutable columns are dropped together with their values; the remaining
/// columns keep their relative order. NULL values are written as `NULL`
/// instead of a placeholder.
#[derive(Debug, Clone)]
pub struct Insert {
    table: String,
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Insert {
    /// Starts an INSERT into `table`.
    #[must_use]
    pub fn into_table(table: &str) -> Self {
        Self {
            table: String::from(table),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Sets the row as parallel column and value slices.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::QueryError::LengthMismatch`] if the slices differ
    /// in length.
    pub fn row(mut self, columns: &[&str], values: &[SqlValue]) -> Result<Self> {
        ensure_same_len("columns/values", columns.len(), values.len())?;
        for (column, value) in columns.iter().zip(values) {
            if IMMUTABLE_COLUMNS
                .iter()
                .any(|c| c.eq_ignore_ascii_case(column))
            {
                continue;
            }
            self.columns.push(String::from(*column));
            self.values.push(value.clone());
        }
        Ok(self)
    }

    /// Builds the statement.
    #[must_use]
    pub fn build(self) -> Statement {
        let mut params = Vec::with_capacity(self.values.len());
        let placeholders: Vec<&str> = self
            .values
            .iter()
            .map(|v| match v.to_param() {
                Some(text) => {
                    params.push(text);
                    "?"
                }
                None => "NULL",
            })
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        );
        Statement { sql, params }
    }
}
