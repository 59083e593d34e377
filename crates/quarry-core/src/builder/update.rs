//! UPDATE statement assembly.

use super::Statement;
use crate::corrector::CorrectedQuery;
use crate::error::{ensure_same_len, Result};
use crate::value::SqlValue;

/// Assembles `UPDATE t SET c1=?,c2=? WHERE ...`.
///
/// Parameters are the SET values followed by the WHERE arguments.
#[derive(Debug, Clone)]
pub struct Update<'a> {
    query: &'a CorrectedQuery,
    assignments: Vec<(String, SqlValue)>,
}

impl<'a> Update<'a> {
    /// Starts an UPDATE of the corrected query's table.
    #[must_use]
    pub fn new(query: &'a CorrectedQuery) -> Self {
        Self {
            query,
            assignments: Vec::new(),
        }
    }

    /// Sets columns from parallel column and value slices.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::QueryError::LengthMismatch`] if the slices differ
    /// in length.
    pub fn set(mut self, columns: &[&str], values: &[SqlValue]) -> Result<Self> {
        ensure_same_len("columns/values", columns.len(), values.len())?;
        self.assignments.extend(
            columns
                .iter()
                .zip(values)
                .map(|(c, v)| (String::from(*c), v.clone())),
        );
        Ok(self)
    }

    /// Builds the statement.
    #[must_use]
    pub fn build(self) -> Statement {
        let mut params = Vec::new();
        let sets: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, value)| match value.to_param() {
                Some(text) => {
                    params.push(text);
                    format!("{column}=?")
                }
                None => format!("{column}=NULL"),
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.query.table, sets.join(","));
        if !self.query.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.query.where_clause);
            params.extend_from_slice(&self.query.params);
        }
        Statement { sql, params }
    }
}
