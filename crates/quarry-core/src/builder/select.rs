//! SELECT statement assembly.

use super::Statement;
use crate::corrector::CorrectedQuery;
use crate::error::{QueryError, Result};
use crate::join::Projection;
use crate::predicate::Selection;

/// Assembles a SELECT from a corrected query.
///
/// Clause order is fixed: SELECT, FROM, WHERE, GROUP BY, HAVING, ORDER BY,
/// LIMIT, OFFSET.
#[derive(Debug, Clone)]
pub struct Select<'a> {
    query: &'a CorrectedQuery,
    projections: Vec<Projection>,
    group_by: Vec<String>,
    having: Option<Selection>,
}

impl<'a> Select<'a> {
    /// Starts a SELECT over `query`.
    #[must_use]
    pub fn new(query: &'a CorrectedQuery) -> Self {
        Self {
            query,
            projections: Vec::new(),
            group_by: Vec::new(),
            having: None,
        }
    }

    /// Adds projections. Without any, all columns are selected.
    #[must_use]
    pub fn projections(mut self, projections: &[Projection]) -> Self {
        self.projections.extend_from_slice(projections);
        self
    }

    /// Sets the GROUP BY columns.
    #[must_use]
    pub fn group_by(mut self, columns: &[String]) -> Self {
        self.group_by = columns.to_vec();
        self
    }

    /// Sets the HAVING condition.
    #[must_use]
    pub fn having(mut self, having: Option<Selection>) -> Self {
        self.having = having.filter(|h| !h.is_empty());
        self
    }

    /// Builds the statement.
    ///
    /// # Errors
    ///
    /// Fails with [`QueryError::HavingWithoutGroupBy`] when a HAVING condition
    /// is set without GROUP BY columns.
    pub fn build(self) -> Result<Statement> {
        if self.having.is_some() && self.group_by.is_empty() {
            return Err(QueryError::HavingWithoutGroupBy);
        }

        let mut sql = String::from("SELECT ");
        let mut params = self.query.params.clone();

        if self.projections.iter().any(|p| p.distinct) {
            sql.push_str("DISTINCT ");
        }

        let columns: Vec<String> = self
            .projections
            .iter()
            .flat_map(Projection::qualified_columns)
            .collect();
        if columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&columns.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.query.from);

        if !self.query.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.query.where_clause);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(having.where_clause());
            params.extend_from_slice(having.args());
        }

        if !self.query.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.query.order_by);
        }

        // Compound queries were already limited inside the subselect.
        if !self.query.compound {
            if let Some(limit) = self.query.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            if let Some(offset) = self.query.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        Ok(Statement { sql, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrector::{DialectCorrector, QueryShape};
    use crate::predicate::PredicateBuilder;

    fn correct(shape: &QueryShape) -> CorrectedQuery {
        DialectCorrector::new().correct(shape)
    }

    #[test]
    fn test_select_all() {
        let q = correct(&QueryShape::select("users"));
        let stmt = Select::new(&q).build().unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users ORDER BY users.rowid ASC");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_clause_order() {
        let mut find = PredicateBuilder::new("users");
        find.gt(("users", "age"), 18);
        let mut having = PredicateBuilder::new("users");
        having.gt(("users", "age"), 30);

        let q = correct(
            &QueryShape::select("users")
                .selection(find.selection())
                .order_by("users.city ASC")
                .limit(5)
                .offset(10),
        );
        let stmt = Select::new(&q)
            .projections(&[Projection::new("users", &["city"]).distinct()])
            .group_by(&[String::from("users.city")])
            .having(Some(having.selection()))
            .build()
            .unwrap();

        assert_eq!(
            stmt.sql,
            "SELECT DISTINCT users.city FROM users WHERE users.age > ? GROUP BY users.city \
             HAVING users.age > ? ORDER BY users.city ASC LIMIT 5 OFFSET 10"
        );
        assert_eq!(stmt.params, ["18", "30"]);
    }

    #[test]
    fn test_having_without_group_by_fails() {
        let mut having = PredicateBuilder::new("users");
        having.gt(("users", "age"), 30);
        let q = correct(&QueryShape::select("users"));
        let err = Select::new(&q)
            .having(Some(having.selection()))
            .build()
            .unwrap_err();
        assert_eq!(err, QueryError::HavingWithoutGroupBy);
    }

    #[test]
    fn test_compound_suppresses_outer_limit() {
        let q = correct(&QueryShape::select("t").limit(3).last(true));
        let stmt = Select::new(&q).build().unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM t WHERE t.rowid IN (SELECT t.rowid FROM t ORDER BY t.rowid DESC LIMIT 3) \
             ORDER BY t.rowid ASC"
        );
    }
}
