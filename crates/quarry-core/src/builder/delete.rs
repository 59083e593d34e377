//! DELETE statement assembly.

use super::Statement;
use crate::corrector::CorrectedQuery;

/// Assembles `DELETE FROM t [WHERE ...]`.
///
/// An empty WHERE clause is omitted rather than rendered blank.
#[derive(Debug, Clone, Copy)]
pub struct Delete<'a> {
    query: &'a CorrectedQuery,
}

impl<'a> Delete<'a> {
    /// Starts a DELETE from the corrected query's table.
    #[must_use]
    pub fn new(query: &'a CorrectedQuery) -> Self {
        Self { query }
    }

    /// Builds the statement.
    #[must_use]
    pub fn build(self) -> Statement {
        let mut sql = format!("DELETE FROM {}", self.query.table);
        if self.query.where_clause.is_empty() {
            return Statement::raw(sql);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&self.query.where_clause);
        Statement::new(sql, self.query.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrector::{DialectCorrector, QueryShape};
    use crate::predicate::PredicateBuilder;

    #[test]
    fn test_delete_all() {
        let q = DialectCorrector::new().correct(&QueryShape::delete("t"));
        assert_eq!(Delete::new(&q).build().sql, "DELETE FROM t");
    }

    #[test]
    fn test_delete_with_where() {
        let mut find = PredicateBuilder::new("t");
        find.deleted();
        let q = DialectCorrector::new().correct(&QueryShape::delete("t").selection(find.selection()));
        let stmt = Delete::new(&q).build();
        assert_eq!(stmt.sql, "DELETE FROM t WHERE t.deleted = ?");
        assert_eq!(stmt.params, ["1"]);
    }

    #[test]
    fn test_limited_delete() {
        let q = DialectCorrector::new().correct(&QueryShape::delete("t").limit(5).offset(10));
        assert_eq!(
            Delete::new(&q).build().sql,
            "DELETE FROM t WHERE t.rowid IN (SELECT t.rowid FROM t ORDER BY t.rowid ASC LIMIT 5 OFFSET 10)"
        );
    }
}
