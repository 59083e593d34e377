//! Query sessions: one logical request composed from fluent calls.
//!
//! A [`QuerySession`] owns the base table, joins, projections, and the live
//! predicate/order pair. Execution goes through a [`Queryable`] collaborator;
//! the session itself never touches a database.

use tracing::debug;

use crate::builder::{Delete, Insert, Select, Statement, Update};
use crate::corrector::{CorrectedQuery, DialectCorrector, QueryShape};
use crate::error::{QueryError, Result};
use crate::join::{Join, JoinGraph, Projection};
use crate::order::OrderSpec;
use crate::predicate::{Column, PredicateBuilder, Selection};
use crate::value::SqlValue;

/// Something that can run compiled statements.
///
/// Errors raised while running a statement are returned unchanged by the
/// session. Compile errors are converted through `From<QueryError>`.
pub trait Queryable {
    /// Rows returned by a query.
    type Rows;
    /// Execution error.
    type Error: From<QueryError>;

    /// Runs a SELECT.
    ///
    /// # Errors
    ///
    /// Whatever the engine reports.
    fn query(&mut self, statement: &Statement) -> std::result::Result<Self::Rows, Self::Error>;

    /// Runs an INSERT, UPDATE or DELETE, returning the affected row count.
    ///
    /// # Errors
    ///
    /// Whatever the engine reports.
    fn execute(&mut self, statement: &Statement) -> std::result::Result<u64, Self::Error>;
}

/// A mutable accumulator for one query over a base table.
///
/// # Example
///
/// ```rust
/// use quarry_core::predicate::col;
/// use quarry_core::session::QuerySession;
///
/// let mut session = QuerySession::new("users");
/// session.find().eq(col("users", "name"), "bob");
/// session.order().desc(col("users", "age"));
/// session.limit(10);
///
/// let stmt = session.select_statement().unwrap();
/// assert_eq!(
///     stmt.sql,
///     "SELECT * FROM users WHERE users.name = ? ORDER BY users.age DESC LIMIT 10"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct QuerySession {
    table: String,
    graph: JoinGraph,
    projections: Vec<Projection>,
    predicate: Option<PredicateBuilder>,
    order: Option<OrderSpec>,
    group_by: Vec<String>,
    having: Option<PredicateBuilder>,
    limit: u64,
    offset: u64,
    last: bool,
}

impl QuerySession {
    /// Creates a session over `table`.
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: String::from(table),
            graph: JoinGraph::new(table),
            projections: Vec::new(),
            predicate: None,
            order: None,
            group_by: Vec::new(),
            having: None,
            limit: 0,
            offset: 0,
            last: false,
        }
    }

    /// The base table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Replaces the predicate with a fresh builder and returns it.
    pub fn find(&mut self) -> &mut PredicateBuilder {
        self.predicate.insert(PredicateBuilder::new(&self.table))
    }

    /// Replaces the order with a fresh spec and returns it.
    pub fn order(&mut self) -> &mut OrderSpec {
        self.order.insert(OrderSpec::new())
    }

    /// Replaces the HAVING condition with a fresh builder and returns it.
    pub fn having(&mut self) -> &mut PredicateBuilder {
        self.having.insert(PredicateBuilder::new(&self.table))
    }

    /// Records a join edge and appends the partner's projection.
    pub fn add_join(&mut self, join: &Join, partner: Projection) -> &mut Self {
        self.graph.add(join);
        self.projections.push(partner);
        self
    }

    /// Appends a projection.
    pub fn project(&mut self, projection: Projection) -> &mut Self {
        self.projections.push(projection);
        self
    }

    /// Appends a GROUP BY column.
    pub fn group_by(&mut self, column: impl Into<Column>) -> &mut Self {
        self.group_by.push(column.into().to_sql());
        self
    }

    /// Limits the number of rows, 0 meaning unbounded.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Skips the first `offset` rows.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Asks for the last `n` rows under the current order.
    pub fn last(&mut self, n: u64) -> &mut Self {
        self.limit = n;
        self.last = true;
        self
    }

    /// The current selection, empty if no predicate was built.
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.predicate
            .as_ref()
            .map(PredicateBuilder::selection)
            .unwrap_or_default()
    }

    /// Compiles the current request into a SELECT.
    ///
    /// # Errors
    ///
    /// Fails with [`QueryError::HavingWithoutGroupBy`] when a HAVING condition
    /// was built without GROUP BY columns.
    pub fn select_statement(&self) -> Result<Statement> {
        let order_by = self.order.as_ref().map(OrderSpec::to_sql).unwrap_or_default();
        let shape = QueryShape::select(&self.table)
            .joins(self.graph.clone())
            .selection(self.selection())
            .order_by(order_by)
            .limit(self.limit)
            .offset(self.offset)
            .last(self.last);
        let corrected = DialectCorrector::new().correct(&shape);

        Select::new(&corrected)
            .projections(&self.projections)
            .group_by(&self.group_by)
            .having(self.having.as_ref().map(PredicateBuilder::selection))
            .build()
    }

    /// Compiles an INSERT of one row into the base table.
    ///
    /// # Errors
    ///
    /// Fails with [`QueryError::LengthMismatch`] if the slices differ in length.
    pub fn insert_statement(&self, columns: &[&str], values: &[SqlValue]) -> Result<Statement> {
        Ok(Insert::into_table(&self.table).row(columns, values)?.build())
    }

    /// Runs the current request, then resets the session.
    ///
    /// Predicate, joins, projections, grouping, limits, and ordering are all
    /// cleared, whether or not the query succeeded.
    ///
    /// # Errors
    ///
    /// Compile errors, or the collaborator's error unchanged.
    pub fn get<Q: Queryable>(&mut self, db: &mut Q) -> std::result::Result<Q::Rows, Q::Error> {
        let result = self.preserve_query_state_and_get(db);
        self.reset();
        result
    }

    /// Runs the current request and keeps all state for the next call.
    ///
    /// # Errors
    ///
    /// Compile errors, or the collaborator's error unchanged.
    pub fn preserve_query_state_and_get<Q: Queryable>(
        &self,
        db: &mut Q,
    ) -> std::result::Result<Q::Rows, Q::Error> {
        let statement = self.select_statement()?;
        debug!(sql = %statement.sql, params = statement.params.len(), "running query");
        db.query(&statement)
    }

    /// Inserts one row into the base table.
    ///
    /// # Errors
    ///
    /// Compile errors, or the collaborator's error unchanged.
    pub fn insert<Q: Queryable>(
        &self,
        db: &mut Q,
        columns: &[&str],
        values: &[SqlValue],
    ) -> std::result::Result<u64, Q::Error> {
        let statement = self.insert_statement(columns, values)?;
        debug!(sql = %statement.sql, "running insert");
        db.execute(&statement)
    }

    /// Switches to mutation mode.
    ///
    /// The selection, joins, limit and offset carry over; ordering is dropped.
    /// The session is reset afterwards.
    pub fn set(&mut self) -> Mutation {
        let mutation = Mutation {
            graph: self.graph.clone(),
            selection: self.selection(),
            limit: self.limit,
            offset: self.offset,
        };
        self.reset();
        mutation
    }

    /// Clears everything but the base table.
    pub fn reset(&mut self) {
        *self = Self::new(&self.table);
    }
}

/// An UPDATE or DELETE over the rows a session selected.
#[derive(Debug, Clone)]
pub struct Mutation {
    graph: JoinGraph,
    selection: Selection,
    limit: u64,
    offset: u64,
}

impl Mutation {
    fn correct(&self, shape: QueryShape) -> CorrectedQuery {
        let shape = shape
            .joins(self.graph.clone())
            .selection(self.selection.clone())
            .limit(self.limit)
            .offset(self.offset);
        DialectCorrector::new().correct(&shape)
    }

    /// Compiles the UPDATE.
    ///
    /// # Errors
    ///
    /// Fails with [`QueryError::LengthMismatch`] if the slices differ in length.
    pub fn update_statement(&self, columns: &[&str], values: &[SqlValue]) -> Result<Statement> {
        let corrected = self.correct(QueryShape::update(self.graph.base()));
        Ok(Update::new(&corrected).set(columns, values)?.build())
    }

    /// Compiles the DELETE.
    #[must_use]
    pub fn delete_statement(&self) -> Statement {
        let corrected = self.correct(QueryShape::delete(self.graph.base()));
        Delete::new(&corrected).build()
    }

    /// Runs the UPDATE, returning the affected row count.
    ///
    /// # Errors
    ///
    /// Compile errors, or the collaborator's error unchanged.
    pub fn update<Q: Queryable>(
        &self,
        db: &mut Q,
        columns: &[&str],
        values: &[SqlValue],
    ) -> std::result::Result<u64, Q::Error> {
        let statement = self.update_statement(columns, values)?;
        debug!(sql = %statement.sql, "running update");
        db.execute(&statement)
    }

    /// Runs the DELETE, returning the affected row count.
    ///
    /// # Errors
    ///
    /// The collaborator's error unchanged.
    pub fn delete<Q: Queryable>(&self, db: &mut Q) -> std::result::Result<u64, Q::Error> {
        let statement = self.delete_statement();
        debug!(sql = %statement.sql, "running delete");
        db.execute(&statement)
    }
}
