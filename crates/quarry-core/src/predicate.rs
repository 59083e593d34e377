//! WHERE-clause accumulation.
//!
//! A [`PredicateBuilder`] records an append-only list of [`PredicateNode`]s and
//! renders them into a [`Selection`] only when asked. Chaining is strictly
//! left-associative: every conjunction wraps everything accumulated so far in
//! parentheses before the next comparison is appended, so
//! `a AND b OR c` renders as `((a) AND b) OR c`.

use std::fmt;

use crate::value::{ToSqlValue, TRUE_VALUE};

/// Name of the boolean flag column used by [`PredicateBuilder::deleted`].
pub const DELETED_COLUMN: &str = "deleted";

/// Creates a table-qualified column reference.
#[must_use]
pub fn col(table: &str, name: &str) -> Column {
    Column {
        table: String::from(table),
        name: String::from(name),
    }
}

/// A table-qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    /// Table the column belongs to.
    pub table: String,
    /// Column name.
    pub name: String,
}

impl Column {
    /// Returns the SQL representation (`table.column`).
    #[must_use]
    pub fn to_sql(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

impl From<(&str, &str)> for Column {
    fn from((table, name): (&str, &str)) -> Self {
        col(table, name)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Pattern match (LIKE)
    Like,
    /// IS NULL, takes no value
    IsNull,
    /// IS NOT NULL, takes no value
    IsNotNull,
}

impl CompareOp {
    /// Returns true if the operator binds a value.
    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Like => write!(f, "LIKE"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// Keyword joining two parts of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    /// AND
    And,
    /// OR
    Or,
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// A single `table.column <op> ?` comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Compared column.
    pub column: Column,
    /// Operator.
    pub op: CompareOp,
    /// Bound text, `None` for operators that take no value.
    pub value: Option<String>,
}

impl Comparison {
    fn to_sql(&self) -> String {
        if self.op.takes_value() {
            format!("{} {} ?", self.column.to_sql(), self.op)
        } else {
            format!("{} {}", self.column.to_sql(), self.op)
        }
    }
}

/// One element of an accumulated predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateNode {
    /// Appends a comparison.
    Compare(Comparison),
    /// Appends ` AND ` or ` OR `.
    Conjunction(Conjunction),
    /// Wraps everything rendered so far in parentheses.
    Group,
}

/// A finished WHERE clause and its positional arguments.
///
/// Argument *i* binds to the *i*-th `?` of the clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    where_clause: String,
    args: Vec<String>,
}

impl Selection {
    /// Creates a selection from raw parts.
    #[must_use]
    pub fn new(where_clause: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            where_clause: where_clause.into(),
            args,
        }
    }

    /// The WHERE clause text, without the `WHERE` keyword.
    #[must_use]
    pub fn where_clause(&self) -> &str {
        &self.where_clause
    }

    /// The positional arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns true if there is no condition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.where_clause.is_empty()
    }
}

/// Accumulates a WHERE expression from fluent comparison calls.
///
/// # Example
///
/// ```rust
/// use quarry_core::predicate::{col, PredicateBuilder};
///
/// let mut find = PredicateBuilder::new("users");
/// find.eq(col("users", "name"), "bob")
///     .or()
///     .gt(col("users", "age"), 18);
///
/// let selection = find.selection();
/// assert_eq!(selection.where_clause(), "(users.name = ?) OR users.age > ?");
/// assert_eq!(selection.args(), ["bob", "18"]);
/// ```
///
/// A comparison whose value is NULL or empty text is dropped without error.
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    table: String,
    nodes: Vec<PredicateNode>,
    pending: Option<Conjunction>,
}

impl PredicateBuilder {
    /// Creates an empty builder whose flag shorthands target `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            nodes: Vec::new(),
            pending: None,
        }
    }

    /// The accumulated nodes, in append order.
    #[must_use]
    pub fn nodes(&self) -> &[PredicateNode] {
        &self.nodes
    }

    /// Returns true if nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds `column = value`.
    pub fn eq(&mut self, column: impl Into<Column>, value: impl ToSqlValue) -> &mut Self {
        self.compare(column.into(), CompareOp::Eq, value)
    }

    /// Adds `column != value`.
    pub fn ne(&mut self, column: impl Into<Column>, value: impl ToSqlValue) -> &mut Self {
        self.compare(column.into(), CompareOp::Ne, value)
    }

    /// Adds `column < value`.
    pub fn lt(&mut self, column: impl Into<Column>, value: impl ToSqlValue) -> &mut Self {
        self.compare(column.into(), CompareOp::Lt, value)
    }

    /// Adds `column <= value`.
    pub fn lte(&mut self, column: impl Into<Column>, value: impl ToSqlValue) -> &mut Self {
        self.compare(column.into(), CompareOp::Lte, value)
    }

    /// Adds `column > value`.
    pub fn gt(&mut self, column: impl Into<Column>, value: impl ToSqlValue) -> &mut Self {
        self.compare(column.into(), CompareOp::Gt, value)
    }

    /// Adds `column >= value`.
    pub fn gte(&mut self, column: impl Into<Column>, value: impl ToSqlValue) -> &mut Self {
        self.compare(column.into(), CompareOp::Gte, value)
    }

    /// Adds `column LIKE pattern`.
    pub fn like(&mut self, column: impl Into<Column>, pattern: impl ToSqlValue) -> &mut Self {
        self.compare(column.into(), CompareOp::Like, pattern)
    }

    /// Adds `column IS NULL`.
    pub fn is_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.append(Comparison {
            column: column.into(),
            op: CompareOp::IsNull,
            value: None,
        })
    }

    /// Adds `column IS NOT NULL`.
    pub fn is_not_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.append(Comparison {
            column: column.into(),
            op: CompareOp::IsNotNull,
            value: None,
        })
    }

    /// Matches rows whose deleted flag is set.
    pub fn deleted(&mut self) -> &mut Self {
        let column = col(&self.table, DELETED_COLUMN);
        self.compare(column, CompareOp::Eq, TRUE_VALUE)
    }

    /// Matches rows whose deleted flag is not set.
    pub fn not_deleted(&mut self) -> &mut Self {
        let column = col(&self.table, DELETED_COLUMN);
        self.compare(column, CompareOp::Ne, TRUE_VALUE)
    }

    /// Starts a range: appends `column >= low` and returns the upper-bound step.
    pub fn between(&mut self, column: impl Into<Column>, low: impl ToSqlValue) -> Between<'_> {
        let column = column.into();
        let before = self.nodes.len();
        self.compare(column.clone(), CompareOp::Gte, low);
        let low_added = self.nodes.len() > before;
        Between {
            builder: self,
            column,
            low_added,
        }
    }

    /// Joins what follows with AND.
    pub fn and(&mut self) -> &mut Self {
        self.pending = Some(Conjunction::And);
        self
    }

    /// Joins what follows with OR.
    pub fn or(&mut self) -> &mut Self {
        self.pending = Some(Conjunction::Or);
        self
    }

    /// Renders the accumulated nodes.
    #[must_use]
    pub fn selection(&self) -> Selection {
        let mut where_clause = String::new();
        let mut args = Vec::new();

        for node in &self.nodes {
            match node {
                PredicateNode::Group => where_clause = format!("({where_clause})"),
                PredicateNode::Conjunction(conj) => {
                    where_clause.push(' ');
                    where_clause.push_str(&conj.to_string());
                    where_clause.push(' ');
                }
                PredicateNode::Compare(cmp) => {
                    where_clause.push_str(&cmp.to_sql());
                    if let Some(value) = &cmp.value {
                        args.push(value.clone());
                    }
                }
            }
        }

        Selection { where_clause, args }
    }

    fn compare(&mut self, column: Column, op: CompareOp, value: impl ToSqlValue) -> &mut Self {
        match value.to_sql_value().to_bind_text() {
            Some(text) => self.append(Comparison {
                column,
                op,
                value: Some(text),
            }),
            None => self,
        }
    }

    fn append(&mut self, comparison: Comparison) -> &mut Self {
        if !self.nodes.is_empty() {
            let conj = self.pending.take().unwrap_or(Conjunction::And);
            self.nodes.push(PredicateNode::Group);
            self.nodes.push(PredicateNode::Conjunction(conj));
        }
        self.nodes.push(PredicateNode::Compare(comparison));
        self
    }
}

/// Upper-bound step of [`PredicateBuilder::between`].
///
/// The upper bound is appended with a bare ` AND `, never regrouped, since the
/// two bounds always travel together.
#[derive(Debug)]
pub struct Between<'a> {
    builder: &'a mut PredicateBuilder,
    column: Column,
    low_added: bool,
}

impl<'a> Between<'a> {
    /// Closes the range with `column < high`.
    pub fn and(self, high: impl ToSqlValue) -> &'a mut PredicateBuilder {
        self.close(CompareOp::Lt, high)
    }

    /// Closes the range with `column <= high`.
    pub fn and_inclusive(self, high: impl ToSqlValue) -> &'a mut PredicateBuilder {
        self.close(CompareOp::Lte, high)
    }

    fn close(self, op: CompareOp, high: impl ToSqlValue) -> &'a mut PredicateBuilder {
        if !self.low_added {
            return self.builder.compare(self.column, op, high);
        }
        if let Some(text) = high.to_sql_value().to_bind_text() {
            let nodes = &mut self.builder.nodes;
            nodes.push(PredicateNode::Conjunction(Conjunction::And));
            nodes.push(PredicateNode::Compare(Comparison {
                column: self.column,
                op,
                value: Some(text),
            }));
        }
        self.builder
    }
}
