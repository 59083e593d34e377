//! ORDER BY accumulation.

use std::fmt;

use crate::error::{ensure_same_len, Result};
use crate::predicate::{col, Column};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// Parses an `ASC`/`DESC` keyword, ignoring case.
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("ASC") {
            Some(Self::Asc)
        } else if word.eq_ignore_ascii_case("DESC") {
            Some(Self::Desc)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    /// Sorted column.
    pub column: Column,
    /// Direction.
    pub direction: Direction,
}

impl Ordering {
    /// Returns the SQL representation (`table.column DIR`).
    #[must_use]
    pub fn to_sql(&self) -> String {
        format!("{} {}", self.column.to_sql(), self.direction)
    }
}

/// An ordered list of sort keys, primary key first.
///
/// Repeated columns are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec {
    entries: Vec<Ordering>,
}

impl OrderSpec {
    /// Creates an empty order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an order over `table` from parallel column and direction slices.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::QueryError::LengthMismatch`] if the slices differ in length.
    pub fn from_columns(table: &str, columns: &[&str], directions: &[Direction]) -> Result<Self> {
        ensure_same_len("columns/directions", columns.len(), directions.len())?;
        let mut spec = Self::new();
        for (column, direction) in columns.iter().zip(directions) {
            spec.by(col(table, column), *direction);
        }
        Ok(spec)
    }

    /// Appends an ascending key.
    pub fn asc(&mut self, column: impl Into<Column>) -> &mut Self {
        self.by(column, Direction::Asc)
    }

    /// Appends a descending key.
    pub fn desc(&mut self, column: impl Into<Column>) -> &mut Self {
        self.by(column, Direction::Desc)
    }

    /// Appends a key with an explicit direction.
    pub fn by(&mut self, column: impl Into<Column>, direction: Direction) -> &mut Self {
        self.entries.push(Ordering {
            column: column.into(),
            direction,
        });
        self
    }

    /// The keys in priority order.
    #[must_use]
    pub fn entries(&self) -> &[Ordering] {
        &self.entries
    }

    /// Returns true if no key was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the keys joined with `", "`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.entries
            .iter()
            .map(Ordering::to_sql)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
