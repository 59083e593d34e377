//! SQL text assembly.
//!
//! Stateless templating of SELECT, INSERT, UPDATE and DELETE text from the
//! fragments produced by [`crate::corrector::DialectCorrector`]. Values never
//! appear in the text; each `?` is matched by one entry of
//! [`Statement::params`].
//!
//! # Example
//!
//! ```rust
//! use quarry_core::builder::Select;
//! use quarry_core::corrector::{DialectCorrector, QueryShape};
//!
//! let corrected = DialectCorrector::new().correct(&QueryShape::select("users").limit(5).offset(10));
//! let stmt = Select::new(&corrected).build().unwrap();
//!
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT * FROM users ORDER BY users.rowid ASC LIMIT 5 OFFSET 10"
//! );
//! ```

mod delete;
mod insert;
mod select;
mod update;

use std::fmt;

pub use delete::Delete;
pub use insert::{Insert, IMMUTABLE_COLUMNS};
pub use select::Select;
pub use update::Update;

/// A finished SQL statement and its positional parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    /// The SQL text.
    pub sql: String,
    /// Bind parameters, in placeholder order.
    pub params: Vec<String>,
}

impl Statement {
    /// Creates a statement.
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Creates a statement without parameters.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}
