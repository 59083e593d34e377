//! # quarry-core
//!
//! Query building for SQLite-class engines: engines with no LIMIT/OFFSET on
//! UPDATE or DELETE and no joined mutations.
//!
//! This crate provides:
//! - A fluent predicate builder with strict left-to-right grouping
//! - Ordering, joins and projections composed through a query session
//! - A dialect corrector that rewrites limited mutations and "last N rows"
//!   requests into `rowid IN (subselect)` form
//! - Stateless SQL text assembly with positional bind parameters
//!
//! ## Building a query
//!
//! ```rust
//! use quarry_core::{col, QuerySession};
//!
//! let mut session = QuerySession::new("notes");
//! session.find().not_deleted().and().like(col("notes", "title"), "todo%");
//! session.last(5);
//!
//! let stmt = session.select_statement().unwrap();
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT * FROM notes WHERE notes.rowid IN (SELECT notes.rowid FROM notes \
//!      WHERE (notes.deleted != ?) AND notes.title LIKE ? ORDER BY notes.rowid DESC LIMIT 5) \
//!      ORDER BY notes.rowid ASC"
//! );
//! assert_eq!(stmt.params, ["1", "todo%"]);
//! ```
//!
//! Values are never interpolated into the SQL text.

pub mod builder;
pub mod corrector;
pub mod error;
pub mod join;
pub mod order;
pub mod predicate;
pub mod session;
pub mod value;

pub use builder::Statement;
pub use corrector::{CorrectedQuery, DialectCorrector, QueryShape, StatementKind};
pub use error::{QueryError, Result};
pub use join::{Join, JoinType, Projection};
pub use order::{Direction, OrderSpec};
pub use predicate::{col, Column, PredicateBuilder, Selection};
pub use session::{Mutation, QuerySession, Queryable};
pub use value::{SqlValue, ToSqlValue};
