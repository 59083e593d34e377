//! Schema migrations compiled to SQLite DDL.
//!
//! `quarry-migrate` takes a batch of schema migrations and the schema they
//! lead to, and emits the SQL that applies them:
//! - Migrations are applied in a deterministic total order, table creation
//!   first and table drops last
//! - Changes SQLite cannot make in place are applied by recreating the table
//! - Migrations already satisfied by a fresh CREATE TABLE are skipped
//!
//! The compiler performs no I/O; executing the statements (in one
//! transaction) is up to the caller.
//!
//! # Architecture
//!
//! - **Schema** - `TableSchema` and friends, with legacy key upgrade on load
//! - **Migration** - `Migration`, `MigrationType` priorities, `MigrationSet`
//! - **Diff** - `SchemaDiff` records and their lowering into migrations
//! - **Compiler** - ordering, deduplication and per-type SQL generation
//! - **Dialect** - SQLite DDL text
//!
//! # Example
//!
//! ```rust
//! use quarry_migrate::prelude::*;
//!
//! let users = TableSchema::new("users")
//!     .column(ColumnSchema::new("id", SqlType::BigInt).not_null())
//!     .column(ColumnSchema::new("email", SqlType::Text).unique())
//!     .primary_key(&["id"]);
//!
//! let set = MigrationSet::from_migrations(
//!     vec![
//!         Migration::table(MigrationType::CreateTable, "users"),
//!         Migration::column(MigrationType::AlterTableAddColumn, "users", "email"),
//!     ],
//!     vec![users],
//!     1,
//! );
//!
//! let statements = MigrationCompiler::new(JsonSchemaSerializer::new())
//!     .compile(&set)
//!     .unwrap();
//! assert_eq!(statements.len(), 1);
//! assert_eq!(
//!     statements[0].sql,
//!     "CREATE TABLE \"users\" (\"id\" INTEGER NOT NULL, \"email\" TEXT UNIQUE, PRIMARY KEY (\"id\"))"
//! );
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Print the SQL for a serialized migration set
//! quarry-migrate --input set.json sql
//!
//! # Show the sorted migrations and which ones are skipped
//! quarry-migrate --input set.json plan
//! ```

pub mod compiler;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod migration;
pub mod schema;
pub mod serializer;

pub use compiler::{MigrationCompiler, PlanStep};
pub use error::{MigrateError, Result};
pub use migration::{Migration, MigrationSet, MigrationType, SetVersion};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::compiler::{MigrationCompiler, PlanStep};
    pub use crate::dialect::{MigrationDialect, SqliteDialect};
    pub use crate::diff::{ChangeFlags, ChangeKind, DiffCategory, SchemaDiff};
    pub use crate::error::{MigrateError, Result};
    pub use crate::migration::{
        Migration, MigrationSet, MigrationType, SetVersion, PREVIOUS_COLUMNS,
        PREVIOUS_FOREIGN_KEYS,
    };
    pub use crate::schema::{
        ColumnSchema, DefaultValue, ForeignKeyAction, ForeignKeySchema, IndexSchema, SortOrder,
        SqlType, TableSchema,
    };
    pub use crate::serializer::{load_migration_set, JsonSchemaSerializer, SchemaSerializer};
}
