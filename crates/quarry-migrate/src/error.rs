//! Error types for migration compilation.

use quarry_core::QueryError;

use crate::diff::{ChangeFlags, ChangeKind, DiffCategory};
use crate::migration::MigrationType;

/// Errors that can occur while loading or compiling a migration set.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A migration set must be built from exactly one source.
    #[error("Migration set needs exactly one of ordered migrations or a diff map")]
    ConflictingSources,

    /// A migration names a table missing from the target schema.
    #[error("Unknown table '{table}', known tables: [{}]", .known.join(", "))]
    UnknownTable {
        /// The table that was referenced.
        table: String,
        /// The tables in the target schema.
        known: Vec<String>,
    },

    /// A migration names a column missing from its table.
    #[error("Unknown column '{column}' in table '{table}', known columns: [{}]", .known.join(", "))]
    UnknownColumn {
        /// Table searched.
        table: String,
        /// The column that was referenced.
        column: String,
        /// The columns of the table.
        known: Vec<String>,
    },

    /// An index migration names neither an index nor a column.
    #[error("Unknown index '{index}' on table '{table}'")]
    UnknownIndex {
        /// Table searched.
        table: String,
        /// The index or column name.
        index: String,
    },

    /// A column-level migration carries no column name.
    #[error("{kind:?} migration on table '{table}' has no column name")]
    MissingColumnName {
        /// Migration type.
        kind: MigrationType,
        /// Table name.
        table: String,
    },

    /// A schema diff that no migration type can express.
    #[error("Unsupported schema diff: {category:?} {kind:?}")]
    UnsupportedDiff {
        /// Diff category.
        category: DiffCategory,
        /// Diff kind.
        kind: ChangeKind,
    },

    /// A diff whose sub-type flags contradict its kind.
    #[error("Schema diff of kind {kind:?} has sub-type {sub_type}")]
    InvalidDiffSubType {
        /// Diff kind.
        kind: ChangeKind,
        /// The offending sub-type.
        sub_type: ChangeFlags,
    },

    /// Set versions other than 1 and 2 are not understood.
    #[error("Invalid migration set version: {0}")]
    InvalidSetVersion(u8),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (reading migration set files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generated query fragment was rejected.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
