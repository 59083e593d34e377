//! Database dialect implementations.
//!
//! A dialect turns schema records into DDL text. Only SQLite is provided; the
//! trait marks where another engine would plug in.

mod sqlite;

pub use sqlite::SqliteDialect;

use crate::schema::{ColumnSchema, IndexSchema, SqlType, TableSchema};

/// Trait for database-specific DDL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Generates `CREATE TABLE` for the full target shape of a table.
    fn create_table_sql(&self, table: &TableSchema) -> String;

    /// Generates `CREATE TABLE name AS <select>`.
    fn create_table_as_sql(&self, name: &str, select: &str) -> String;

    /// Generates `DROP TABLE`.
    fn drop_table_sql(&self, name: &str) -> String;

    /// Generates a table rename.
    fn rename_table_sql(&self, old_name: &str, new_name: &str) -> String;

    /// Generates `ALTER TABLE .. ADD COLUMN`.
    fn add_column_sql(&self, table: &str, column: &ColumnSchema) -> String;

    /// Generates `CREATE [UNIQUE] INDEX`.
    fn create_index_sql(&self, table: &str, index: &IndexSchema) -> String;

    /// Generates a column definition, with an inline UNIQUE when asked.
    fn column_definition(&self, column: &ColumnSchema, inline_unique: bool) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type),
        ];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if inline_unique && column.unique {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default_sql) = column.default.to_sql() {
            parts.push(format!("DEFAULT {default_sql}"));
        }

        parts.join(" ")
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
