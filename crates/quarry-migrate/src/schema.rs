//! Schema representation types.
//!
//! A [`TableSchema`] is the target shape a migration set drives a table
//! towards. Older authoring tools stored primary and foreign keys on the
//! columns themselves; those records are upgraded once, while deserializing,
//! so everything past the ingestion boundary sees keys on the table only.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use quarry_core::QueryError;

use crate::error::{MigrateError, Result};

/// SQL data types understood by the schema model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Text.
    Text,
    /// Boolean.
    Boolean,
    /// Date and time, stored as text in the fixed date format.
    DateTime,
    /// Floating point.
    Real,
    /// Decimal number.
    Numeric,
    /// Binary large object.
    Blob,
}

impl SqlType {
    /// Returns the SQL type name for SQLite.
    #[must_use]
    pub fn sqlite_name(&self) -> &'static str {
        match self {
            Self::Integer | Self::BigInt => "INTEGER",
            Self::Boolean => "INTEGER", // SQLite stores booleans as 0/1
            Self::Text | Self::DateTime => "TEXT",
            Self::Real => "REAL",
            Self::Numeric => "NUMERIC",
            Self::Blob => "BLOB",
        }
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            // Parenthesized so SQLite accepts any expression as a default.
            Self::Expression(expr) => Some(format!("({expr})")),
        }
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action.
    #[default]
    NoAction,
    /// Restrict.
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Generated accessor name, the column key under set version 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor: Option<String>,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default value.
    #[serde(default)]
    pub default: DefaultValue,
    /// Whether this column has a UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// Whether a non-unique index is kept on this column.
    #[serde(default)]
    pub index: bool,
    /// Whether the column takes part in text search.
    #[serde(default)]
    pub searchable: bool,
    /// Whether the column may be used for ordering.
    #[serde(default)]
    pub orderable: bool,
}

const fn default_nullable() -> bool {
    true
}

impl ColumnSchema {
    /// Creates a new nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            accessor: None,
            sql_type,
            nullable: true,
            default: DefaultValue::None,
            unique: false,
            index: false,
            searchable: false,
            orderable: false,
        }
    }

    /// Sets the accessor name.
    #[must_use]
    pub fn accessor(mut self, accessor: impl Into<String>) -> Self {
        self.accessor = Some(accessor.into());
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Sets the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Keeps a non-unique index on the column.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// Marks the column as searchable.
    #[must_use]
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Marks the column as orderable.
    #[must_use]
    pub fn orderable(mut self) -> Self {
        self.orderable = true;
        self
    }

    /// Returns true if `key` names this column or its accessor.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.name == key || self.accessor.as_deref() == Some(key)
    }
}

/// Schema definition for a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeySchema {
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column(s).
    pub references_columns: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

impl ForeignKeySchema {
    /// Creates a single-column foreign key.
    #[must_use]
    pub fn new(column: &str, references_table: &str, references_column: &str) -> Self {
        Self {
            columns: vec![String::from(column)],
            references_table: String::from(references_table),
            references_columns: vec![String::from(references_column)],
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }
}

/// Sort order of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Returns the SQL keyword.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name.
    pub name: String,
    /// Whether this is a unique index.
    pub unique: bool,
    /// Indexed columns with their sort order, in key order.
    pub columns: Vec<(String, SortOrder)>,
}

impl IndexSchema {
    /// Builds a unique index from parallel column and sort-order slices.
    ///
    /// # Errors
    ///
    /// Fails if the slices differ in length.
    pub fn unique_index(name: &str, columns: &[&str], orders: &[SortOrder]) -> Result<Self> {
        Self::build(name, true, columns, orders)
    }

    /// Builds a non-unique index from parallel column and sort-order slices.
    ///
    /// # Errors
    ///
    /// Fails if the slices differ in length.
    pub fn non_unique_index(name: &str, columns: &[&str], orders: &[SortOrder]) -> Result<Self> {
        Self::build(name, false, columns, orders)
    }

    /// Builds a single ascending column index.
    #[must_use]
    pub fn on_column(name: &str, column: &str, unique: bool) -> Self {
        Self {
            name: String::from(name),
            unique,
            columns: vec![(String::from(column), SortOrder::Asc)],
        }
    }

    fn build(name: &str, unique: bool, columns: &[&str], orders: &[SortOrder]) -> Result<Self> {
        if columns.len() != orders.len() {
            return Err(QueryError::LengthMismatch {
                what: "index columns/sort orders",
                left: columns.len(),
                right: orders.len(),
            }
            .into());
        }
        Ok(Self {
            name: String::from(name),
            unique,
            columns: columns
                .iter()
                .zip(orders)
                .map(|(c, o)| (String::from(*c), *o))
                .collect(),
        })
    }
}

/// Complete schema definition for a table.
///
/// Deserialization accepts both the current shape and the legacy one with
/// `primary_key` / `foreign_key` on individual columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTableSchema")]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Column definitions.
    pub columns: Vec<ColumnSchema>,
    /// Primary key column(s).
    pub primary_key: Vec<String>,
    /// Foreign key definitions.
    pub foreign_keys: Vec<ForeignKeySchema>,
    /// Index definitions.
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    /// Creates a new table schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| String::from(*c)).collect();
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeySchema) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    /// Column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Looks up a column by name or accessor.
    ///
    /// # Errors
    ///
    /// Fails with [`MigrateError::UnknownColumn`] naming the known columns.
    pub fn find_column(&self, key: &str) -> Result<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.matches(key))
            .ok_or_else(|| MigrateError::UnknownColumn {
                table: self.name.clone(),
                column: String::from(key),
                known: self.column_names(),
            })
    }

    /// Looks up a declared index by name.
    #[must_use]
    pub fn find_index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Returns true if the column is part of the primary key.
    #[must_use]
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|c| c == column)
    }

    /// Returns true if the column is part of a foreign key.
    #[must_use]
    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.columns.iter().any(|c| c == column))
    }

    /// Returns true if CREATE TABLE alone establishes every constraint the
    /// column carries (primary key, foreign key, or UNIQUE).
    #[must_use]
    pub fn is_constrained(&self, column: &ColumnSchema) -> bool {
        column.unique || self.is_primary_key(&column.name) || self.is_foreign_key(&column.name)
    }

    /// Indexes recreated with the table: declared ones, then per-column ones.
    #[must_use]
    pub fn all_indexes(&self) -> Vec<IndexSchema> {
        let mut indexes = self.indexes.clone();
        for column in self.columns.iter().filter(|c| c.index) {
            let name = column_index_name(&self.name, &column.name);
            if !indexes.iter().any(|i| i.name == name) {
                indexes.push(IndexSchema::on_column(&name, &column.name, false));
            }
        }
        indexes
    }

    /// This table without the named columns or any declared index over them.
    #[must_use]
    pub fn without_columns(&self, names: &BTreeSet<String>) -> Self {
        Self {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| !names.contains(&c.name))
                .cloned()
                .collect(),
            primary_key: self.primary_key.clone(),
            foreign_keys: self.foreign_keys.clone(),
            indexes: self
                .indexes
                .iter()
                .filter(|i| !i.columns.iter().any(|(c, _)| names.contains(c)))
                .cloned()
                .collect(),
        }
    }
}

/// Name of the index kept for a single column.
#[must_use]
pub fn column_index_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_idx")
}

/// Name of the unique index added for a single column.
#[must_use]
pub fn unique_index_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_unique")
}

/// Legacy per-column foreign key: the column references `table.column`.
#[derive(Debug, Clone, Deserialize)]
struct LegacyForeignKey {
    table: String,
    column: String,
    #[serde(default)]
    on_delete: ForeignKeyAction,
    #[serde(default)]
    on_update: ForeignKeyAction,
}

#[derive(Debug, Clone, Deserialize)]
struct RawColumn {
    #[serde(flatten)]
    column: ColumnSchema,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    foreign_key: Option<LegacyForeignKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTableSchema {
    name: String,
    columns: Vec<RawColumn>,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKeySchema>,
    #[serde(default)]
    indexes: Vec<IndexSchema>,
}

impl From<RawTableSchema> for TableSchema {
    fn from(raw: RawTableSchema) -> Self {
        let mut primary_key = raw.primary_key;
        let mut foreign_keys = raw.foreign_keys;
        let mut columns = Vec::with_capacity(raw.columns.len());

        for raw_column in raw.columns {
            let name = raw_column.column.name.clone();
            if raw_column.primary_key && !primary_key.contains(&name) {
                primary_key.push(name.clone());
            }
            if let Some(legacy) = raw_column.foreign_key {
                let fk = ForeignKeySchema {
                    columns: vec![name],
                    references_table: legacy.table,
                    references_columns: vec![legacy.column],
                    on_delete: legacy.on_delete,
                    on_update: legacy.on_update,
                };
                if !foreign_keys.contains(&fk) {
                    foreign_keys.push(fk);
                }
            }
            columns.push(raw_column.column);
        }

        Self {
            name: raw.name,
            columns,
            primary_key,
            foreign_keys,
            indexes: raw.indexes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableSchema {
        TableSchema::new("users")
            .column(ColumnSchema::new("id", SqlType::BigInt).not_null())
            .column(ColumnSchema::new("email", SqlType::Text).unique().accessor("getEmail"))
            .column(ColumnSchema::new("team_id", SqlType::BigInt).indexed())
            .column(ColumnSchema::new("bio", SqlType::Text))
            .primary_key(&["id"])
            .foreign_key(ForeignKeySchema::new("team_id", "teams", "id"))
    }

    #[test]
    fn test_index_builders_pair_columns_with_orders() {
        let index =
            IndexSchema::unique_index("by_name", &["last", "first"], &[SortOrder::Asc, SortOrder::Desc])
                .unwrap();
        assert!(index.unique);
        assert_eq!(
            index.columns,
            vec![
                ("last".to_string(), SortOrder::Asc),
                ("first".to_string(), SortOrder::Desc)
            ]
        );

        let index = IndexSchema::non_unique_index("by_age", &["age"], &[SortOrder::Desc]).unwrap();
        assert!(!index.unique);
        assert_eq!(index.columns.len(), 1);
    }

    #[test]
    fn test_index_builders_reject_mismatch() {
        let err = IndexSchema::non_unique_index("i", &["a", "b"], &[SortOrder::Asc]).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Query(QueryError::LengthMismatch {
                left: 2,
                right: 1,
                ..
            })
        ));
        assert!(IndexSchema::unique_index("i", &["a"], &[]).is_err());
    }

    #[test]
    fn test_find_column_by_name_or_accessor() {
        let table = users();
        assert_eq!(table.find_column("email").unwrap().name, "email");
        assert_eq!(table.find_column("getEmail").unwrap().name, "email");
    }

    #[test]
    fn test_find_column_names_known_columns() {
        let err = users().find_column("mail").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown column 'mail' in table 'users', known columns: [id, email, team_id, bio]"
        );
    }

    #[test]
    fn test_is_constrained() {
        let table = users();
        let constrained: Vec<bool> = table
            .columns
            .iter()
            .map(|c| table.is_constrained(c))
            .collect();
        assert_eq!(constrained, vec![true, true, true, false]);
    }

    #[test]
    fn test_all_indexes_include_column_flags() {
        let indexes = users().all_indexes();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "users_team_id_idx");
        assert!(!indexes[0].unique);
    }

    #[test]
    fn test_without_columns() {
        let table = users()
            .column(ColumnSchema::new("note", SqlType::Text).indexed())
            .index(IndexSchema::unique_index("by_note", &["note"], &[SortOrder::Asc]).unwrap());
        let trimmed = table.without_columns(&BTreeSet::from([String::from("note")]));
        assert!(!trimmed.column_names().contains(&String::from("note")));
        assert!(trimmed.find_index("by_note").is_none());
        assert!(trimmed.all_indexes().iter().all(|i| i.name != "users_note_idx"));
        assert_eq!(trimmed.primary_key, table.primary_key);
    }

    #[test]
    fn test_default_value_to_sql() {
        assert_eq!(DefaultValue::None.to_sql(), None);
        assert_eq!(DefaultValue::Bool(true).to_sql(), Some("1".to_string()));
        assert_eq!(
            DefaultValue::String("it's".to_string()).to_sql(),
            Some("'it''s'".to_string())
        );
        assert_eq!(
            DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()).to_sql(),
            Some("(CURRENT_TIMESTAMP)".to_string())
        );
    }

    #[test]
    fn test_legacy_keys_are_promoted_to_table() {
        let json = r#"{
            "name": "posts",
            "columns": [
                {"name": "id", "sql_type": "BigInt", "primary_key": true},
                {"name": "author_id", "sql_type": "BigInt",
                 "foreign_key": {"table": "users", "column": "id", "on_delete": "Cascade"}},
                {"name": "title", "sql_type": "Text", "nullable": false}
            ]
        }"#;
        let table: TableSchema = serde_json::from_str(json).unwrap();
        assert_eq!(table.primary_key, vec!["id"]);
        assert_eq!(
            table.foreign_keys,
            vec![ForeignKeySchema::new("author_id", "users", "id")
                .on_delete(ForeignKeyAction::Cascade)]
        );
        assert!(!table.columns[2].nullable);
        assert!(table.columns[0].nullable);
    }

    #[test]
    fn test_canonical_shape_round_trips() {
        let table = users();
        let json = serde_json::to_string(&table).unwrap();
        let back: TableSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
