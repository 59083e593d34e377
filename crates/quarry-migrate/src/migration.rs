//! Migration records and migration sets.
//!
//! A [`Migration`] names one schema change on one table. Migrations carry a
//! total order (see [`Migration::cmp`]) that puts table creation before any
//! column or index change on it, and table drops last.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::{lower_diffs, SchemaDiff};
use crate::error::{MigrateError, Result};
use crate::schema::TableSchema;

/// Extras key holding the serialized column list of a table before the migration.
pub const PREVIOUS_COLUMNS: &str = "previous_columns";

/// Extras key holding the serialized foreign keys of a table before the migration.
pub const PREVIOUS_FOREIGN_KEYS: &str = "previous_foreign_keys";

/// The kinds of schema change a migration can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationType {
    /// Create a table from its target schema.
    CreateTable,
    /// Change the primary key (table recreation).
    UpdatePrimaryKey,
    /// Change the foreign keys (table recreation).
    UpdateForeignKeys,
    /// Change a column default (table recreation).
    ChangeDefaultValue,
    /// Add a column.
    AlterTableAddColumn,
    /// Add a column that carries a UNIQUE constraint.
    AlterTableAddUnique,
    /// Legacy per-column foreign key reference.
    AddForeignKeyReference,
    /// Create a unique index.
    AddUniqueIndex,
    /// Create an index.
    AddIndex,
    /// Make an existing column unique.
    MakeColumnUnique,
    /// Snapshot an existing table into a new one.
    CreateTempTableFromExisting,
    /// Drop a table.
    DropTable,
}

impl MigrationType {
    /// Every migration type.
    pub const ALL: [Self; 12] = [
        Self::CreateTable,
        Self::UpdatePrimaryKey,
        Self::UpdateForeignKeys,
        Self::ChangeDefaultValue,
        Self::AlterTableAddColumn,
        Self::AlterTableAddUnique,
        Self::AddForeignKeyReference,
        Self::AddUniqueIndex,
        Self::AddIndex,
        Self::MakeColumnUnique,
        Self::CreateTempTableFromExisting,
        Self::DropTable,
    ];

    /// Application priority, lowest first. Not unique across types.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::CreateTable => 0,
            Self::UpdatePrimaryKey | Self::UpdateForeignKeys => 5,
            Self::ChangeDefaultValue => 6,
            Self::AlterTableAddColumn | Self::AlterTableAddUnique => 10,
            Self::AddForeignKeyReference => 19,
            Self::AddUniqueIndex | Self::AddIndex | Self::MakeColumnUnique => 30,
            Self::CreateTempTableFromExisting => 40,
            Self::DropTable => 100,
        }
    }

    /// Returns true for migrations that act on a whole table.
    ///
    /// These sort by table name within a priority; the others by column name.
    #[must_use]
    pub const fn is_table_migration(self) -> bool {
        matches!(
            self,
            Self::CreateTable
                | Self::DropTable
                | Self::CreateTempTableFromExisting
                | Self::UpdatePrimaryKey
                | Self::UpdateForeignKeys
        )
    }

    /// Returns true for migrations applied by recreating the table.
    ///
    /// A legacy foreign key reference only recreates when no earlier CREATE
    /// TABLE in the same run already covered it.
    #[must_use]
    pub const fn recreates_table(self) -> bool {
        matches!(
            self,
            Self::UpdatePrimaryKey
                | Self::UpdateForeignKeys
                | Self::ChangeDefaultValue
                | Self::AddForeignKeyReference
        )
    }

    /// The serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateTable => "CREATE_TABLE",
            Self::UpdatePrimaryKey => "UPDATE_PRIMARY_KEY",
            Self::UpdateForeignKeys => "UPDATE_FOREIGN_KEYS",
            Self::ChangeDefaultValue => "CHANGE_DEFAULT_VALUE",
            Self::AlterTableAddColumn => "ALTER_TABLE_ADD_COLUMN",
            Self::AlterTableAddUnique => "ALTER_TABLE_ADD_UNIQUE",
            Self::AddForeignKeyReference => "ADD_FOREIGN_KEY_REFERENCE",
            Self::AddUniqueIndex => "ADD_UNIQUE_INDEX",
            Self::AddIndex => "ADD_INDEX",
            Self::MakeColumnUnique => "MAKE_COLUMN_UNIQUE",
            Self::CreateTempTableFromExisting => "CREATE_TEMP_TABLE_FROM_EXISTING",
            Self::DropTable => "DROP_TABLE",
        }
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// What kind of change.
    #[serde(rename = "type")]
    pub kind: MigrationType,
    /// Affected table.
    pub table_name: String,
    /// Affected column or index, for column-level migrations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    /// Additional serialized data, keyed by the `PREVIOUS_*` constants.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl Migration {
    /// Creates a table-level migration.
    #[must_use]
    pub fn table(kind: MigrationType, table: &str) -> Self {
        Self {
            kind,
            table_name: String::from(table),
            column_name: None,
            extras: BTreeMap::new(),
        }
    }

    /// Creates a column-level migration.
    #[must_use]
    pub fn column(kind: MigrationType, table: &str, column: &str) -> Self {
        Self {
            column_name: Some(String::from(column)),
            ..Self::table(kind, table)
        }
    }

    /// Adds an extra.
    #[must_use]
    pub fn extra(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extras.insert(String::from(key), value.into());
        self
    }

    /// The column name, required for column-level migrations.
    ///
    /// # Errors
    ///
    /// Fails with [`MigrateError::MissingColumnName`] if none was recorded.
    pub fn require_column(&self) -> Result<&str> {
        self.column_name
            .as_deref()
            .ok_or_else(|| MigrateError::MissingColumnName {
                kind: self.kind,
                table: self.table_name.clone(),
            })
    }

    fn sort_names(&self) -> (&str, &str) {
        let column = self.column_name.as_deref().unwrap_or("");
        if self.kind.is_table_migration() {
            (&self.table_name, column)
        } else {
            (column, &self.table_name)
        }
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column_name {
            Some(column) => write!(f, "{} {}.{}", self.kind, self.table_name, column),
            None => write!(f, "{} {}", self.kind, self.table_name),
        }
    }
}

impl Ord for Migration {
    /// Priority first, then table name for table migrations or column name
    /// for the rest. Remaining ties fall back to the other name, the type
    /// name, and the extras, so equal migrations are the only ties.
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .priority()
            .cmp(&other.kind.priority())
            .then_with(|| self.sort_names().cmp(&other.sort_names()))
            .then_with(|| self.kind.as_str().cmp(other.kind.as_str()))
            .then_with(|| self.extras.cmp(&other.extras))
    }
}

impl PartialOrd for Migration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Key scheme of a migration set.
///
/// Version 1 keys tables and columns by name; version 2 keys tables by the
/// generated class name and columns by accessor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SetVersion {
    /// Keys are table and column names.
    #[default]
    V1,
    /// Keys are class and accessor names.
    V2,
}

impl TryFrom<u8> for SetVersion {
    type Error = MigrateError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(MigrateError::InvalidSetVersion(other)),
        }
    }
}

impl From<SetVersion> for u8 {
    fn from(version: SetVersion) -> Self {
        match version {
            SetVersion::V1 => 1,
            SetVersion::V2 => 2,
        }
    }
}

/// A batch of migrations and the schema they lead to.
///
/// Holds exactly one source: an ordered migration list, or a per-table map
/// of schema diffs that is lowered into migrations on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMigrationSet")]
pub struct MigrationSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    ordered_migrations: Option<Vec<Migration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff_map: Option<BTreeMap<String, Vec<SchemaDiff>>>,
    target_schema: BTreeMap<String, TableSchema>,
    db_version: u32,
    set_version: SetVersion,
}

impl MigrationSet {
    /// Creates a set from its parts.
    ///
    /// # Errors
    ///
    /// Fails with [`MigrateError::ConflictingSources`] unless exactly one of
    /// `ordered_migrations` and `diff_map` is given.
    pub fn new(
        ordered_migrations: Option<Vec<Migration>>,
        diff_map: Option<BTreeMap<String, Vec<SchemaDiff>>>,
        target_schema: BTreeMap<String, TableSchema>,
        db_version: u32,
        set_version: SetVersion,
    ) -> Result<Self> {
        if ordered_migrations.is_some() == diff_map.is_some() {
            return Err(MigrateError::ConflictingSources);
        }
        Ok(Self {
            ordered_migrations,
            diff_map,
            target_schema,
            db_version,
            set_version,
        })
    }

    /// Creates a version 1 set from a migration list, keying tables by name.
    #[must_use]
    pub fn from_migrations(
        migrations: Vec<Migration>,
        tables: Vec<TableSchema>,
        db_version: u32,
    ) -> Self {
        Self {
            ordered_migrations: Some(migrations),
            diff_map: None,
            target_schema: key_by_name(tables),
            db_version,
            set_version: SetVersion::V1,
        }
    }

    /// Creates a version 1 set from a diff map, keying tables by name.
    #[must_use]
    pub fn from_diffs(
        diffs: BTreeMap<String, Vec<SchemaDiff>>,
        tables: Vec<TableSchema>,
        db_version: u32,
    ) -> Self {
        Self {
            ordered_migrations: None,
            diff_map: Some(diffs),
            target_schema: key_by_name(tables),
            db_version,
            set_version: SetVersion::V1,
        }
    }

    /// The database version this set migrates to.
    #[must_use]
    pub fn db_version(&self) -> u32 {
        self.db_version
    }

    /// The key scheme.
    #[must_use]
    pub fn set_version(&self) -> SetVersion {
        self.set_version
    }

    /// The target schema, by table key.
    #[must_use]
    pub fn target_schema(&self) -> &BTreeMap<String, TableSchema> {
        &self.target_schema
    }

    /// The migrations of this set, lowering the diff map if that is the source.
    ///
    /// # Errors
    ///
    /// Fails if a diff has no migration equivalent or names an unknown table.
    pub fn migrations(&self) -> Result<Vec<Migration>> {
        match (&self.ordered_migrations, &self.diff_map) {
            (Some(migrations), _) => Ok(migrations.clone()),
            (None, Some(diffs)) => lower_diffs(self, diffs),
            (None, None) => Err(MigrateError::ConflictingSources),
        }
    }

    /// Looks up a table by key, falling back to the schema's table name.
    ///
    /// # Errors
    ///
    /// Fails with [`MigrateError::UnknownTable`] naming the known keys.
    pub fn table(&self, key: &str) -> Result<&TableSchema> {
        self.target_schema
            .get(key)
            .or_else(|| self.target_schema.values().find(|t| t.name == key))
            .ok_or_else(|| MigrateError::UnknownTable {
                table: String::from(key),
                known: self.target_schema.keys().cloned().collect(),
            })
    }
}

fn key_by_name(tables: Vec<TableSchema>) -> BTreeMap<String, TableSchema> {
    tables.into_iter().map(|t| (t.name.clone(), t)).collect()
}

#[derive(Debug, Deserialize)]
struct RawMigrationSet {
    #[serde(default)]
    ordered_migrations: Option<Vec<Migration>>,
    #[serde(default)]
    diff_map: Option<BTreeMap<String, Vec<SchemaDiff>>>,
    #[serde(default)]
    target_schema: BTreeMap<String, TableSchema>,
    #[serde(default)]
    db_version: u32,
    #[serde(default)]
    set_version: SetVersion,
}

impl TryFrom<RawMigrationSet> for MigrationSet {
    type Error = MigrateError;

    fn try_from(raw: RawMigrationSet) -> Result<Self> {
        Self::new(
            raw.ordered_migrations,
            raw.diff_map,
            raw.target_schema,
            raw.db_version,
            raw.set_version,
        )
    }
}
