//! Schema diffs and their lowering into migrations.
//!
//! A diffing tool may describe a schema change as a set of [`SchemaDiff`]s per
//! table instead of an ordered migration list. Before compilation those diffs
//! are lowered into [`Migration`]s; a diff that has no migration equivalent
//! is rejected rather than dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::migration::{
    Migration, MigrationSet, MigrationType, PREVIOUS_COLUMNS, PREVIOUS_FOREIGN_KEYS,
};

/// Attribute key: current name of the changed object.
pub const CURRENT_NAME: &str = "c_name";
/// Attribute key: previous name of the changed object.
pub const PREVIOUS_NAME: &str = "p_name";
/// Attribute key: current type.
pub const CURRENT_TYPE: &str = "c_type";
/// Attribute key: previous type.
pub const PREVIOUS_TYPE: &str = "p_type";
/// Attribute key: current default value.
pub const CURRENT_DEFAULT: &str = "c_default";
/// Attribute key: previous default value.
pub const PREVIOUS_DEFAULT: &str = "p_default";

/// What kind of schema object changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffCategory {
    /// A table.
    Table,
    /// A column.
    Column,
    /// The primary key.
    PrimaryKey,
    /// A foreign key.
    ForeignKey,
    /// An index.
    Index,
}

/// How the object changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// The object is new.
    Created,
    /// Some attributes changed; see the sub-type flags.
    Changed,
    /// The object is gone.
    Dropped,
}

/// Bit flags naming which attributes of a changed object are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeFlags(u16);

impl ChangeFlags {
    /// `c_name` / `p_name` are populated.
    pub const NAME: Self = Self(1);
    /// `c_type` / `p_type` are populated.
    pub const TYPE: Self = Self(1 << 1);
    /// Column membership changed.
    pub const COLUMNS: Self = Self(1 << 2);
    /// Sort order changed.
    pub const SORT: Self = Self(1 << 3);
    /// Foreign key target changed.
    pub const FOREIGN_KEY: Self = Self(1 << 4);
    /// A constraint (UNIQUE, NOT NULL) changed.
    pub const CONSTRAINT: Self = Self(1 << 5);
    /// `c_default` / `p_default` are populated.
    pub const DEFAULT: Self = Self(1 << 6);
    /// Sub-type of a created object.
    pub const CREATED: Self = Self(1 << 7);
    /// Sub-type of a dropped object.
    pub const DROPPED: Self = Self(1 << 8);

    /// The raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns true if every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if any flag of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ChangeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ChangeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#011b}", self.0)
    }
}

/// One change to one schema object.
///
/// Created and dropped diffs carry their kind as sub-type; changed diffs
/// carry attribute flags only. Deserialization enforces both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSchemaDiff")]
pub struct SchemaDiff {
    /// Changed object.
    pub category: DiffCategory,
    /// Kind of change.
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// For CHANGED, which attributes are populated; otherwise the kind itself.
    pub sub_type: ChangeFlags,
    /// Fixed-name attributes (`c_name`, `p_name`, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl SchemaDiff {
    /// A created object named `name`.
    #[must_use]
    pub fn created(category: DiffCategory, name: &str) -> Self {
        Self {
            category,
            kind: ChangeKind::Created,
            sub_type: ChangeFlags::CREATED,
            attributes: BTreeMap::from([(String::from(CURRENT_NAME), String::from(name))]),
        }
    }

    /// A dropped object named `name`.
    #[must_use]
    pub fn dropped(category: DiffCategory, name: &str) -> Self {
        Self {
            category,
            kind: ChangeKind::Dropped,
            sub_type: ChangeFlags::DROPPED,
            attributes: BTreeMap::from([(String::from(PREVIOUS_NAME), String::from(name))]),
        }
    }

    /// A changed object named `name`, with the given populated attributes.
    #[must_use]
    pub fn changed(category: DiffCategory, name: &str, flags: ChangeFlags) -> Self {
        Self {
            category,
            kind: ChangeKind::Changed,
            sub_type: flags,
            attributes: BTreeMap::from([(String::from(CURRENT_NAME), String::from(name))]),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(String::from(key), value.into());
        self
    }

    /// The object's name: current if known, else previous.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attributes
            .get(CURRENT_NAME)
            .or_else(|| self.attributes.get(PREVIOUS_NAME))
            .map(String::as_str)
    }

    fn unsupported(&self) -> MigrateError {
        MigrateError::UnsupportedDiff {
            category: self.category,
            kind: self.kind,
        }
    }

    fn copy_extras(&self, mut migration: Migration) -> Migration {
        for key in [PREVIOUS_COLUMNS, PREVIOUS_FOREIGN_KEYS] {
            if let Some(value) = self.attributes.get(key) {
                migration = migration.extra(key, value.clone());
            }
        }
        migration
    }
}

#[derive(Debug, Deserialize)]
struct RawSchemaDiff {
    category: DiffCategory,
    #[serde(rename = "type")]
    kind: ChangeKind,
    sub_type: ChangeFlags,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl TryFrom<RawSchemaDiff> for SchemaDiff {
    type Error = MigrateError;

    fn try_from(raw: RawSchemaDiff) -> Result<Self> {
        let valid = match raw.kind {
            ChangeKind::Created => raw.sub_type == ChangeFlags::CREATED,
            ChangeKind::Dropped => raw.sub_type == ChangeFlags::DROPPED,
            ChangeKind::Changed => {
                !raw.sub_type.intersects(ChangeFlags::CREATED | ChangeFlags::DROPPED)
            }
        };
        if !valid {
            return Err(MigrateError::InvalidDiffSubType {
                kind: raw.kind,
                sub_type: raw.sub_type,
            });
        }
        Ok(Self {
            category: raw.category,
            kind: raw.kind,
            sub_type: raw.sub_type,
            attributes: raw.attributes,
        })
    }
}

/// Lowers every diff of `set` into migrations, in table-key order.
///
/// # Errors
///
/// Fails with [`MigrateError::UnsupportedDiff`] for changes no migration type
/// expresses, or with a lookup error for unknown tables, columns or indexes.
pub fn lower_diffs(
    set: &MigrationSet,
    diffs: &BTreeMap<String, Vec<SchemaDiff>>,
) -> Result<Vec<Migration>> {
    let mut migrations = Vec::new();
    for (key, table_diffs) in diffs {
        for diff in table_diffs {
            let lowered = lower_one(set, key, diff)?;
            debug!(table = %key, category = ?diff.category, kind = ?diff.kind, count = lowered.len(), "lowered schema diff");
            migrations.extend(lowered);
        }
    }
    Ok(migrations)
}

fn lower_one(set: &MigrationSet, key: &str, diff: &SchemaDiff) -> Result<Vec<Migration>> {
    use DiffCategory as C;
    use MigrationType as T;

    if let (C::Table, ChangeKind::Dropped) = (diff.category, diff.kind) {
        // A dropped table has no target schema; its name travels in the diff.
        let name = diff.name().unwrap_or(key);
        return Ok(vec![Migration::table(T::DropTable, name)]);
    }

    let table = set.table(key)?;
    let object = || diff.name().ok_or_else(|| diff.unsupported());

    let migrations = match (diff.category, diff.kind) {
        (C::Table, ChangeKind::Created) => vec![Migration::table(T::CreateTable, &table.name)],
        (C::Column, ChangeKind::Created) => {
            let column = table.find_column(object()?)?;
            let kind = if column.unique {
                T::AlterTableAddUnique
            } else {
                T::AlterTableAddColumn
            };
            vec![Migration::column(kind, &table.name, &column.name)]
        }
        (C::Column, ChangeKind::Changed) => {
            let column = table.find_column(object()?)?;
            let mut lowered = Vec::new();
            if diff.sub_type.contains(ChangeFlags::DEFAULT) {
                lowered.push(diff.copy_extras(Migration::column(
                    T::ChangeDefaultValue,
                    &table.name,
                    &column.name,
                )));
            }
            if diff.sub_type.contains(ChangeFlags::CONSTRAINT) && column.unique {
                lowered.push(Migration::column(
                    T::MakeColumnUnique,
                    &table.name,
                    &column.name,
                ));
            }
            if lowered.is_empty() {
                return Err(diff.unsupported());
            }
            lowered
        }
        (C::PrimaryKey, _) => vec![diff.copy_extras(Migration::table(
            T::UpdatePrimaryKey,
            &table.name,
        ))],
        (C::ForeignKey, _) => vec![diff.copy_extras(Migration::table(
            T::UpdateForeignKeys,
            &table.name,
        ))],
        (C::Index, ChangeKind::Created) => {
            let name = object()?;
            let index = table
                .find_index(name)
                .ok_or_else(|| MigrateError::UnknownIndex {
                    table: table.name.clone(),
                    index: String::from(name),
                })?;
            let kind = if index.unique {
                T::AddUniqueIndex
            } else {
                T::AddIndex
            };
            vec![Migration::column(kind, &table.name, &index.name)]
        }
        _ => return Err(diff.unsupported()),
    };
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, IndexSchema, SortOrder, SqlType, TableSchema};

    fn target() -> Vec<TableSchema> {
        vec![TableSchema::new("users")
            .column(ColumnSchema::new("id", SqlType::BigInt))
            .column(ColumnSchema::new("email", SqlType::Text).unique())
            .column(ColumnSchema::new("age", SqlType::Integer))
            .primary_key(&["id"])
            .index(IndexSchema::non_unique_index("users_age", &["age"], &[SortOrder::Asc]).unwrap())]
    }

    fn lower(diffs: Vec<SchemaDiff>) -> Result<Vec<Migration>> {
        let map = BTreeMap::from([(String::from("users"), diffs)]);
        MigrationSet::from_diffs(map, target(), 2).migrations()
    }

    #[test]
    fn test_flags() {
        let flags = ChangeFlags::NAME | ChangeFlags::DEFAULT;
        assert!(flags.contains(ChangeFlags::DEFAULT));
        assert!(!flags.contains(ChangeFlags::TYPE));
        assert_eq!(serde_json::to_string(&flags).unwrap(), "65");
    }

    #[test]
    fn test_created_and_dropped_sub_type_matches_kind() {
        assert_eq!(
            SchemaDiff::created(DiffCategory::Table, "t").sub_type,
            ChangeFlags::CREATED
        );
        assert_eq!(
            SchemaDiff::dropped(DiffCategory::Table, "t").sub_type,
            ChangeFlags::DROPPED
        );
    }

    #[test]
    fn test_deserialize_checks_sub_type() {
        let ok = r#"{"category": "COLUMN", "type": "CREATED", "sub_type": 128, "attributes": {"c_name": "age"}}"#;
        let diff: SchemaDiff = serde_json::from_str(ok).unwrap();
        assert_eq!(diff, SchemaDiff::created(DiffCategory::Column, "age"));

        let mismatched = r#"{"category": "COLUMN", "type": "CREATED", "sub_type": 65}"#;
        let err = serde_json::from_str::<SchemaDiff>(mismatched).unwrap_err();
        assert!(err.to_string().contains("sub-type"));

        let changed_as_dropped = r#"{"category": "INDEX", "type": "CHANGED", "sub_type": 256}"#;
        assert!(serde_json::from_str::<SchemaDiff>(changed_as_dropped).is_err());

        let changed = r#"{"category": "COLUMN", "type": "CHANGED", "sub_type": 65}"#;
        let diff: SchemaDiff = serde_json::from_str(changed).unwrap();
        assert!(diff.sub_type.contains(ChangeFlags::DEFAULT));
    }

    #[test]
    fn test_lower_table_and_columns() {
        let migrations = lower(vec![
            SchemaDiff::created(DiffCategory::Table, "users"),
            SchemaDiff::created(DiffCategory::Column, "age"),
            SchemaDiff::created(DiffCategory::Column, "email"),
            SchemaDiff::created(DiffCategory::Index, "users_age"),
        ])
        .unwrap();
        assert_eq!(
            migrations,
            vec![
                Migration::table(MigrationType::CreateTable, "users"),
                Migration::column(MigrationType::AlterTableAddColumn, "users", "age"),
                Migration::column(MigrationType::AlterTableAddUnique, "users", "email"),
                Migration::column(MigrationType::AddIndex, "users", "users_age"),
            ]
        );
    }

    #[test]
    fn test_lower_changed_column() {
        let migrations = lower(vec![SchemaDiff::changed(
            DiffCategory::Column,
            "email",
            ChangeFlags::DEFAULT | ChangeFlags::CONSTRAINT,
        )
        .attribute(PREVIOUS_COLUMNS, r#"["id","email"]"#)])
        .unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].kind, MigrationType::ChangeDefaultValue);
        assert_eq!(migrations[0].extras[PREVIOUS_COLUMNS], r#"["id","email"]"#);
        assert_eq!(migrations[1].kind, MigrationType::MakeColumnUnique);
    }

    #[test]
    fn test_lower_keys() {
        let migrations = lower(vec![
            SchemaDiff::changed(DiffCategory::PrimaryKey, "users", ChangeFlags::COLUMNS),
            SchemaDiff::created(DiffCategory::ForeignKey, "team_id"),
        ])
        .unwrap();
        assert_eq!(migrations[0].kind, MigrationType::UpdatePrimaryKey);
        assert_eq!(migrations[1].kind, MigrationType::UpdateForeignKeys);
    }

    #[test]
    fn test_dropped_table_needs_no_target() {
        let map = BTreeMap::from([(
            String::from("legacy"),
            vec![SchemaDiff::dropped(DiffCategory::Table, "legacy")],
        )]);
        let migrations = MigrationSet::from_diffs(map, vec![], 2).migrations().unwrap();
        assert_eq!(migrations, vec![Migration::table(MigrationType::DropTable, "legacy")]);
    }

    #[test]
    fn test_unsupported_diffs_fail() {
        let err = lower(vec![SchemaDiff::dropped(DiffCategory::Column, "age")]).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::UnsupportedDiff {
                category: DiffCategory::Column,
                kind: ChangeKind::Dropped
            }
        ));
        let err = lower(vec![SchemaDiff::changed(DiffCategory::Column, "age", ChangeFlags::TYPE)])
            .unwrap_err();
        assert!(matches!(err, MigrateError::UnsupportedDiff { .. }));
    }

    #[test]
    fn test_unknown_index_fails() {
        let err = lower(vec![SchemaDiff::created(DiffCategory::Index, "nope")]).unwrap_err();
        assert!(matches!(err, MigrateError::UnknownIndex { .. }));
    }
}
