//! Migration compiler.
//!
//! Turns a [`MigrationSet`] into the ordered list of SQL statements that
//! applies it. Migrations are sorted by their total order, then emitted one by
//! one; once a table has been created or recreated from its target schema,
//! later migrations whose effect that CREATE TABLE already guarantees are
//! skipped.
//!
//! Changes SQLite cannot make in place (primary key, foreign keys, column
//! defaults) use table recreation: rename to a temporary table, create the
//! target shape, copy the shared columns, drop the temporary table, and
//! recreate the indexes.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use quarry_core::builder::{Select, Statement};
use quarry_core::{DialectCorrector, Projection, QueryShape};

use crate::dialect::{MigrationDialect, SqliteDialect};
use crate::error::{MigrateError, Result};
use crate::migration::{
    Migration, MigrationSet, MigrationType, PREVIOUS_COLUMNS, PREVIOUS_FOREIGN_KEYS,
};
use crate::schema::{column_index_name, unique_index_name, IndexSchema, TableSchema};
use crate::serializer::SchemaSerializer;

/// Prefix of the table an existing table is renamed to during recreation.
pub const TEMP_TABLE_PREFIX: &str = "temp_";

/// Name of the temporary copy of `table`.
#[must_use]
pub fn temp_table_name(table: &str) -> String {
    format!("{TEMP_TABLE_PREFIX}{table}")
}

/// One sorted migration and what it compiled to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// The migration.
    pub migration: Migration,
    /// Emitted statements, empty when skipped.
    pub statements: Vec<Statement>,
    /// True if an earlier CREATE TABLE already covered this migration.
    pub skipped: bool,
}

/// Tables (re)created from their target schema so far in one run.
#[derive(Debug, Default)]
struct Progress {
    recreated: BTreeSet<String>,
    /// Per created table, the unconstrained columns its CREATE TABLE left out
    /// because a later ALTER TABLE adds them.
    deferred: BTreeMap<String, BTreeSet<String>>,
}

impl Progress {
    fn is_deferred(&self, table: &str, column: &str) -> bool {
        self.deferred
            .get(table)
            .is_some_and(|columns| columns.contains(column))
    }
}

/// Compiles migration sets into SQL statements.
#[derive(Debug, Clone)]
pub struct MigrationCompiler<S, D = SqliteDialect> {
    serializer: S,
    dialect: D,
}

impl<S: SchemaSerializer> MigrationCompiler<S, SqliteDialect> {
    /// Creates a compiler for SQLite.
    #[must_use]
    pub fn new(serializer: S) -> Self {
        Self::with_dialect(serializer, SqliteDialect::new())
    }
}

impl<S: SchemaSerializer, D: MigrationDialect> MigrationCompiler<S, D> {
    /// Creates a compiler for another dialect.
    #[must_use]
    pub fn with_dialect(serializer: S, dialect: D) -> Self {
        Self {
            serializer,
            dialect,
        }
    }

    /// Compiles `set` into statements, in application order.
    ///
    /// The caller is expected to apply the whole list atomically.
    ///
    /// # Errors
    ///
    /// Fails on unknown tables, columns or indexes, on column migrations
    /// without a column, on unsupported diffs, and on malformed extras.
    pub fn compile(&self, set: &MigrationSet) -> Result<Vec<Statement>> {
        let statements: Vec<Statement> = self
            .plan(set)?
            .into_iter()
            .flat_map(|step| step.statements)
            .collect();
        info!(
            dialect = self.dialect.name(),
            db_version = set.db_version(),
            statements = statements.len(),
            "compiled migration set"
        );
        Ok(statements)
    }

    /// Compiles `set`, keeping the per-migration breakdown.
    ///
    /// # Errors
    ///
    /// Same as [`Self::compile`].
    pub fn plan(&self, set: &MigrationSet) -> Result<Vec<PlanStep>> {
        let mut migrations = set.migrations()?;
        migrations.sort();
        info!(
            dialect = self.dialect.name(),
            db_version = set.db_version(),
            migrations = migrations.len(),
            "planning migration set"
        );

        let mut progress = Progress::default();
        let mut steps = Vec::with_capacity(migrations.len());

        for (position, migration) in migrations.iter().enumerate() {
            if self.is_covered(set, migration, &progress)? {
                debug!(%migration, "skipped, covered by CREATE TABLE");
                steps.push(PlanStep {
                    migration: migration.clone(),
                    statements: Vec::new(),
                    skipped: true,
                });
                continue;
            }

            let pending = &migrations[position + 1..];
            let statements = self.generate(set, migration, pending, &mut progress)?;
            if migration.kind == MigrationType::CreateTable || migration.kind.recreates_table() {
                progress
                    .recreated
                    .insert(set.table(&migration.table_name)?.name.clone());
            }
            for statement in &statements {
                debug!(%migration, sql = %statement.sql, "emitted");
            }
            steps.push(PlanStep {
                migration: migration.clone(),
                statements,
                skipped: false,
            });
        }

        Ok(steps)
    }

    /// True if the table was created from its target schema in this run and
    /// that CREATE TABLE already established what `migration` would add.
    fn is_covered(
        &self,
        set: &MigrationSet,
        migration: &Migration,
        progress: &Progress,
    ) -> Result<bool> {
        use MigrationType as T;

        if !matches!(
            migration.kind,
            T::AddForeignKeyReference
                | T::AddUniqueIndex
                | T::AlterTableAddColumn
                | T::AlterTableAddUnique
        ) {
            return Ok(false);
        }

        let table = set.table(&migration.table_name)?;
        if !progress.recreated.contains(&table.name) {
            return Ok(false);
        }

        match migration.kind {
            T::AlterTableAddColumn | T::AlterTableAddUnique => {
                let column = table.find_column(migration.require_column()?)?;
                Ok(table.is_constrained(column) && !progress.is_deferred(&table.name, &column.name))
            }
            T::AddUniqueIndex => Ok(unique_index_established(table, migration, progress)),
            _ => Ok(true),
        }
    }

    fn generate(
        &self,
        set: &MigrationSet,
        migration: &Migration,
        pending: &[Migration],
        progress: &mut Progress,
    ) -> Result<Vec<Statement>> {
        use MigrationType as T;

        // A dropped table may be absent from the target schema.
        if migration.kind == T::DropTable {
            return Ok(vec![Statement::raw(
                self.dialect.drop_table_sql(&migration.table_name),
            )]);
        }

        let table = set.table(&migration.table_name)?;

        let sql = match migration.kind {
            T::CreateTable => {
                let (target, _) = target_shape(set, table, pending, progress)?;
                let mut sql = vec![self.dialect.create_table_sql(&target)];
                // Declared unique indexes: their ADD_UNIQUE_INDEX migrations
                // are skipped from here on.
                sql.extend(
                    target
                        .indexes
                        .iter()
                        .filter(|i| i.unique)
                        .map(|i| self.dialect.create_index_sql(&target.name, i)),
                );
                sql
            }
            T::AlterTableAddColumn | T::AlterTableAddUnique => {
                let column = table.find_column(migration.require_column()?)?;
                let mut sql = vec![self.dialect.add_column_sql(&table.name, column)];
                if column.unique || migration.kind == T::AlterTableAddUnique {
                    let index = IndexSchema::on_column(
                        &unique_index_name(&table.name, &column.name),
                        &column.name,
                        true,
                    );
                    sql.push(self.dialect.create_index_sql(&table.name, &index));
                }
                if column.index {
                    let index = IndexSchema::on_column(
                        &column_index_name(&table.name, &column.name),
                        &column.name,
                        false,
                    );
                    sql.push(self.dialect.create_index_sql(&table.name, &index));
                }
                sql
            }
            T::AddIndex | T::AddUniqueIndex => {
                let index = resolve_index(table, migration)?;
                vec![self.dialect.create_index_sql(&table.name, &index)]
            }
            T::MakeColumnUnique => {
                let column = table.find_column(migration.require_column()?)?;
                let index = IndexSchema::on_column(
                    &unique_index_name(&table.name, &column.name),
                    &column.name,
                    true,
                );
                vec![self.dialect.create_index_sql(&table.name, &index)]
            }
            T::CreateTempTableFromExisting => {
                let columns = table.column_names();
                let select = self.copy_select(&table.name, &columns)?;
                vec![self
                    .dialect
                    .create_table_as_sql(&temp_table_name(&table.name), &select)]
            }
            T::UpdatePrimaryKey
            | T::UpdateForeignKeys
            | T::ChangeDefaultValue
            | T::AddForeignKeyReference => {
                let (target, added) = target_shape(set, table, pending, progress)?;
                self.recreate(&target, &added, migration)?
            }
            T::DropTable => vec![self.dialect.drop_table_sql(&table.name)],
        };

        Ok(sql.into_iter().map(Statement::raw).collect())
    }

    /// Rename, create `target`, copy, drop the copy, recreate indexes.
    ///
    /// Without a `previous_columns` extra the old table is assumed to hold
    /// every target column except those in `added`.
    fn recreate(
        &self,
        target: &TableSchema,
        added: &BTreeSet<String>,
        migration: &Migration,
    ) -> Result<Vec<String>> {
        let temp = temp_table_name(&target.name);

        let shared: Vec<String> = match migration.extras.get(PREVIOUS_COLUMNS) {
            Some(text) => {
                let previous = self.serializer.deserialize_columns(text)?;
                target
                    .columns
                    .iter()
                    .filter(|c| previous.contains(&c.name))
                    .map(|c| c.name.clone())
                    .collect()
            }
            None => target
                .columns
                .iter()
                .filter(|c| !added.contains(&c.name))
                .map(|c| c.name.clone())
                .collect(),
        };

        if let Some(text) = migration.extras.get(PREVIOUS_FOREIGN_KEYS) {
            let dropped = self
                .serializer
                .deserialize_foreign_keys(text)?
                .into_iter()
                .filter(|fk| !target.foreign_keys.contains(fk))
                .count();
            if dropped > 0 {
                warn!(table = %target.name, dropped, "table recreation drops foreign keys");
            }
        }

        let mut sql = vec![
            self.dialect.rename_table_sql(&target.name, &temp),
            self.dialect.create_table_sql(target),
        ];

        if !shared.is_empty() {
            let select = self.copy_select(&temp, &shared)?;
            let columns: Vec<String> = shared
                .iter()
                .map(|c| self.dialect.quote_identifier(c))
                .collect();
            sql.push(format!(
                "INSERT INTO {} ({}) {select}",
                self.dialect.quote_identifier(&target.name),
                columns.join(", ")
            ));
        }

        sql.push(self.dialect.drop_table_sql(&temp));
        sql.extend(
            target
                .all_indexes()
                .iter()
                .map(|i| self.dialect.create_index_sql(&target.name, i)),
        );
        Ok(sql)
    }

    /// `SELECT source.c1, ... FROM source ORDER BY source.rowid ASC`.
    fn copy_select(&self, source: &str, columns: &[String]) -> Result<String> {
        let corrected = DialectCorrector::new().correct(&QueryShape::select(source));
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        let statement = Select::new(&corrected)
            .projections(&[Projection::new(source, &names)])
            .build()?;
        Ok(statement.sql)
    }
}

/// The shape `table` is (re)created with, given the migrations still to run.
///
/// Columns a pending ALTER TABLE adds are returned as `added`. The
/// unconstrained ones are left out of the shape so that ALTER TABLE can add
/// them; constrained ones stay inline and their ALTER TABLE is skipped.
fn target_shape(
    set: &MigrationSet,
    table: &TableSchema,
    pending: &[Migration],
    progress: &mut Progress,
) -> Result<(TableSchema, BTreeSet<String>)> {
    let mut added = BTreeSet::new();
    let mut deferred = BTreeSet::new();

    for migration in pending.iter().filter(|m| {
        matches!(
            m.kind,
            MigrationType::AlterTableAddColumn | MigrationType::AlterTableAddUnique
        )
    }) {
        if set.table(&migration.table_name)?.name != table.name {
            continue;
        }
        let column = table.find_column(migration.require_column()?)?;
        if !table.is_constrained(column) {
            deferred.insert(column.name.clone());
        }
        added.insert(column.name.clone());
    }

    if !deferred.is_empty() {
        debug!(table = %table.name, ?deferred, "columns left for ALTER TABLE");
    }
    let target = table.without_columns(&deferred);
    progress.deferred.insert(table.name.clone(), deferred);
    Ok((target, added))
}

/// True if the CREATE TABLE of `table` already produced the unique index
/// `migration` asks for.
fn unique_index_established(
    table: &TableSchema,
    migration: &Migration,
    progress: &Progress,
) -> bool {
    let Ok(index) = resolve_index(table, migration) else {
        return false;
    };
    if index
        .columns
        .iter()
        .any(|(column, _)| progress.is_deferred(&table.name, column))
    {
        return false;
    }
    if table.find_index(&index.name).is_some_and(|declared| declared.unique) {
        return true;
    }
    match index.columns.as_slice() {
        [(column, _)] => table.find_column(column).is_ok_and(|c| c.unique),
        _ => false,
    }
}

/// Resolves an index migration's column name: a declared index first, else a
/// single column.
fn resolve_index(table: &TableSchema, migration: &Migration) -> Result<IndexSchema> {
    let key = migration.require_column()?;
    let unique = migration.kind == MigrationType::AddUniqueIndex;

    if let Some(index) = table.find_index(key) {
        return Ok(index.clone());
    }

    match table.find_column(key) {
        Ok(column) => {
            let name = if unique {
                unique_index_name(&table.name, &column.name)
            } else {
                column_index_name(&table.name, &column.name)
            };
            Ok(IndexSchema::on_column(&name, &column.name, unique))
        }
        Err(_) => Err(MigrateError::UnknownIndex {
            table: table.name.clone(),
            index: String::from(key),
        }),
    }
}
