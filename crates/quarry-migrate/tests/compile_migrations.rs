//! Integration tests for migration ordering and compilation.
//!
//! These tests build migration sets through the public API (and from JSON
//! files on disk) and check the emitted SQL.

use std::collections::BTreeMap;
use std::io::Write;

use quarry_migrate::prelude::*;

fn t1() -> TableSchema {
    TableSchema::new("t1")
        .column(ColumnSchema::new("id", SqlType::Integer).not_null())
        .column(ColumnSchema::new("x", SqlType::Text).unique())
        .primary_key(&["id"])
}

fn compile(set: &MigrationSet) -> Vec<String> {
    MigrationCompiler::new(JsonSchemaSerializer::new())
        .compile(set)
        .unwrap()
        .into_iter()
        .map(|s| s.sql)
        .collect()
}

/// Every ordering of `items`, by Heap's algorithm.
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        heap(k - 1, items, out);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            heap(k - 1, items, out);
        }
    }
    let mut items = items.to_vec();
    let mut out = Vec::new();
    heap(items.len(), &mut items, &mut out);
    out
}

// =============================================================================
// Deduplication
// =============================================================================

#[test]
fn test_create_table_absorbs_unique_column_migrations() {
    let set = MigrationSet::from_migrations(
        vec![
            Migration::table(MigrationType::CreateTable, "t1"),
            Migration::column(MigrationType::AlterTableAddColumn, "t1", "x"),
            Migration::column(MigrationType::AddUniqueIndex, "t1", "x"),
        ],
        vec![t1()],
        1,
    );
    let sql = compile(&set);
    assert_eq!(
        sql,
        vec!["CREATE TABLE \"t1\" (\"id\" INTEGER NOT NULL, \"x\" TEXT UNIQUE, PRIMARY KEY (\"id\"))"]
    );
}

#[test]
fn test_legacy_foreign_key_reference_is_absorbed() {
    let t2 = TableSchema::new("t2")
        .column(ColumnSchema::new("t1_id", SqlType::Integer))
        .foreign_key(ForeignKeySchema::new("t1_id", "t1", "id"));
    let set = MigrationSet::from_migrations(
        vec![
            Migration::column(MigrationType::AddForeignKeyReference, "t2", "t1_id"),
            Migration::table(MigrationType::CreateTable, "t2"),
        ],
        vec![t2],
        1,
    );
    let sql = compile(&set);
    assert_eq!(sql.len(), 1);
    assert!(sql[0].contains("FOREIGN KEY (\"t1_id\") REFERENCES \"t1\" (\"id\")"));
}

#[test]
fn test_legacy_foreign_key_reference_alone_recreates() {
    let t2 = TableSchema::new("t2")
        .column(ColumnSchema::new("t1_id", SqlType::Integer))
        .foreign_key(ForeignKeySchema::new("t1_id", "t1", "id"));
    let set = MigrationSet::from_migrations(
        vec![Migration::column(MigrationType::AddForeignKeyReference, "t2", "t1_id")],
        vec![t2],
        1,
    );
    let sql = compile(&set);
    assert_eq!(sql[0], "ALTER TABLE \"t2\" RENAME TO \"temp_t2\"");
    assert_eq!(sql.last().unwrap(), "DROP TABLE IF EXISTS \"temp_t2\"");
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_every_permutation_sorts_identically() {
    let migrations = vec![
        Migration::table(MigrationType::DropTable, "t1"),
        Migration::column(MigrationType::AddIndex, "t1", "x"),
        Migration::table(MigrationType::CreateTable, "t1"),
        Migration::column(MigrationType::AlterTableAddColumn, "t1", "x"),
        Migration::table(MigrationType::UpdatePrimaryKey, "t1"),
    ];

    let mut expected = migrations.clone();
    expected.sort();

    let orders = permutations(&migrations);
    assert_eq!(orders.len(), 120);
    for mut order in orders {
        order.sort();
        assert_eq!(order, expected);
    }

    let position = |kind: MigrationType| expected.iter().position(|m| m.kind == kind).unwrap();
    assert!(position(MigrationType::CreateTable) < position(MigrationType::DropTable));
    assert_eq!(expected[0].kind, MigrationType::CreateTable);
    assert_eq!(expected[4].kind, MigrationType::DropTable);
}

#[test]
fn test_drop_never_precedes_create_across_tables() {
    let migrations = vec![
        Migration::table(MigrationType::DropTable, "a"),
        Migration::table(MigrationType::CreateTable, "z"),
        Migration::table(MigrationType::CreateTable, "a"),
        Migration::table(MigrationType::DropTable, "z"),
    ];
    for mut order in permutations(&migrations) {
        order.sort();
        let kinds: Vec<MigrationType> = order.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MigrationType::CreateTable,
                MigrationType::CreateTable,
                MigrationType::DropTable,
                MigrationType::DropTable
            ]
        );
        assert_eq!(order[0].table_name, "a");
    }
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_set_from_file() {
    let json = r#"{
        "ordered_migrations": [
            {"type": "ADD_INDEX", "table_name": "User", "column_name": "getName"},
            {"type": "CREATE_TABLE", "table_name": "User"}
        ],
        "target_schema": {
            "User": {
                "name": "users",
                "columns": [
                    {"name": "id", "sql_type": "BigInt", "primary_key": true},
                    {"name": "name", "accessor": "getName", "sql_type": "Text"}
                ]
            }
        },
        "db_version": 4,
        "set_version": 2
    }"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let set = load_migration_set(file.path()).unwrap();
    assert_eq!(set.set_version(), SetVersion::V2);
    assert_eq!(set.db_version(), 4);
    assert_eq!(set.table("User").unwrap().primary_key, vec!["id"]);

    let sql = compile(&set);
    assert_eq!(
        sql,
        vec![
            "CREATE TABLE \"users\" (\"id\" INTEGER, \"name\" TEXT, PRIMARY KEY (\"id\"))",
            "CREATE INDEX IF NOT EXISTS \"users_name_idx\" ON \"users\" (\"name\" ASC)",
        ]
    );
}

#[test]
fn test_load_rejects_conflicting_sources() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"ordered_migrations": [], "diff_map": {}, "db_version": 1}"#)
        .unwrap();
    let err = load_migration_set(file.path()).unwrap_err();
    assert!(matches!(err, MigrateError::Serialization(_)));
}

// =============================================================================
// Diff maps
// =============================================================================

#[test]
fn test_diff_map_set_compiles() {
    let diffs = BTreeMap::from([(
        String::from("t1"),
        vec![
            SchemaDiff::created(DiffCategory::Column, "x"),
            SchemaDiff::changed(DiffCategory::PrimaryKey, "t1", ChangeFlags::COLUMNS),
        ],
    )]);
    let set = MigrationSet::from_diffs(diffs, vec![t1()], 3);
    let sql = compile(&set);

    // The new column is created inline but not copied from the old table.
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE \"t1\" RENAME TO \"temp_t1\"",
            "CREATE TABLE \"t1\" (\"id\" INTEGER NOT NULL, \"x\" TEXT UNIQUE, PRIMARY KEY (\"id\"))",
            "INSERT INTO \"t1\" (\"id\") SELECT temp_t1.id FROM temp_t1 ORDER BY temp_t1.rowid ASC",
            "DROP TABLE IF EXISTS \"temp_t1\"",
        ]
    );
}
