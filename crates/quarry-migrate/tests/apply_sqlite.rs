//! Runs compiled migration sets against an in-memory SQLite database.

use std::collections::BTreeMap;

use quarry_migrate::prelude::*;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

async fn execute(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql)
        .execute(pool)
        .await
        .unwrap_or_else(|e| panic!("{sql}: {e}"));
}

/// Compiles `set` and applies every statement in order.
async fn apply(pool: &SqlitePool, set: &MigrationSet) {
    let statements = MigrationCompiler::new(JsonSchemaSerializer::new())
        .compile(set)
        .unwrap();
    for statement in statements {
        execute(pool, &statement.sql).await;
    }
}

async fn columns(pool: &SqlitePool, table: &str) -> Vec<String> {
    sqlx::query_as::<_, (String,)>("SELECT name FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(pool)
        .await
        .unwrap()
        .into_iter()
        .map(|(name,)| name)
        .collect()
}

async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

async fn exists(pool: &SqlitePool, kind: &str, name: &str) -> bool {
    sqlx::query_as::<_, (String,)>("SELECT name FROM sqlite_master WHERE type = ? AND name = ?")
        .bind(kind)
        .bind(name)
        .fetch_optional(pool)
        .await
        .unwrap()
        .is_some()
}

fn notes() -> TableSchema {
    TableSchema::new("notes")
        .column(ColumnSchema::new("id", SqlType::Integer).not_null())
        .column(ColumnSchema::new("body", SqlType::Text))
        .column(ColumnSchema::new("pinned", SqlType::Boolean).default(DefaultValue::Bool(false)))
        .primary_key(&["id"])
}

#[tokio::test]
async fn test_create_then_add_plain_column() {
    let pool = create_test_pool().await;
    let set = MigrationSet::from_migrations(
        vec![
            Migration::table(MigrationType::CreateTable, "notes"),
            Migration::column(MigrationType::AlterTableAddColumn, "notes", "pinned"),
        ],
        vec![notes()],
        1,
    );
    apply(&pool, &set).await;
    assert_eq!(columns(&pool, "notes").await, vec!["id", "body", "pinned"]);
}

#[tokio::test]
async fn test_unique_index_on_column_added_after_create() {
    let pool = create_test_pool().await;
    let table = notes().index(
        IndexSchema::unique_index("notes_pinned_body", &["pinned", "body"], &[SortOrder::Desc, SortOrder::Asc])
            .unwrap(),
    );
    let set = MigrationSet::from_migrations(
        vec![
            Migration::table(MigrationType::CreateTable, "notes"),
            Migration::column(MigrationType::AlterTableAddColumn, "notes", "pinned"),
            Migration::column(MigrationType::AddUniqueIndex, "notes", "notes_pinned_body"),
        ],
        vec![table],
        1,
    );
    apply(&pool, &set).await;
    assert!(exists(&pool, "index", "notes_pinned_body").await);
}

#[tokio::test]
async fn test_primary_key_change_with_new_unique_column() {
    let pool = create_test_pool().await;
    execute(&pool, "CREATE TABLE t1 (id INTEGER)").await;
    execute(&pool, "INSERT INTO t1 (id) VALUES (1), (2)").await;

    let target = TableSchema::new("t1")
        .column(ColumnSchema::new("id", SqlType::Integer).not_null())
        .column(ColumnSchema::new("x", SqlType::Text).unique())
        .primary_key(&["id"]);
    let diffs = BTreeMap::from([(
        String::from("t1"),
        vec![
            SchemaDiff::created(DiffCategory::Column, "x"),
            SchemaDiff::changed(DiffCategory::PrimaryKey, "t1", ChangeFlags::COLUMNS),
        ],
    )]);
    apply(&pool, &MigrationSet::from_diffs(diffs, vec![target], 2)).await;

    assert_eq!(columns(&pool, "t1").await, vec!["id", "x"]);
    assert_eq!(count_rows(&pool, "t1").await, 2);
    assert!(!exists(&pool, "table", "temp_t1").await);
}

#[tokio::test]
async fn test_recreation_keeps_rows_and_adds_plain_column() {
    let pool = create_test_pool().await;
    execute(&pool, "CREATE TABLE notes (id INTEGER, body TEXT)").await;
    execute(&pool, "INSERT INTO notes (id, body) VALUES (7, 'hello')").await;

    let set = MigrationSet::from_migrations(
        vec![
            Migration::column(MigrationType::AlterTableAddColumn, "notes", "pinned"),
            Migration::table(MigrationType::UpdatePrimaryKey, "notes"),
        ],
        vec![notes()],
        2,
    );
    apply(&pool, &set).await;

    assert_eq!(columns(&pool, "notes").await, vec!["id", "body", "pinned"]);
    let (body, pinned): (String, i64) =
        sqlx::query_as("SELECT body, pinned FROM notes WHERE id = 7")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(body, "hello");
    assert_eq!(pinned, 0);
}

#[tokio::test]
async fn test_add_column_on_existing_table_then_legacy_reference() {
    let pool = create_test_pool().await;
    execute(&pool, "CREATE TABLE authors (id INTEGER PRIMARY KEY)").await;
    execute(&pool, "CREATE TABLE notes (id INTEGER, body TEXT, author_id INTEGER)").await;
    execute(&pool, "INSERT INTO authors (id) VALUES (4)").await;
    execute(&pool, "INSERT INTO notes (id, body, author_id) VALUES (1, 'a', 4)").await;

    let table = notes()
        .column(ColumnSchema::new("author_id", SqlType::Integer))
        .foreign_key(ForeignKeySchema::new("author_id", "authors", "id"));
    let set = MigrationSet::from_migrations(
        vec![
            Migration::column(MigrationType::AddForeignKeyReference, "notes", "author_id"),
            Migration::column(MigrationType::AlterTableAddColumn, "notes", "pinned"),
        ],
        vec![table],
        3,
    );
    apply(&pool, &set).await;

    // The column added first is copied along by the later recreation.
    assert_eq!(
        columns(&pool, "notes").await,
        vec!["id", "body", "pinned", "author_id"]
    );
    let (author_id, pinned): (i64, i64) =
        sqlx::query_as("SELECT author_id, pinned FROM notes WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!((author_id, pinned), (4, 0));
}
