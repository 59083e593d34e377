//! SQLite dialect for migrations.
//!
//! SQLite cannot add constraints to an existing table, so primary and foreign
//! keys only ever appear in CREATE TABLE. Changing them goes through table
//! recreation in the compiler.

use crate::schema::{ColumnSchema, ForeignKeyAction, ForeignKeySchema, IndexSchema, SqlType, TableSchema};

use super::MigrationDialect;

/// SQLite migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn quoted_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn foreign_key_sql(&self, fk: &ForeignKeySchema) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quoted_list(&fk.columns),
            self.quote_identifier(&fk.references_table),
            self.quoted_list(&fk.references_columns)
        );
        if fk.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(fk.on_delete.to_sql());
        }
        if fk.on_update != ForeignKeyAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(fk.on_update.to_sql());
        }
        sql
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        sql_type.sqlite_name().to_string()
    }

    fn create_table_sql(&self, table: &TableSchema) -> String {
        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c, true))
            .collect();

        if !table.primary_key.is_empty() {
            defs.push(format!("PRIMARY KEY ({})", self.quoted_list(&table.primary_key)));
        }

        defs.extend(table.foreign_keys.iter().map(|fk| self.foreign_key_sql(fk)));

        format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(&table.name),
            defs.join(", ")
        )
    }

    fn create_table_as_sql(&self, name: &str, select: &str) -> String {
        format!("CREATE TABLE {} AS {select}", self.quote_identifier(name))
    }

    fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(name))
    }

    fn rename_table_sql(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    fn add_column_sql(&self, table: &str, column: &ColumnSchema) -> String {
        // ADD COLUMN cannot carry UNIQUE; the compiler follows up with an index.
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, false)
        )
    }

    fn create_index_sql(&self, table: &str, index: &IndexSchema) -> String {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX IF NOT EXISTS ");
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(table));
        sql.push_str(" (");

        let keys: Vec<String> = index
            .columns
            .iter()
            .map(|(c, order)| format!("{} {}", self.quote_identifier(c), order.to_sql()))
            .collect();
        sql.push_str(&keys.join(", "));
        sql.push(')');
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefaultValue, SortOrder};

    #[test]
    fn test_create_table() {
        let table = TableSchema::new("posts")
            .column(ColumnSchema::new("id", SqlType::BigInt).not_null())
            .column(ColumnSchema::new("slug", SqlType::Text).unique())
            .column(
                ColumnSchema::new("draft", SqlType::Boolean).default(DefaultValue::Bool(true)),
            )
            .column(ColumnSchema::new("author_id", SqlType::BigInt))
            .primary_key(&["id"])
            .foreign_key(
                ForeignKeySchema::new("author_id", "users", "id")
                    .on_delete(ForeignKeyAction::Cascade),
            );

        assert_eq!(
            SqliteDialect::new().create_table_sql(&table),
            "CREATE TABLE \"posts\" (\"id\" INTEGER NOT NULL, \"slug\" TEXT UNIQUE, \
             \"draft\" INTEGER DEFAULT 1, \"author_id\" INTEGER, PRIMARY KEY (\"id\"), \
             FOREIGN KEY (\"author_id\") REFERENCES \"users\" (\"id\") ON DELETE CASCADE)"
        );
    }

    #[test]
    fn test_add_column_drops_unique() {
        let column = ColumnSchema::new("email", SqlType::Text).unique();
        assert_eq!(
            SqliteDialect::new().add_column_sql("users", &column),
            "ALTER TABLE \"users\" ADD COLUMN \"email\" TEXT"
        );
    }

    #[test]
    fn test_create_index() {
        let index =
            IndexSchema::unique_index("by_name", &["last", "first"], &[SortOrder::Asc, SortOrder::Desc])
                .unwrap();
        assert_eq!(
            SqliteDialect::new().create_index_sql("users", &index),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"by_name\" ON \"users\" (\"last\" ASC, \"first\" DESC)"
        );
    }

    #[test]
    fn test_rename_and_drop() {
        let dialect = SqliteDialect::new();
        assert_eq!(
            dialect.rename_table_sql("users", "temp_users"),
            "ALTER TABLE \"users\" RENAME TO \"temp_users\""
        );
        assert_eq!(dialect.drop_table_sql("temp_users"), "DROP TABLE IF EXISTS \"temp_users\"");
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(SqliteDialect::new().quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
