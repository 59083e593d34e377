//! Serialized schema snapshots carried in migration extras, and set loading.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::migration::MigrationSet;
use crate::schema::ForeignKeySchema;

/// Reads and writes the schema snapshots stored in [`crate::Migration::extras`].
pub trait SchemaSerializer {
    /// Decodes a column-name list.
    ///
    /// # Errors
    ///
    /// Fails if `text` is not a valid encoding.
    fn deserialize_columns(&self, text: &str) -> Result<Vec<String>>;

    /// Decodes a foreign key list.
    ///
    /// # Errors
    ///
    /// Fails if `text` is not a valid encoding.
    fn deserialize_foreign_keys(&self, text: &str) -> Result<Vec<ForeignKeySchema>>;

    /// Encodes a column-name list.
    ///
    /// # Errors
    ///
    /// Fails if encoding fails.
    fn serialize_columns(&self, columns: &[String]) -> Result<String>;

    /// Encodes a foreign key list.
    ///
    /// # Errors
    ///
    /// Fails if encoding fails.
    fn serialize_foreign_keys(&self, foreign_keys: &[ForeignKeySchema]) -> Result<String>;
}

/// JSON snapshots via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaSerializer;

impl JsonSchemaSerializer {
    /// Creates a JSON serializer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SchemaSerializer for JsonSchemaSerializer {
    fn deserialize_columns(&self, text: &str) -> Result<Vec<String>> {
        Ok(serde_json::from_str(text)?)
    }

    fn deserialize_foreign_keys(&self, text: &str) -> Result<Vec<ForeignKeySchema>> {
        Ok(serde_json::from_str(text)?)
    }

    fn serialize_columns(&self, columns: &[String]) -> Result<String> {
        Ok(serde_json::to_string(columns)?)
    }

    fn serialize_foreign_keys(&self, foreign_keys: &[ForeignKeySchema]) -> Result<String> {
        Ok(serde_json::to_string(foreign_keys)?)
    }
}

/// Loads a JSON-encoded migration set from `path`.
///
/// # Errors
///
/// Fails on I/O errors, malformed JSON, or a set that violates its invariants.
pub fn load_migration_set(path: impl AsRef<Path>) -> Result<MigrationSet> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let set: MigrationSet = serde_json::from_str(&text)?;
    info!(
        path = %path.display(),
        db_version = set.db_version(),
        tables = set.target_schema().len(),
        "loaded migration set"
    );
    Ok(set)
}
