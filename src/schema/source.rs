use std::path::{Path, PathBuf};

use super::{Schema, SchemaError};

/// Where the pipeline loads its schema from at the start of each run.
pub trait SchemaSource {
    fn load(&self) -> Result<Schema, SchemaError>;
}

/// Reads and validates a `questions.json` file on every load, so operator
/// edits take effect on the next request without a restart.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SchemaSource for JsonFileSource {
    fn load(&self) -> Result<Schema, SchemaError> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SchemaError::NotFound(self.path.clone())
            } else {
                SchemaError::Read {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;

        let schema = Schema::from_json(&json)?;
        tracing::debug!(
            path = %self.path.display(),
            metadata_fields = schema.metadata_fields.len(),
            ai_inferred_fields = schema.ai_inferred_fields.len(),
            categories = schema.categories.len(),
            "Schema loaded"
        );
        Ok(schema)
    }
}

/// Fixed in-memory schema (tests, embedding callers).
pub struct StaticSchemaSource {
    schema: Schema,
}

impl StaticSchemaSource {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

impl SchemaSource for StaticSchemaSource {
    fn load(&self) -> Result<Schema, SchemaError> {
        Ok(self.schema.clone())
    }
}
