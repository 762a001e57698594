use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::app::ports::{IntrospectionError, SchemaSource};
use crate::domain::{OwnershipRecord, SchemaGraph};

/// Schema snapshot stored as JSON, e.g. the output of the upstream
/// schema transformation.
pub struct JsonSnapshotSource {
    path: PathBuf,
}

impl JsonSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(json: &str, schema: &str) -> Result<SchemaGraph, IntrospectionError> {
        let mut graph: SchemaGraph =
            serde_json::from_str(json).map_err(|e| IntrospectionError::InvalidJson(e.to_string()))?;

        if graph.name.is_empty() {
            graph.name = schema.to_string();
        } else if !graph.name.eq_ignore_ascii_case(schema) {
            return Err(IntrospectionError::SchemaMismatch {
                expected: schema.to_string(),
                found: graph.name,
            });
        }

        for table in &mut graph.tables {
            if table.schema.is_empty() {
                table.schema = graph.name.clone();
            }
            for fk in &mut table.foreign_keys {
                if fk.from_schema.is_empty() {
                    fk.from_schema = graph.name.clone();
                }
                if fk.to_schema.is_empty() {
                    fk.to_schema = graph.name.clone();
                }
            }
        }
        Ok(graph)
    }

    async fn read(&self) -> Result<String, IntrospectionError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| IntrospectionError::Io(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl SchemaSource for JsonSnapshotSource {
    async fn load_schema(&self, schema: &str) -> Result<SchemaGraph, IntrospectionError> {
        let graph = Self::parse(&self.read().await?, schema)?;
        info!(
            path = %self.path.display(),
            tables = graph.table_count(),
            "snapshot loaded"
        );
        Ok(graph)
    }

    async fn load_ownership(&self, schema: &str) -> Result<Vec<OwnershipRecord>, IntrospectionError> {
        Ok(Self::parse(&self.read().await?, schema)?.ownership)
    }
}
