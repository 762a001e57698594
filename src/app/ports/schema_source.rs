use async_trait::async_trait;

use crate::domain::{OwnershipRecord, SchemaGraph};

use super::introspector::IntrospectionError;

/// Produces a complete schema snapshot; partial snapshots are never returned.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn load_schema(&self, schema: &str) -> Result<SchemaGraph, IntrospectionError>;

    async fn load_ownership(&self, schema: &str)
    -> Result<Vec<OwnershipRecord>, IntrospectionError>;
}
