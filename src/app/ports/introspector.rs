use std::collections::BTreeMap;

use crate::domain::{ChildEdge, ForeignKeyEdge, ReferencedEntry, TableRef};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntrospectionError {
    #[error("table not found: {0}")]
    UnknownTable(String),
    #[error("table {0} has no single-column primary key")]
    MissingPrimaryKey(String),
    #[error("foreign key {name} on {table} spans several columns")]
    CompositeForeignKey { name: String, table: String },
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("snapshot describes schema {found}, expected {expected}")]
    SchemaMismatch { expected: String, found: String },
    #[error("operation timed out")]
    Timeout,
}

/// Read-only FK queries the synthesizer issues against one table at a time.
#[cfg_attr(test, mockall::automock)]
pub trait SchemaIntrospector {
    fn primary_key_column(&self, table: &TableRef) -> Result<String, IntrospectionError>;

    fn has_column(&self, table: &TableRef, column: &str) -> Result<bool, IntrospectionError>;

    /// FKs of `table` pointing back at `table`.
    fn self_referencing_foreign_keys(
        &self,
        table: &TableRef,
    ) -> Result<Vec<ForeignKeyEdge>, IntrospectionError>;

    /// FKs of other tables pointing at `table`, with M:N bridge detection.
    /// Is-a links (FK column = the child's primary key) are included.
    fn child_foreign_keys(&self, table: &TableRef) -> Result<Vec<ChildEdge>, IntrospectionError>;

    /// The is-a link of `table` toward its supertype, if any.
    fn parent_foreign_key(
        &self,
        table: &TableRef,
    ) -> Result<Option<ForeignKeyEdge>, IntrospectionError>;

    /// FKs of `table` pointing at other tables, excluding the is-a parent.
    fn referenced_tables(
        &self,
        table: &TableRef,
    ) -> Result<Vec<ReferencedEntry>, IntrospectionError>;

    /// Object class id to the direct subtype table storing that class.
    fn direct_subtype_tables(
        &self,
        table: &TableRef,
    ) -> Result<BTreeMap<i32, TableRef>, IntrospectionError>;
}
