//! SQL backends for the abstract delete functions.

pub mod oracle;
pub mod postgres;

use crate::app::ports::{DeleteDialect, DialectUnsupported, EmitContext};
use crate::domain::{Block, DatabaseKind, DeleteFunction, TableRef};

pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;

pub fn dialect_for(kind: DatabaseKind) -> Result<Box<dyn DeleteDialect>, DialectUnsupported> {
    match kind {
        DatabaseKind::PostgreSql => Ok(Box::new(PostgresDialect)),
        DatabaseKind::Oracle => Ok(Box::new(OracleDialect)),
        DatabaseKind::MySql => Err(DialectUnsupported(kind)),
    }
}

/// Table name as written in generated SQL. Tables without a schema of their
/// own live in the target schema.
pub(crate) fn table_name(ctx: &EmitContext, table: &TableRef) -> String {
    let schema = if table.schema.is_empty() {
        ctx.schema.as_str()
    } else {
        table.schema.as_str()
    };
    if schema.is_empty() {
        table.name.to_lowercase()
    } else {
        format!("{}.{}", schema.to_lowercase(), table.name.to_lowercase())
    }
}

pub(crate) fn class_list(ids: &[i32]) -> String {
    ids.iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Local variables a function body needs beyond the result collections.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BodyNeeds {
    pub candidates: bool,
    pub dispatch: bool,
    pub refs: usize,
}

impl BodyNeeds {
    pub fn of(function: &DeleteFunction) -> Self {
        let mut needs = Self::default();
        for block in &function.blocks {
            match block {
                Block::SelfParts(_) | Block::BridgeCascade(_) => needs.candidates = true,
                Block::ChildCascade(b) => needs.candidates |= b.detach || b.owner_check.is_some(),
                Block::SubtypeDispatch(_) => needs.dispatch = true,
                Block::LocalDelete(b) => needs.refs = b.captured.len(),
                Block::ReferencedCleanup(_) | Block::ParentCascade(_) => {}
            }
        }
        needs
    }
}
