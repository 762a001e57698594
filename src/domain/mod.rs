pub mod caller;
pub mod column;
pub mod database;
pub mod foreign_key;
pub mod function;
pub mod relation;
pub mod schema;
pub mod table;

pub use caller::Caller;
pub use column::Column;
pub use database::{DatabaseKind, UnknownDatabaseKind};
pub use foreign_key::{
    BridgeEntry, ChildEdge, ChildShape, FkAction, ForeignKey, ForeignKeyEdge, ReferencedEntry,
};
pub use function::{
    Block, BlockKind, BridgeCascadeBlock, Callee, ChildCascadeBlock, DeleteFunction,
    Discriminator, LocalDeleteBlock, OwnerCheck, OwnerRef, ParentCascadeBlock,
    ReferencedCleanupBlock, SelfPartsBlock, SubtypeCase, SubtypeDispatchBlock,
};
pub use relation::{OwnershipRecord, RelationKind};
pub use schema::SchemaGraph;
pub use table::{Table, TableRef};
