//! Dialect-neutral description of a generated delete function.
//!
//! A function body is an ordered list of blocks. The order is fixed by the
//! synthesizer: self parts, child cascades, subtype dispatch, local delete,
//! referenced cleanup, parent cascade. Emitters render each block in turn.

use super::table::TableRef;

/// A call target inside a generated body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callee {
    pub table: TableRef,
    pub function: String,
}

/// One way a row can still be owned by something that is not being deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerRef {
    /// The owned row points at an owner through one of its own columns.
    OwnColumn { column: String },
    /// Rows of another table point at the owned row.
    Referencing { table: TableRef, column: String },
}

/// Anti-join applied to candidate ids before they are deleted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnerCheck {
    pub owners: Vec<OwnerRef>,
}

impl OwnerCheck {
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfPartsBlock {
    pub column: String,
    /// Set the link to NULL before recursing, so rows whose parents loop
    /// back cannot be selected again.
    pub detach: bool,
    pub callee: Callee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCascadeBlock {
    pub child: TableRef,
    pub child_key: String,
    pub column: String,
    /// Set the link to NULL before checking for remaining owners and
    /// recursing. Used for shared children and for links on an ownership cycle.
    pub detach: bool,
    pub owner_check: Option<OwnerCheck>,
    pub callee: Callee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeCascadeBlock {
    pub bridge: TableRef,
    pub root_column: String,
    pub m_column: String,
    pub target: TableRef,
    pub target_key: String,
    pub owner_check: Option<OwnerCheck>,
    /// `None` when the far side is not owned: only the link rows go.
    pub callee: Option<Callee>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    pub table: TableRef,
    pub key_column: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypeCase {
    pub objectclass_ids: Vec<i32>,
    pub callee: Callee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypeDispatchBlock {
    pub discriminator: Option<Discriminator>,
    pub cases: Vec<SubtypeCase>,
    /// Is-a tables without object classes of their own, deleted for every id.
    pub hooks: Vec<Callee>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDeleteBlock {
    /// FK columns whose values are captured from the deleted rows, addressed by slot.
    pub captured: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedCleanupBlock {
    pub column: String,
    /// Index into `LocalDeleteBlock::captured`.
    pub slot: usize,
    pub target: TableRef,
    pub target_key: String,
    pub owner_check: Option<OwnerCheck>,
    pub callee: Callee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentCascadeBlock {
    pub callee: Callee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    SelfParts(SelfPartsBlock),
    ChildCascade(ChildCascadeBlock),
    BridgeCascade(BridgeCascadeBlock),
    SubtypeDispatch(SubtypeDispatchBlock),
    LocalDelete(LocalDeleteBlock),
    ReferencedCleanup(ReferencedCleanupBlock),
    ParentCascade(ParentCascadeBlock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    SelfParts,
    ChildCascade,
    SubtypeDispatch,
    LocalDelete,
    ReferencedCleanup,
    ParentCascade,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::SelfParts(_) => BlockKind::SelfParts,
            Self::ChildCascade(_) | Self::BridgeCascade(_) => BlockKind::ChildCascade,
            Self::SubtypeDispatch(_) => BlockKind::SubtypeDispatch,
            Self::LocalDelete(_) => BlockKind::LocalDelete,
            Self::ReferencedCleanup(_) => BlockKind::ReferencedCleanup,
            Self::ParentCascade(_) => BlockKind::ParentCascade,
        }
    }

    pub fn callees(&self) -> Vec<&Callee> {
        match self {
            Self::SelfParts(b) => vec![&b.callee],
            Self::ChildCascade(b) => vec![&b.callee],
            Self::BridgeCascade(b) => b.callee.iter().collect(),
            Self::SubtypeDispatch(b) => b
                .cases
                .iter()
                .map(|c| &c.callee)
                .chain(b.hooks.iter())
                .collect(),
            Self::LocalDelete(_) => vec![],
            Self::ReferencedCleanup(b) => vec![&b.callee],
            Self::ParentCascade(b) => vec![&b.callee],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFunction {
    pub table: TableRef,
    pub name: String,
    pub key_column: String,
    pub blocks: Vec<Block>,
}

impl DeleteFunction {
    pub fn placeholder(table: TableRef, name: String) -> Self {
        Self {
            table,
            name,
            key_column: String::new(),
            blocks: Vec::new(),
        }
    }

    pub fn callees(&self) -> impl Iterator<Item = &Callee> {
        self.blocks.iter().flat_map(Block::callees)
    }

    pub fn local_delete(&self) -> Option<&LocalDeleteBlock> {
        self.blocks.iter().find_map(|b| match b {
            Block::LocalDelete(local) => Some(local),
            _ => None,
        })
    }

    pub fn subtype_dispatch(&self) -> Option<&SubtypeDispatchBlock> {
        self.blocks.iter().find_map(|b| match b {
            Block::SubtypeDispatch(dispatch) => Some(dispatch),
            _ => None,
        })
    }

    pub fn parent_cascade(&self) -> Option<&ParentCascadeBlock> {
        self.blocks.iter().find_map(|b| match b {
            Block::ParentCascade(parent) => Some(parent),
            _ => None,
        })
    }

    pub fn has_owner_checks(&self) -> bool {
        self.blocks.iter().any(|b| match b {
            Block::ChildCascade(c) => c.owner_check.is_some() || c.detach,
            Block::BridgeCascade(b) => b.owner_check.is_some(),
            _ => false,
        })
    }

    pub fn block_kinds(&self) -> Vec<BlockKind> {
        self.blocks.iter().map(Block::kind).collect()
    }
}
