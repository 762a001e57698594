use serde::{Deserialize, Serialize};

use super::table::TableRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    #[serde(default)]
    pub from_schema: String,
    pub from_table: String,
    pub from_columns: Vec<String>,
    #[serde(default)]
    pub to_schema: String,
    pub to_table: String,
    pub to_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: FkAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKey {
    pub fn referenced_table(&self) -> String {
        self.target().qualified_name()
    }

    pub fn source(&self) -> TableRef {
        TableRef::new(self.from_schema.clone(), self.from_table.clone())
    }

    pub fn target(&self) -> TableRef {
        TableRef::new(self.to_schema.clone(), self.to_table.clone())
    }

    pub fn is_single_column(&self) -> bool {
        self.from_columns.len() == 1 && self.to_columns.len() == 1
    }
}

impl std::fmt::Display for FkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FkAction::NoAction => write!(f, "NO ACTION"),
            FkAction::Restrict => write!(f, "RESTRICT"),
            FkAction::Cascade => write!(f, "CASCADE"),
            FkAction::SetNull => write!(f, "SET NULL"),
            FkAction::SetDefault => write!(f, "SET DEFAULT"),
        }
    }
}

/// A resolved single-column FK, directed from the child (referencing) row to
/// the parent (referenced) row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyEdge {
    pub child: TableRef,
    pub child_column: String,
    pub parent: TableRef,
    pub parent_column: String,
    pub nullable: bool,
    /// The child column is the child's whole primary key (is-a / hook link).
    pub child_is_key: bool,
    pub on_delete: FkAction,
}

impl ForeignKeyEdge {
    pub fn is_self_reference(&self) -> bool {
        self.child == self.parent
    }
}

impl std::fmt::Display for ForeignKeyEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.child, self.child_column, self.parent, self.parent_column
        )
    }
}

/// FK facts pointing away from a table.
pub type ReferencedEntry = ForeignKeyEdge;

/// An M:N link table whose two-column primary key is made of two not-null FKs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEntry {
    pub bridge: TableRef,
    /// Column pointing at the table whose rows are being deleted.
    pub root_column: String,
    /// Column pointing at the far ("M") side.
    pub m_column: String,
    pub m_table: TableRef,
    pub m_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildShape {
    Plain,
    Bridge(BridgeEntry),
    /// Looks like a link table but its primary key is not the FK pair.
    SuspectedBridge { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEdge {
    pub edge: ForeignKeyEdge,
    pub shape: ChildShape,
}

impl ChildEdge {
    pub fn plain(edge: ForeignKeyEdge) -> Self {
        Self {
            edge,
            shape: ChildShape::Plain,
        }
    }

    pub fn bridge(&self) -> Option<&BridgeEntry> {
        match &self.shape {
            ChildShape::Bridge(entry) => Some(entry),
            _ => None,
        }
    }
}
