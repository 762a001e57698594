use serde::{Deserialize, Serialize};

/// Ownership semantics of an FK path between an owned table and its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// The owned row cannot outlive its single owner.
    Composition,
    /// The owned row may be shared and goes away with its last owner.
    Aggregation,
    Association,
    None,
}

impl RelationKind {
    pub fn is_owning(self) -> bool {
        matches!(self, Self::Composition | Self::Aggregation)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Composition => write!(f, "composition"),
            Self::Aggregation => write!(f, "aggregation"),
            Self::Association => write!(f, "association"),
            Self::None => write!(f, "none"),
        }
    }
}

/// An explicit ownership fact for an (owned, owner) table pair.
///
/// `link` narrows the record to one FK column or join table; a record without
/// a link applies to every path between the two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub child: String,
    pub parent: String,
    #[serde(default)]
    pub link: Option<String>,
    pub kind: RelationKind,
}

impl OwnershipRecord {
    pub fn new(child: &str, parent: &str, link: Option<&str>, kind: RelationKind) -> Self {
        Self {
            child: child.to_string(),
            parent: parent.to_string(),
            link: link.map(str::to_string),
            kind,
        }
    }

    pub fn covers_pair(&self, child: &str, parent: &str) -> bool {
        self.child.eq_ignore_ascii_case(child) && self.parent.eq_ignore_ascii_case(parent)
    }

    pub fn has_link(&self, link: &str) -> bool {
        self.link
            .as_deref()
            .is_some_and(|l| l.eq_ignore_ascii_case(link))
    }

    pub fn is_generic(&self) -> bool {
        self.link.is_none()
    }
}
