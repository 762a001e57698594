use crate::domain::{RelationKind, TableRef};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("conflicting ownership records for {child} -> {parent}{}: {first} vs {second}", link_suffix(.link))]
    Ambiguous {
        child: String,
        parent: String,
        link: Option<String>,
        first: RelationKind,
        second: RelationKind,
    },
    #[error("ownership lookup failed: {0}")]
    LookupFailed(String),
}

fn link_suffix(link: &Option<String>) -> String {
    link.as_ref().map(|l| format!(" via {}", l)).unwrap_or_default()
}

/// Decides how the rows of `child` are owned by `parent` along `link`.
///
/// `link` is the FK column of the path, or the join table name for M:N paths.
pub trait RelationClassifier {
    fn classify(
        &self,
        child: &TableRef,
        parent: &TableRef,
        link: Option<&str>,
    ) -> Result<RelationKind, ClassifyError>;
}
