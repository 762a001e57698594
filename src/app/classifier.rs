//! Ownership classification backed by explicit records with a static
//! fallback for the core city model tables.

use std::sync::LazyLock;

use tracing::trace;

use crate::domain::{OwnershipRecord, RelationKind, TableRef};
use crate::ports::{ClassifyError, RelationClassifier};

use RelationKind::{Aggregation, Composition};

/// Well-known ownership facts of the core schema. Geometry references are
/// generic (no link) because every geometry column of a feature owns its tree.
const BUILTIN: &[(&str, &str, Option<&str>, RelationKind)] = &[
    ("cityobject_genericattrib", "cityobject", Some("cityobject_id"), Composition),
    ("cityobject_genericattrib", "cityobject_genericattrib", Some("parent_genattrib_id"), Composition),
    ("external_reference", "cityobject", Some("cityobject_id"), Composition),
    ("appearance", "cityobject", Some("cityobject_id"), Composition),
    ("surface_data", "appearance", Some("appear_to_surface_data"), Aggregation),
    ("textureparam", "surface_data", Some("surface_data_id"), Composition),
    ("tex_image", "surface_data", Some("tex_image_id"), Aggregation),
    ("surface_geometry", "surface_geometry", Some("parent_id"), Composition),
    ("surface_geometry", "cityobject", None, Composition),
    ("surface_geometry", "building", None, Composition),
    ("surface_geometry", "building_installation", None, Composition),
    ("surface_geometry", "thematic_surface", None, Composition),
    ("surface_geometry", "opening", None, Composition),
    ("surface_geometry", "room", None, Composition),
    ("surface_geometry", "building_furniture", None, Composition),
    ("surface_geometry", "implicit_geometry", None, Composition),
    ("building", "building", Some("building_parent_id"), Composition),
    ("building_installation", "building", Some("building_id"), Composition),
    ("building_installation", "room", Some("room_id"), Composition),
    ("thematic_surface", "building", Some("building_id"), Composition),
    ("thematic_surface", "room", Some("room_id"), Composition),
    ("thematic_surface", "building_installation", Some("building_installation_id"), Composition),
    ("opening", "thematic_surface", Some("opening_to_them_surface"), Composition),
    ("room", "building", Some("building_id"), Composition),
    ("building_furniture", "room", Some("room_id"), Composition),
    ("address", "building", Some("address_to_building"), Aggregation),
    ("address", "opening", Some("address_id"), Aggregation),
    ("implicit_geometry", "building_installation", None, Aggregation),
    ("implicit_geometry", "opening", None, Aggregation),
    ("implicit_geometry", "building_furniture", None, Aggregation),
];

static BUILTIN_RECORDS: LazyLock<Vec<OwnershipRecord>> = LazyLock::new(|| {
    BUILTIN
        .iter()
        .map(|(child, parent, link, kind)| OwnershipRecord::new(child, parent, *link, *kind))
        .collect()
});

pub fn builtin_records() -> &'static [OwnershipRecord] {
    &BUILTIN_RECORDS
}

/// Classifies FK paths using explicit ownership records first and the
/// built-in table second. Anything unmatched is `None`.
#[derive(Debug, Clone, Default)]
pub struct OwnershipClassifier {
    records: Vec<OwnershipRecord>,
    skip_builtin: bool,
}

impl OwnershipClassifier {
    pub fn new(records: Vec<OwnershipRecord>) -> Self {
        Self {
            records,
            skip_builtin: false,
        }
    }

    /// Uses only the given records, ignoring the core schema facts.
    pub fn explicit_only(records: Vec<OwnershipRecord>) -> Self {
        Self {
            records,
            skip_builtin: true,
        }
    }
}

impl RelationClassifier for OwnershipClassifier {
    fn classify(
        &self,
        child: &TableRef,
        parent: &TableRef,
        link: Option<&str>,
    ) -> Result<RelationKind, ClassifyError> {
        let explicit = lookup(&self.records, child, parent, link)?;
        let kind = match explicit {
            Some(kind) => kind,
            None if !self.skip_builtin => {
                lookup(builtin_records(), child, parent, link)?.unwrap_or(RelationKind::None)
            }
            None => RelationKind::None,
        };

        trace!(
            child = %child,
            parent = %parent,
            link = link.unwrap_or("-"),
            %kind,
            "classified relation"
        );
        Ok(kind)
    }
}

/// Link-specific records win over generic ones within the same record set.
fn lookup(
    records: &[OwnershipRecord],
    child: &TableRef,
    parent: &TableRef,
    link: Option<&str>,
) -> Result<Option<RelationKind>, ClassifyError> {
    let pair: Vec<&OwnershipRecord> = records
        .iter()
        .filter(|r| r.covers_pair(&child.name, &parent.name))
        .collect();

    if let Some(link) = link {
        let specific = pair.iter().copied().filter(|r| r.has_link(link));
        if let Some(kind) = agree(specific, child, parent, Some(link))? {
            return Ok(Some(kind));
        }
    }

    agree(
        pair.iter().copied().filter(|r| r.is_generic()),
        child,
        parent,
        None,
    )
}

fn agree<'a>(
    mut matches: impl Iterator<Item = &'a OwnershipRecord>,
    child: &TableRef,
    parent: &TableRef,
    link: Option<&str>,
) -> Result<Option<RelationKind>, ClassifyError> {
    let Some(first) = matches.next() else {
        return Ok(None);
    };

    if let Some(other) = matches.find(|r| r.kind != first.kind) {
        return Err(ClassifyError::Ambiguous {
            child: child.name.clone(),
            parent: parent.name.clone(),
            link: link.map(str::to_string),
            first: first.kind,
            second: other.kind,
        });
    }

    Ok(Some(first.kind))
}
