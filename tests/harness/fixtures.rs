use adedel::domain::{FkAction, OwnershipRecord, RelationKind, SchemaGraph, Table};

pub const SCHEMA: &str = "citydb";

pub const BUILDING_CLASS: i32 = 26;
pub const THEMATIC_SURFACE_CLASS: i32 = 33;
pub const OPENING_CLASS: i32 = 39;
pub const ADE_BUILDING_CLASS: i32 = 10001;

fn table(name: &str) -> Table {
    Table::new(SCHEMA, name)
        .with_column("id", "integer", false)
        .with_primary_key(&["id"])
}

/// A feature table whose rows are also cityobjects.
fn feature(name: &str, classes: &[i32]) -> Table {
    table(name)
        .with_foreign_key("id", "cityobject", "id", FkAction::NoAction)
        .with_objectclasses(classes)
}

/// Core building model: a cityobject supertype with buildings, thematic
/// surfaces and openings, shared addresses and geometry trees.
pub fn citydb() -> SchemaGraph {
    SchemaGraph::new(SCHEMA)
        .with_table(table("cityobject").with_column("objectclass_id", "integer", false))
        .with_table(
            table("surface_geometry")
                .with_column("parent_id", "integer", true)
                .with_foreign_key("parent_id", "surface_geometry", "id", FkAction::NoAction),
        )
        .with_table(table("tag"))
        .with_table(table("address").with_column("street", "varchar(1000)", true))
        .with_table(
            feature("building", &[BUILDING_CLASS])
                .with_column("building_parent_id", "integer", true)
                .with_column("lod2_multi_surface_id", "integer", true)
                .with_column("tag_id", "integer", true)
                .with_foreign_key("building_parent_id", "building", "id", FkAction::NoAction)
                .with_foreign_key("lod2_multi_surface_id", "surface_geometry", "id", FkAction::NoAction)
                .with_foreign_key("tag_id", "tag", "id", FkAction::NoAction),
        )
        .with_table(
            feature("thematic_surface", &[THEMATIC_SURFACE_CLASS])
                .with_column("building_id", "integer", true)
                .with_column("lod2_multi_surface_id", "integer", true)
                .with_foreign_key("building_id", "building", "id", FkAction::NoAction)
                .with_foreign_key("lod2_multi_surface_id", "surface_geometry", "id", FkAction::NoAction),
        )
        .with_table(
            feature("opening", &[OPENING_CLASS])
                .with_column("address_id", "integer", true)
                .with_column("lod2_multi_surface_id", "integer", true)
                .with_foreign_key("address_id", "address", "id", FkAction::NoAction)
                .with_foreign_key("lod2_multi_surface_id", "surface_geometry", "id", FkAction::NoAction),
        )
        .with_table(
            Table::new(SCHEMA, "opening_to_them_surface")
                .with_column("opening_id", "integer", false)
                .with_column("thematic_surface_id", "integer", false)
                .with_primary_key(&["opening_id", "thematic_surface_id"])
                .with_foreign_key("opening_id", "opening", "id", FkAction::NoAction)
                .with_foreign_key("thematic_surface_id", "thematic_surface", "id", FkAction::NoAction),
        )
        .with_table(
            Table::new(SCHEMA, "address_to_building")
                .with_column("building_id", "integer", false)
                .with_column("address_id", "integer", false)
                .with_primary_key(&["building_id", "address_id"])
                .with_foreign_key("building_id", "building", "id", FkAction::NoAction)
                .with_foreign_key("address_id", "address", "id", FkAction::NoAction),
        )
        .with_table(
            table("observation")
                .with_column("building_id", "integer", true)
                .with_foreign_key("building_id", "building", "id", FkAction::SetNull),
        )
}

/// The core model extended by an ADE: a typed building subclass, an untyped
/// extension table and a composed noise component.
pub fn citydb_with_ade() -> SchemaGraph {
    citydb()
        .with_table(
            table("ade_building")
                .with_column("noise_level", "integer", true)
                .with_foreign_key("id", "building", "id", FkAction::NoAction)
                .with_objectclasses(&[ADE_BUILDING_CLASS]),
        )
        .with_table(
            table("building_ext")
                .with_column("energy_class", "integer", true)
                .with_foreign_key("id", "building", "id", FkAction::NoAction),
        )
        .with_table(
            table("ade_noise")
                .with_column("building_id", "integer", false)
                .with_foreign_key("building_id", "building", "id", FkAction::NoAction),
        )
}

pub fn ade_records() -> Vec<OwnershipRecord> {
    vec![OwnershipRecord::new(
        "ade_noise",
        "building",
        Some("building_id"),
        RelationKind::Composition,
    )]
}

/// Two composed tables whose names agree well past Oracle's identifier limit.
pub fn long_named_components() -> (SchemaGraph, Vec<OwnershipRecord>) {
    let names = [
        "noise_city_furniture_segment_geometry",
        "noise_city_furniture_segment_property",
    ];
    let mut schema = citydb();
    let mut records = Vec::new();
    for name in names {
        schema = schema.with_table(
            table(name)
                .with_column("building_id", "integer", false)
                .with_foreign_key("building_id", "building", "id", FkAction::NoAction),
        );
        records.push(OwnershipRecord::new(
            name,
            "building",
            Some("building_id"),
            RelationKind::Composition,
        ));
    }
    (schema, records)
}

/// Geometry aggregated by buildings and thematic surfaces, so that a surface
/// of another building can share it.
pub fn shared_geometry_records() -> Vec<OwnershipRecord> {
    let mut records = ade_records();
    for owner in ["building", "thematic_surface"] {
        records.push(OwnershipRecord::new(
            "surface_geometry",
            owner,
            Some("lod2_multi_surface_id"),
            RelationKind::Aggregation,
        ));
    }
    records
}

/// An ADE solar panel held by its building and optionally mounted on a
/// thematic surface; both links are nullable aggregations.
pub fn citydb_with_solar_panels() -> (SchemaGraph, Vec<OwnershipRecord>) {
    let schema = citydb_with_ade().with_table(
        table("ade_solar_panel")
            .with_column("building_id", "integer", true)
            .with_column("thematic_surface_id", "integer", true)
            .with_foreign_key("building_id", "building", "id", FkAction::NoAction)
            .with_foreign_key("thematic_surface_id", "thematic_surface", "id", FkAction::NoAction),
    );
    let mut records = ade_records();
    for (owner, link) in [("building", "building_id"), ("thematic_surface", "thematic_surface_id")] {
        records.push(OwnershipRecord::new(
            "ade_solar_panel",
            owner,
            Some(link),
            RelationKind::Aggregation,
        ));
    }
    (schema, records)
}

/// Two tables owning each other through nullable links.
pub fn mutual_owners() -> (SchemaGraph, Vec<OwnershipRecord>) {
    let schema = SchemaGraph::new(SCHEMA)
        .with_table(
            table("a")
                .with_column("b_id", "integer", true)
                .with_foreign_key("b_id", "b", "id", FkAction::NoAction),
        )
        .with_table(
            table("b")
                .with_column("a_id", "integer", true)
                .with_foreign_key("a_id", "a", "id", FkAction::NoAction),
        );
    let records = vec![
        OwnershipRecord::new("b", "a", Some("a_id"), RelationKind::Composition),
        OwnershipRecord::new("a", "b", Some("b_id"), RelationKind::Composition),
    ];
    (schema, records)
}
