//! Runs synthesized functions against an in-memory store seeded with a
//! small city model and checks which rows survive.

mod harness;

use adedel::app::simulator::{InMemoryDatabase, SimulationError, Simulator};
use adedel::domain::{Caller, FkAction, Table};
use harness::fixtures::{
    ADE_BUILDING_CLASS, BUILDING_CLASS, OPENING_CLASS, SCHEMA, THEMATIC_SURFACE_CLASS, ade_records,
    citydb_with_ade, citydb_with_solar_panels, mutual_owners, shared_geometry_records,
};
use harness::{called, calls, insert_feature, insert_geometry, simulator};

/// Building 1 with a part (4), a wall (10) holding a window (20), three
/// addresses and an ADE extension. Building 3 shares address 50, building 2
/// is an ADE building.
fn seeded() -> Simulator {
    let mut sim = simulator(citydb_with_ade(), ade_records(), "cityobject");
    let db = sim.database_mut();

    insert_geometry(db, 100, &[101, 102]);
    insert_geometry(db, 200, &[201]);
    insert_geometry(db, 300, &[]);
    insert_geometry(db, 400, &[401]);
    db.insert("tag", &[("id", 7)]).unwrap();
    for id in [50, 51, 52] {
        db.insert("address", &[("id", id)]).unwrap();
    }

    insert_feature(db, "building", BUILDING_CLASS, 1, &[("lod2_multi_surface_id", 100), ("tag_id", 7)]);
    insert_feature(db, "building", BUILDING_CLASS, 3, &[("lod2_multi_surface_id", 400)]);
    insert_feature(db, "building", BUILDING_CLASS, 4, &[("building_parent_id", 1)]);
    insert_feature(db, "building", ADE_BUILDING_CLASS, 2, &[]);
    db.insert("ade_building", &[("id", 2), ("noise_level", 55)]).unwrap();
    db.insert("building_ext", &[("id", 1), ("energy_class", 2)]).unwrap();
    db.insert("building_ext", &[("id", 2), ("energy_class", 4)]).unwrap();
    db.insert("ade_noise", &[("id", 70), ("building_id", 1)]).unwrap();

    insert_feature(
        db,
        "thematic_surface",
        THEMATIC_SURFACE_CLASS,
        10,
        &[("building_id", 1), ("lod2_multi_surface_id", 200)],
    );
    insert_feature(
        db,
        "opening",
        OPENING_CLASS,
        20,
        &[("address_id", 52), ("lod2_multi_surface_id", 300)],
    );
    db.insert("opening_to_them_surface", &[("opening_id", 20), ("thematic_surface_id", 10)])
        .unwrap();

    for (building, address) in [(1, 50), (1, 51), (3, 50)] {
        db.insert("address_to_building", &[("building_id", building), ("address_id", address)])
            .unwrap();
    }
    db.insert("observation", &[("id", 60), ("building_id", 1)]).unwrap();

    sim
}

fn bridge_links(db: &InMemoryDatabase) -> Vec<(i64, i64)> {
    db.rows("address_to_building")
        .iter()
        .filter_map(|r| Some((r.get("building_id")?, r.get("address_id")?)))
        .collect()
}

mod ownership {
    use super::*;

    #[test]
    fn deleting_a_building_removes_everything_it_owns() {
        let mut sim = seeded();

        let deleted = sim.delete("del_cityobject", &[1]).unwrap();

        assert_eq!(deleted, vec![1]);
        let db = sim.database();
        assert_eq!(db.ids("building"), vec![2, 3]);
        assert!(db.ids("thematic_surface").is_empty());
        assert!(db.ids("opening").is_empty());
        assert_eq!(db.count("opening_to_them_surface"), 0);
        assert_eq!(db.ids("cityobject"), vec![2, 3]);
        assert_eq!(db.ids("surface_geometry"), vec![400, 401]);
        assert_eq!(db.ids("building_ext"), vec![2]);
        assert!(db.ids("ade_noise").is_empty());
    }

    #[test]
    fn building_parts_go_with_their_building() {
        let mut sim = seeded();

        sim.delete("del_building", &[1]).unwrap();

        assert!(!sim.database().contains("building", 4));
        assert!(!sim.database().contains("cityobject", 4));
        assert!(
            calls(&sim).contains(&("del_building".to_string(), Caller::FromOwner)),
            "part deleted through the self reference"
        );
    }

    #[test]
    fn deleting_a_part_keeps_the_whole() {
        let mut sim = seeded();

        let deleted = sim.delete("del_building", &[4]).unwrap();

        assert_eq!(deleted, vec![4]);
        assert!(sim.database().contains("building", 1));
        assert!(sim.database().contains("cityobject", 1));
    }

    #[test]
    fn geometry_still_referenced_by_its_feature_cannot_go_alone() {
        let mut sim = seeded();

        let err = sim.delete("del_surface_geometry", &[100]).unwrap_err();

        assert!(matches!(err, SimulationError::ForeignKeyViolation { .. }));
        assert_eq!(sim.database().ids("surface_geometry").len(), 8);
    }
}

mod aggregation {
    use super::*;

    #[test]
    fn shared_address_survives_while_another_building_links_it() {
        let mut sim = seeded();

        sim.delete("del_building", &[1]).unwrap();

        let db = sim.database();
        assert!(db.contains("address", 50));
        assert!(!db.contains("address", 51));
        assert_eq!(bridge_links(db), vec![(3, 50)]);
    }

    #[test]
    fn last_owner_takes_the_shared_address_along() {
        let mut sim = seeded();

        sim.delete("del_building", &[1]).unwrap();
        sim.delete("del_building", &[3]).unwrap();

        let db = sim.database();
        assert!(db.ids("address").is_empty());
        assert!(bridge_links(db).is_empty());
    }

    #[test]
    fn deleting_both_owners_in_one_batch_removes_the_address() {
        let mut sim = seeded();

        sim.delete("del_building", &[1, 3]).unwrap();

        assert!(sim.database().ids("address").is_empty());
    }

    #[test]
    fn address_referenced_by_a_deleted_opening_is_cleaned_up() {
        let mut sim = seeded();

        sim.delete("del_opening", &[20]).unwrap();

        let db = sim.database();
        assert!(!db.contains("address", 52));
        assert!(!db.contains("surface_geometry", 300));
        assert!(db.contains("thematic_surface", 10));
        assert_eq!(db.count("opening_to_them_surface"), 0);
    }

    #[test]
    fn address_still_used_by_an_opening_is_kept() {
        let mut sim = seeded();
        let db = sim.database_mut();
        db.insert("address_to_building", &[("building_id", 3), ("address_id", 52)])
            .unwrap();

        sim.delete("del_building", &[3]).unwrap();

        assert!(sim.database().contains("address", 52));
        assert!(sim.database().contains("address", 50));
    }

    /// Building 1 and a surface of building 3 share geometry 100.
    fn shared_geometry() -> Simulator {
        let mut sim = simulator(citydb_with_ade(), shared_geometry_records(), "cityobject");
        let db = sim.database_mut();
        insert_geometry(db, 100, &[101]);
        insert_feature(db, "building", BUILDING_CLASS, 1, &[("lod2_multi_surface_id", 100)]);
        insert_feature(db, "building", BUILDING_CLASS, 3, &[]);
        insert_feature(
            db,
            "thematic_surface",
            THEMATIC_SURFACE_CLASS,
            10,
            &[("building_id", 3), ("lod2_multi_surface_id", 100)],
        );
        sim
    }

    #[test]
    fn geometry_shared_with_a_surviving_surface_is_kept() {
        let mut sim = shared_geometry();

        sim.delete("del_building", &[1]).unwrap();

        let db = sim.database();
        assert!(!db.contains("building", 1));
        assert_eq!(db.ids("surface_geometry"), vec![100, 101]);
        assert!(!called(&sim, "del_surface_geometry"));
    }

    #[test]
    fn geometry_goes_with_its_last_aggregating_feature() {
        let mut sim = shared_geometry();
        sim.delete("del_building", &[1]).unwrap();

        sim.delete("del_thematic_surface", &[10]).unwrap();

        assert!(sim.database().ids("surface_geometry").is_empty());
        assert!(called(&sim, "del_surface_geometry"));
    }

    #[test]
    fn geometry_shared_within_one_batch_is_deleted_once_unowned() {
        let mut sim = shared_geometry();

        sim.delete("del_cityobject", &[1, 10]).unwrap();

        let db = sim.database();
        assert!(db.ids("surface_geometry").is_empty());
        assert_eq!(db.ids("building"), vec![3]);
    }

    /// Panel 80 hangs on building 1 and the roof of building 3, panel 81
    /// only on building 1.
    fn solar_panels() -> Simulator {
        let (schema, records) = citydb_with_solar_panels();
        let mut sim = simulator(schema, records, "cityobject");
        let db = sim.database_mut();
        insert_feature(db, "building", BUILDING_CLASS, 1, &[]);
        insert_feature(db, "building", BUILDING_CLASS, 3, &[]);
        insert_feature(db, "thematic_surface", THEMATIC_SURFACE_CLASS, 10, &[("building_id", 3)]);
        db.insert(
            "ade_solar_panel",
            &[("id", 80), ("building_id", 1), ("thematic_surface_id", 10)],
        )
        .unwrap();
        db.insert("ade_solar_panel", &[("id", 81), ("building_id", 1)])
            .unwrap();
        sim
    }

    #[test]
    fn detached_child_survives_while_another_owner_holds_it() {
        let mut sim = solar_panels();

        sim.delete("del_building", &[1]).unwrap();

        let db = sim.database();
        assert_eq!(db.ids("ade_solar_panel"), vec![80]);
        assert_eq!(db.value("ade_solar_panel", 80, "building_id"), None);
        assert_eq!(db.value("ade_solar_panel", 80, "thematic_surface_id"), Some(10));
        let panel_calls: Vec<_> = sim
            .trace()
            .iter()
            .filter(|c| c.function == "del_ade_solar_panel")
            .map(|c| (c.caller, c.ids.clone()))
            .collect();
        assert_eq!(panel_calls, vec![(Caller::FromOwner, vec![81])]);
    }

    #[test]
    fn detached_child_goes_with_its_last_owner() {
        let mut sim = solar_panels();
        sim.delete("del_building", &[1]).unwrap();

        sim.delete("del_building", &[3]).unwrap();

        let db = sim.database();
        assert!(db.ids("ade_solar_panel").is_empty());
        assert!(db.ids("thematic_surface").is_empty());
    }
}

mod association {
    use super::*;

    #[test]
    fn referenced_tag_is_never_deleted() {
        let mut sim = seeded();

        sim.delete("del_building", &[1]).unwrap();

        assert!(sim.database().contains("tag", 7));
        assert!(!called(&sim, "del_tag"));
    }

    #[test]
    fn nullable_referencing_rows_are_detached_not_deleted() {
        let mut sim = seeded();

        sim.delete("del_building", &[1]).unwrap();

        let db = sim.database();
        assert!(db.contains("observation", 60));
        assert_eq!(db.value("observation", 60, "building_id"), None);
    }

    #[test]
    fn unowned_restricting_reference_aborts_the_whole_delete() {
        let schema = citydb_with_ade().with_table(
            Table::new(SCHEMA, "inspection")
                .with_column("id", "integer", false)
                .with_column("building_id", "integer", false)
                .with_primary_key(&["id"])
                .with_foreign_key("building_id", "building", "id", FkAction::NoAction),
        );
        let mut sim = simulator(schema, ade_records(), "cityobject");
        let db = sim.database_mut();
        insert_feature(db, "building", BUILDING_CLASS, 1, &[]);
        db.insert("inspection", &[("id", 1), ("building_id", 1)]).unwrap();

        let err = sim.delete("del_cityobject", &[1]).unwrap_err();

        assert!(matches!(err, SimulationError::ForeignKeyViolation { .. }));
        assert!(sim.database().contains("building", 1));
        assert!(sim.database().contains("cityobject", 1));
    }
}

mod subtypes {
    use super::*;

    #[test]
    fn root_dispatches_each_row_by_its_class() {
        let mut sim = seeded();

        let deleted = sim.delete("del_cityobject", &[10, 3]).unwrap();

        assert_eq!(deleted, vec![3, 10]);
        let trace = calls(&sim);
        assert!(trace.contains(&("del_building".to_string(), Caller::FromParent)));
        assert!(trace.contains(&("del_thematic_surface".to_string(), Caller::FromParent)));
        let climbed_back = sim.trace().iter().any(|c| {
            c.function == "del_cityobject"
                && c.caller == Caller::FromSubtype
                && (c.ids.contains(&3) || c.ids.contains(&10))
        });
        assert!(!climbed_back);
    }

    #[test]
    fn ade_subclass_is_reached_through_its_supertypes() {
        let mut sim = seeded();

        let deleted = sim.delete("del_cityobject", &[2]).unwrap();

        assert_eq!(deleted, vec![2]);
        let db = sim.database();
        assert!(!db.contains("ade_building", 2));
        assert!(!db.contains("building_ext", 2));
        assert!(!db.contains("building", 2));
        assert!(
            calls(&sim).contains(&("del_ade_building".to_string(), Caller::FromParent))
        );
    }

    #[test]
    fn deleting_a_subclass_row_climbs_to_the_root() {
        let mut sim = seeded();

        let deleted = sim.delete("del_ade_building", &[2]).unwrap();

        assert_eq!(deleted, vec![2]);
        let db = sim.database();
        assert!(!db.contains("building", 2));
        assert!(!db.contains("cityobject", 2));
        assert!(!db.contains("building_ext", 2));

        let trace = calls(&sim);
        assert!(trace.contains(&("del_building".to_string(), Caller::FromSubtype)));
        assert!(trace.contains(&("del_cityobject".to_string(), Caller::FromSubtype)));
        assert_eq!(
            trace.iter().filter(|(f, _)| f == "del_ade_building").count(),
            1,
            "typed dispatch must not call back into the subclass"
        );
    }

    #[test]
    fn extension_rows_are_removed_for_every_caller() {
        let mut sim = seeded();

        sim.delete("del_building", &[1]).unwrap();

        assert!(!sim.database().contains("building_ext", 1));
        assert!(calls(&sim).contains(&("del_building_ext".to_string(), Caller::FromParent)));
    }

    #[test]
    fn subtype_called_from_its_parent_does_not_climb_back() {
        let mut sim = seeded();

        sim.delete("del_cityobject", &[1]).unwrap();

        let climbs = sim
            .trace()
            .iter()
            .filter(|c| c.function == "del_cityobject" && c.ids == vec![1])
            .count();
        assert_eq!(climbs, 1);
    }
}

mod termination {
    use super::*;

    #[test]
    fn second_delete_of_the_same_ids_is_a_no_op() {
        let mut sim = seeded();
        sim.delete("del_cityobject", &[1]).unwrap();
        let before: Vec<usize> = ["cityobject", "building", "address", "surface_geometry"]
            .iter()
            .map(|t| sim.database().count(t))
            .collect();

        let deleted = sim.delete("del_cityobject", &[1]).unwrap();

        assert!(deleted.is_empty());
        let after: Vec<usize> = ["cityobject", "building", "address", "surface_geometry"]
            .iter()
            .map(|t| sim.database().count(t))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn deep_geometry_chain_recurses_once_per_level() {
        let mut sim = simulator(citydb_with_ade(), ade_records(), "cityobject");
        let db = sim.database_mut();
        db.insert("surface_geometry", &[("id", 1)]).unwrap();
        for id in 2..=10 {
            db.insert("surface_geometry", &[("id", id), ("parent_id", id - 1)])
                .unwrap();
        }

        let deleted = sim.delete("del_surface_geometry", &[1]).unwrap();

        assert_eq!(deleted, (1..=10).collect::<Vec<_>>());
        assert!(sim.database().ids("surface_geometry").is_empty());
        let max_depth = sim.trace().iter().map(|c| c.depth).max().unwrap();
        assert_eq!(max_depth, 9);
    }

    #[test]
    fn depth_limit_turns_runaway_chains_into_errors() {
        let sim = simulator(citydb_with_ade(), ade_records(), "cityobject");
        let mut sim = sim.with_max_depth(3);
        let db = sim.database_mut();
        db.insert("surface_geometry", &[("id", 1)]).unwrap();
        for id in 2..=10 {
            db.insert("surface_geometry", &[("id", id), ("parent_id", id - 1)])
                .unwrap();
        }

        let err = sim.delete("del_surface_geometry", &[1]).unwrap_err();

        assert!(matches!(err, SimulationError::DepthExceeded { .. }));
        assert_eq!(sim.database().count("surface_geometry"), 10);
    }

    #[test]
    fn geometry_parents_pointing_at_each_other_are_both_deleted() {
        let mut sim = simulator(citydb_with_ade(), ade_records(), "cityobject");
        let db = sim.database_mut();
        db.insert("surface_geometry", &[("id", 1)]).unwrap();
        db.insert("surface_geometry", &[("id", 2), ("parent_id", 1)])
            .unwrap();
        db.update("surface_geometry", 1, "parent_id", 2).unwrap();

        let deleted = sim.delete("del_surface_geometry", &[1]).unwrap();

        assert_eq!(deleted, vec![1, 2]);
        assert!(sim.database().ids("surface_geometry").is_empty());
        assert_eq!(sim.trace().len(), 3);
    }

    #[test]
    fn rows_owning_each_other_are_unlinked_then_deleted() {
        let (schema, records) = mutual_owners();
        let mut sim = simulator(schema, records, "a");
        let db = sim.database_mut();
        db.insert("a", &[("id", 1)]).unwrap();
        db.insert("b", &[("id", 1), ("a_id", 1)]).unwrap();
        db.update("a", 1, "b_id", 1).unwrap();

        sim.delete("del_a", &[1]).unwrap();

        let db = sim.database();
        assert_eq!(db.count("a"), 0);
        assert_eq!(db.count("b"), 0);
        assert_eq!(
            calls(&sim),
            vec![
                ("del_a".to_string(), Caller::External),
                ("del_b".to_string(), Caller::FromOwner),
                ("del_a".to_string(), Caller::FromOwner),
            ]
        );
    }

    #[test]
    fn single_id_wrapper_reports_whether_the_row_went() {
        let mut sim = seeded();

        assert_eq!(sim.delete_one("del_building", 3).unwrap(), Some(3));
        assert_eq!(sim.delete_one("del_building", 3).unwrap(), None);
    }
}
