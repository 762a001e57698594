#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

pub mod fixtures;

use adedel::app::classifier::OwnershipClassifier;
use adedel::app::generator;
use adedel::app::simulator::{InMemoryDatabase, Simulator};
use adedel::app::synthesizer::{Synthesis, SynthesisOptions};
use adedel::domain::{Caller, OwnershipRecord, SchemaGraph};
use adedel::infra::dialect::{OracleDialect, PostgresDialect};

pub fn classifier(records: Vec<OwnershipRecord>) -> OwnershipClassifier {
    OwnershipClassifier::new(records)
}

pub fn synthesize(schema: &SchemaGraph, records: Vec<OwnershipRecord>, root: &str) -> Synthesis {
    generator::synthesize(
        schema,
        &classifier(records),
        &PostgresDialect,
        root,
        SynthesisOptions::default(),
    )
    .unwrap()
}

pub fn synthesize_oracle(schema: &SchemaGraph, records: Vec<OwnershipRecord>, root: &str) -> Synthesis {
    generator::synthesize(
        schema,
        &classifier(records),
        &OracleDialect,
        root,
        SynthesisOptions::default(),
    )
    .unwrap()
}

pub fn simulator(schema: SchemaGraph, records: Vec<OwnershipRecord>, root: &str) -> Simulator {
    let synthesis = synthesize(&schema, records, root);
    Simulator::from_registry(InMemoryDatabase::new(schema), &synthesis.registry)
}

/// Inserts a feature row together with its cityobject row.
pub fn insert_feature(db: &mut InMemoryDatabase, table: &str, class: i32, id: i64, values: &[(&str, i64)]) {
    db.insert("cityobject", &[("id", id), ("objectclass_id", i64::from(class))])
        .unwrap();
    let mut row = vec![("id", id)];
    row.extend_from_slice(values);
    db.insert(table, &row).unwrap();
}

/// Geometry tree rooted at `root` with `children` leaves.
pub fn insert_geometry(db: &mut InMemoryDatabase, root: i64, children: &[i64]) {
    db.insert("surface_geometry", &[("id", root)]).unwrap();
    for &child in children {
        db.insert("surface_geometry", &[("id", child), ("parent_id", root)])
            .unwrap();
    }
}

/// Function names called by the last delete, with the caller they got.
pub fn calls(sim: &Simulator) -> Vec<(String, Caller)> {
    sim.trace()
        .iter()
        .map(|c| (c.function.clone(), c.caller))
        .collect()
}

pub fn called(sim: &Simulator, function: &str) -> bool {
    sim.trace().iter().any(|c| c.function == function)
}
