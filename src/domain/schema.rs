use serde::{Deserialize, Serialize};

use super::foreign_key::ForeignKey;
use super::relation::OwnershipRecord;
use super::table::{Table, TableRef};

/// A fully materialised relational schema: tables, their FKs and the
/// ownership records persisted alongside them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaGraph {
    pub name: String,
    pub tables: Vec<Table>,
    #[serde(default)]
    pub ownership: Vec<OwnershipRecord>,
}

impl SchemaGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            ownership: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_ownership(mut self, record: OwnershipRecord) -> Self {
        self.ownership.push(record);
        self
    }

    pub fn table(&self, table: &TableRef) -> Option<&Table> {
        self.tables.iter().find(|t| t.table_ref() == *table)
    }

    /// Finds a table by bare name within this schema.
    pub fn find(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_ref(&self, name: &str) -> TableRef {
        TableRef::new(self.name.clone(), name)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.tables.iter().flat_map(|t| t.foreign_keys.iter())
    }

    /// FKs of other tables (or the table itself) pointing at `table`.
    pub fn foreign_keys_to<'a>(&'a self, table: &'a TableRef) -> impl Iterator<Item = &'a ForeignKey> {
        self.foreign_keys().filter(move |fk| fk.target() == *table)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign_key::FkAction;

    fn sample() -> SchemaGraph {
        SchemaGraph::new("citydb")
            .with_table(
                Table::new("citydb", "building")
                    .with_column("id", "integer", false)
                    .with_primary_key(&["id"]),
            )
            .with_table(
                Table::new("citydb", "thematic_surface")
                    .with_column("id", "integer", false)
                    .with_column("building_id", "integer", true)
                    .with_primary_key(&["id"])
                    .with_foreign_key("building_id", "building", "id", FkAction::NoAction),
            )
    }

    #[test]
    fn find_ignores_case() {
        let schema = sample();

        assert!(schema.find("BUILDING").is_some());
        assert!(schema.find("room").is_none());
    }

    #[test]
    fn foreign_keys_to_filters_by_target() {
        let schema = sample();
        let building = schema.table_ref("building");

        let incoming: Vec<_> = schema.foreign_keys_to(&building).collect();

        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].from_table, "thematic_surface");
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let schema = sample();

        let json = serde_json::to_string(&schema).unwrap();
        let parsed: SchemaGraph = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.table_count(), 2);
        assert!(parsed.ownership.is_empty());
    }
}
