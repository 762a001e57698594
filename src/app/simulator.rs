//! Executes synthesized delete functions against an in-memory row store.
//!
//! Every block is interpreted with the same meaning the emitted SQL has, and
//! the store enforces FK actions the way a database would, so ordering
//! mistakes in a function body surface as FK violations.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::{
    Block, Caller, DeleteFunction, FkAction, OwnerCheck, OwnerRef, SchemaGraph, Table, TableRef,
};
use crate::registry::FunctionRegistry;

const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("table not found: {0}")]
    UnknownTable(String),
    #[error("function not found: {0}")]
    UnknownFunction(String),
    #[error("column {column} not found in {table}")]
    UnknownColumn { table: String, column: String },
    #[error("{0} has no single-column primary key")]
    NoKey(String),
    #[error("duplicate key {key} in {table}")]
    DuplicateKey { table: String, key: i64 },
    #[error("no row with key {key} in {table}")]
    MissingRow { table: String, key: i64 },
    #[error("{constraint}: {table}.{column} = {value} has no matching row")]
    DanglingReference {
        constraint: String,
        table: String,
        column: String,
        value: i64,
    },
    #[error("{constraint}: rows of {table} still reference deleted rows")]
    ForeignKeyViolation { constraint: String, table: String },
    #[error("{table}.{column} cannot be set to NULL")]
    NotNullViolation { table: String, column: String },
    #[error("call depth {depth} exceeded in {function}")]
    DepthExceeded { function: String, depth: usize },
}

/// A row keyed by lowercase column name. Absent columns are NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(BTreeMap<String, i64>);

impl Row {
    pub fn get(&self, column: &str) -> Option<i64> {
        self.0.get(&column.to_ascii_lowercase()).copied()
    }

    fn set_null(&mut self, column: &str) {
        self.0.remove(&column.to_ascii_lowercase());
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryDatabase {
    schema: SchemaGraph,
    rows: HashMap<TableRef, Vec<Row>>,
}

impl InMemoryDatabase {
    pub fn new(schema: SchemaGraph) -> Self {
        Self {
            schema,
            rows: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &SchemaGraph {
        &self.schema
    }

    fn table_def(&self, table: &TableRef) -> Result<&Table, SimulationError> {
        self.schema
            .table(table)
            .ok_or_else(|| SimulationError::UnknownTable(table.qualified_name()))
    }

    fn key_column(&self, table: &TableRef) -> Result<String, SimulationError> {
        self.table_def(table)?
            .single_key()
            .map(str::to_string)
            .ok_or_else(|| SimulationError::NoKey(table.qualified_name()))
    }

    /// Inserts a row, checking key uniqueness and that every non-null FK
    /// value points at an existing row.
    pub fn insert(&mut self, table: &str, values: &[(&str, i64)]) -> Result<(), SimulationError> {
        let table_ref = self.schema.table_ref(table);
        let def = self.table_def(&table_ref)?;

        let mut row = Row::default();
        for (column, value) in values {
            if def.column(column).is_none() {
                return Err(SimulationError::UnknownColumn {
                    table: def.qualified_name(),
                    column: (*column).to_string(),
                });
            }
            row.0.insert(column.to_ascii_lowercase(), *value);
        }

        if let Some(key) = def.single_key() {
            if let Some(value) = row.get(key) {
                if self.rows_of(&table_ref).iter().any(|r| r.get(key) == Some(value)) {
                    return Err(SimulationError::DuplicateKey {
                        table: def.qualified_name(),
                        key: value,
                    });
                }
            }
        }

        self.check_references(&table_ref, def, &row)?;
        self.rows.entry(table_ref).or_default().push(row);
        Ok(())
    }

    /// Sets one column of the row keyed `id`. Rows that reference each
    /// other in a loop can only be built this way.
    pub fn update(&mut self, table: &str, id: i64, column: &str, value: i64) -> Result<(), SimulationError> {
        let table_ref = self.schema.table_ref(table);
        let def = self.table_def(&table_ref)?;
        if def.column(column).is_none() {
            return Err(SimulationError::UnknownColumn {
                table: def.qualified_name(),
                column: column.to_string(),
            });
        }
        let key = self.key_column(&table_ref)?;

        let mut row = self
            .rows_of(&table_ref)
            .iter()
            .find(|r| r.get(&key) == Some(id))
            .cloned()
            .ok_or_else(|| SimulationError::MissingRow {
                table: def.qualified_name(),
                key: id,
            })?;
        row.0.insert(column.to_ascii_lowercase(), value);
        self.check_references(&table_ref, def, &row)?;

        if let Some(stored) = self
            .rows
            .get_mut(&table_ref)
            .and_then(|rows| rows.iter_mut().find(|r| r.get(&key) == Some(id)))
        {
            *stored = row;
        }
        Ok(())
    }

    /// Every non-null FK value of `row` must point at an existing row, or
    /// at `row` itself.
    fn check_references(&self, table_ref: &TableRef, def: &Table, row: &Row) -> Result<(), SimulationError> {
        for fk in def.foreign_keys.iter().filter(|fk| fk.is_single_column()) {
            let Some(value) = row.get(&fk.from_columns[0]) else {
                continue;
            };
            let target = fk.target();
            let to_column = &fk.to_columns[0];
            let found = self
                .rows_of(&target)
                .iter()
                .any(|r| r.get(to_column) == Some(value))
                || (&target == table_ref && row.get(to_column) == Some(value));
            if !found {
                return Err(SimulationError::DanglingReference {
                    constraint: fk.name.clone(),
                    table: def.qualified_name(),
                    column: fk.from_columns[0].clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    fn rows_of(&self, table: &TableRef) -> &[Row] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.rows_of(&self.schema.table_ref(table))
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    /// Sorted key values of `table`. Empty for tables without a single key.
    pub fn ids(&self, table: &str) -> Vec<i64> {
        let table_ref = self.schema.table_ref(table);
        let Ok(key) = self.key_column(&table_ref) else {
            return Vec::new();
        };
        let mut ids: Vec<i64> = self
            .rows_of(&table_ref)
            .iter()
            .filter_map(|r| r.get(&key))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn contains(&self, table: &str, id: i64) -> bool {
        self.ids(table).contains(&id)
    }

    pub fn value(&self, table: &str, id: i64, column: &str) -> Option<i64> {
        let table_ref = self.schema.table_ref(table);
        let key = self.key_column(&table_ref).ok()?;
        self.rows_of(&table_ref)
            .iter()
            .find(|r| r.get(&key) == Some(id))
            .and_then(|r| r.get(column))
    }

    fn select<F>(&self, table: &TableRef, pred: F) -> Result<Vec<Row>, SimulationError>
    where
        F: Fn(&Row) -> bool,
    {
        self.table_def(table)?;
        Ok(self.rows_of(table).iter().filter(|r| pred(r)).cloned().collect())
    }

    /// Statement-level delete: rows removed together may reference each
    /// other; anything else still pointing at them triggers its FK action.
    fn delete_where<F>(&mut self, table: &TableRef, pred: F) -> Result<Vec<Row>, SimulationError>
    where
        F: Fn(&Row) -> bool,
    {
        self.table_def(table)?;
        let rows = self.rows.entry(table.clone()).or_default();
        let (victims, keep): (Vec<Row>, Vec<Row>) = rows.drain(..).partition(|r| pred(r));
        *rows = keep;

        if !victims.is_empty() {
            self.enforce_references(table, &victims)?;
        }
        Ok(victims)
    }

    fn enforce_references(&mut self, table: &TableRef, victims: &[Row]) -> Result<(), SimulationError> {
        let incoming: Vec<_> = self
            .schema
            .foreign_keys_to(table)
            .filter(|fk| fk.is_single_column())
            .cloned()
            .collect();

        for fk in incoming {
            let values: BTreeSet<i64> = victims
                .iter()
                .filter_map(|r| r.get(&fk.to_columns[0]))
                .collect();
            if values.is_empty() {
                continue;
            }

            let child = fk.source();
            let from_column = fk.from_columns[0].clone();
            let points_at_victim =
                |r: &Row| r.get(&from_column).is_some_and(|v| values.contains(&v));

            match fk.on_delete {
                FkAction::Cascade => {
                    self.delete_where(&child, points_at_victim)?;
                }
                FkAction::SetNull => {
                    self.set_null_where(&child, &from_column, points_at_victim)?;
                }
                FkAction::NoAction | FkAction::Restrict | FkAction::SetDefault => {
                    if self.rows_of(&child).iter().any(points_at_victim) {
                        return Err(SimulationError::ForeignKeyViolation {
                            constraint: fk.name.clone(),
                            table: child.qualified_name(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn set_null_where<F>(
        &mut self,
        table: &TableRef,
        column: &str,
        pred: F,
    ) -> Result<Vec<Row>, SimulationError>
    where
        F: Fn(&Row) -> bool,
    {
        let def = self.table_def(table)?;
        let nullable = def.column(column).map(|c| c.nullable).ok_or_else(|| {
            SimulationError::UnknownColumn {
                table: def.qualified_name(),
                column: column.to_string(),
            }
        })?;

        let mut touched = Vec::new();
        for row in self.rows.entry(table.clone()).or_default() {
            if pred(row) {
                if !nullable {
                    return Err(SimulationError::NotNullViolation {
                        table: table.qualified_name(),
                        column: column.to_string(),
                    });
                }
                touched.push(row.clone());
                row.set_null(column);
            }
        }
        Ok(touched)
    }

    fn is_owned(&self, table: &TableRef, key: &str, id: i64, check: &OwnerCheck) -> bool {
        check.owners.iter().any(|owner| match owner {
            OwnerRef::OwnColumn { column } => self
                .rows_of(table)
                .iter()
                .any(|r| r.get(key) == Some(id) && r.get(column).is_some()),
            OwnerRef::Referencing { table, column } => self
                .rows_of(table)
                .iter()
                .any(|r| r.get(column) == Some(id)),
        })
    }
}

/// One invocation of a generated function, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub function: String,
    pub caller: Caller,
    pub ids: Vec<i64>,
    pub depth: usize,
}

#[derive(Debug, Default)]
struct Frame {
    deleted_ids: Vec<i64>,
    deleted_child_ids: Vec<i64>,
    captured: Vec<Vec<i64>>,
}

pub struct Simulator {
    db: InMemoryDatabase,
    functions: HashMap<String, DeleteFunction>,
    trace: Vec<CallRecord>,
    max_depth: usize,
}

impl Simulator {
    pub fn new(db: InMemoryDatabase, functions: impl IntoIterator<Item = DeleteFunction>) -> Self {
        Self {
            db,
            functions: functions
                .into_iter()
                .map(|f| (f.name.clone(), f))
                .collect(),
            trace: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn from_registry(db: InMemoryDatabase, registry: &FunctionRegistry) -> Self {
        Self::new(db, registry.functions().into_iter().cloned())
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn database(&self) -> &InMemoryDatabase {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut InMemoryDatabase {
        &mut self.db
    }

    /// Calls of the most recent top-level delete.
    pub fn trace(&self) -> &[CallRecord] {
        &self.trace
    }

    /// Batch entry point as a client would call it. Runs as one transaction:
    /// on error the store is left untouched.
    pub fn delete(&mut self, function: &str, ids: &[i64]) -> Result<Vec<i64>, SimulationError> {
        self.trace.clear();
        let snapshot = self.db.clone();
        let result = self.call(function, ids.to_vec(), Caller::External, 0);
        if result.is_err() {
            self.db = snapshot;
        }
        result
    }

    /// Single-id wrapper: returns the id when its row was deleted.
    pub fn delete_one(&mut self, function: &str, id: i64) -> Result<Option<i64>, SimulationError> {
        let deleted = self.delete(function, &[id])?;
        Ok(deleted.contains(&id).then_some(id))
    }

    fn call(
        &mut self,
        name: &str,
        ids: Vec<i64>,
        caller: Caller,
        depth: usize,
    ) -> Result<Vec<i64>, SimulationError> {
        if depth > self.max_depth {
            return Err(SimulationError::DepthExceeded {
                function: name.to_string(),
                depth,
            });
        }
        let function = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| SimulationError::UnknownFunction(name.to_string()))?;

        let batch: Vec<i64> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        self.trace.push(CallRecord {
            function: name.to_string(),
            caller,
            ids: batch.clone(),
            depth,
        });
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut frame = Frame::default();
        for block in &function.blocks {
            self.run_block(&function, block, &batch, caller, depth, &mut frame)?;
        }

        let result: BTreeSet<i64> = frame
            .deleted_ids
            .into_iter()
            .chain(frame.deleted_child_ids)
            .collect();
        Ok(result.into_iter().collect())
    }

    fn run_block(
        &mut self,
        function: &DeleteFunction,
        block: &Block,
        batch: &[i64],
        caller: Caller,
        depth: usize,
        frame: &mut Frame,
    ) -> Result<(), SimulationError> {
        let key = function.key_column.as_str();
        let in_batch = |v: Option<i64>| v.is_some_and(|v| batch.contains(&v));

        match block {
            Block::SelfParts(b) => {
                let is_part = |r: &Row| in_batch(r.get(&b.column)) && r.get(&b.column) != r.get(key);
                let rows = if b.detach {
                    self.db.set_null_where(&function.table, &b.column, is_part)?
                } else {
                    self.db.select(&function.table, is_part)?
                };
                let parts: Vec<i64> = rows.iter().filter_map(|r| r.get(key)).collect();
                if !parts.is_empty() {
                    let deleted = self.call(&b.callee.function, parts, Caller::FromOwner, depth + 1)?;
                    frame.deleted_child_ids.extend(deleted);
                }
            }
            Block::ChildCascade(b) => {
                let mut candidates: Vec<i64> = self
                    .db
                    .select(&b.child, |r| in_batch(r.get(&b.column)))?
                    .iter()
                    .filter_map(|r| r.get(&b.child_key))
                    .collect();
                if b.detach {
                    self.db
                        .set_null_where(&b.child, &b.column, |r| in_batch(r.get(&b.column)))?;
                }
                if let Some(check) = &b.owner_check {
                    candidates.retain(|id| !self.db.is_owned(&b.child, &b.child_key, *id, check));
                }
                if !candidates.is_empty() {
                    self.call(&b.callee.function, candidates, Caller::FromOwner, depth + 1)?;
                }
            }
            Block::BridgeCascade(b) => {
                let links = self
                    .db
                    .delete_where(&b.bridge, |r| in_batch(r.get(&b.root_column)))?;
                let mut targets: Vec<i64> = links.iter().filter_map(|r| r.get(&b.m_column)).collect();
                if let Some(callee) = &b.callee {
                    if let Some(check) = &b.owner_check {
                        targets.retain(|id| !self.db.is_owned(&b.target, &b.target_key, *id, check));
                    }
                    if !targets.is_empty() {
                        self.call(&callee.function, targets, Caller::FromOwner, depth + 1)?;
                    }
                }
            }
            Block::SubtypeDispatch(b) => {
                let typed = b.discriminator.as_ref().filter(|_| !caller.skips_subtype_dispatch());
                if let Some(disc) = typed {
                    for &id in batch {
                        let class = self
                            .db
                            .select(&disc.table, |r| r.get(&disc.key_column) == Some(id))?
                            .first()
                            .and_then(|r| r.get(&disc.column));
                        let Some(class) = class else {
                            continue;
                        };
                        let Some(case) = b
                            .cases
                            .iter()
                            .find(|c| c.objectclass_ids.iter().any(|&oc| i64::from(oc) == class))
                        else {
                            continue;
                        };
                        let deleted =
                            self.call(&case.callee.function, vec![id], Caller::FromParent, depth + 1)?;
                        if deleted.contains(&id) {
                            frame.deleted_ids.push(id);
                        }
                    }
                }
                for hook in &b.hooks {
                    self.call(&hook.function, batch.to_vec(), Caller::FromParent, depth + 1)?;
                }
            }
            Block::LocalDelete(b) => {
                let deleted = self
                    .db
                    .delete_where(&function.table, |r| in_batch(r.get(key)))?;
                frame.deleted_ids.extend(deleted.iter().filter_map(|r| r.get(key)));
                frame.captured = b
                    .captured
                    .iter()
                    .map(|column| {
                        let values: BTreeSet<i64> =
                            deleted.iter().filter_map(|r| r.get(column)).collect();
                        values.into_iter().collect()
                    })
                    .collect();
            }
            Block::ReferencedCleanup(b) => {
                let mut targets = frame.captured.get(b.slot).cloned().unwrap_or_default();
                if let Some(check) = &b.owner_check {
                    targets.retain(|id| !self.db.is_owned(&b.target, &b.target_key, *id, check));
                }
                if !targets.is_empty() {
                    self.call(&b.callee.function, targets, Caller::FromOwner, depth + 1)?;
                }
            }
            Block::ParentCascade(b) => {
                if caller.skips_parent_cascade() || frame.deleted_ids.is_empty() {
                    return Ok(());
                }
                let ids = frame.deleted_ids.clone();
                self.call(&b.callee.function, ids, Caller::FromSubtype, depth + 1)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Callee, ChildCascadeBlock, LocalDeleteBlock, SelfPartsBlock};

    fn schema() -> SchemaGraph {
        SchemaGraph::new("citydb")
            .with_table(
                Table::new("citydb", "node")
                    .with_column("id", "integer", false)
                    .with_column("parent_id", "integer", true)
                    .with_primary_key(&["id"])
                    .with_foreign_key("parent_id", "node", "id", FkAction::NoAction),
            )
            .with_table(
                Table::new("citydb", "leaf")
                    .with_column("id", "integer", false)
                    .with_column("node_id", "integer", false)
                    .with_primary_key(&["id"])
                    .with_foreign_key("node_id", "node", "id", FkAction::NoAction),
            )
    }

    fn callee(table: &str) -> Callee {
        Callee {
            table: TableRef::new("citydb", table),
            function: format!("del_{table}"),
        }
    }

    fn local_only(table: &str) -> DeleteFunction {
        DeleteFunction {
            table: TableRef::new("citydb", table),
            name: format!("del_{table}"),
            key_column: "id".to_string(),
            blocks: vec![Block::LocalDelete(LocalDeleteBlock { captured: vec![] })],
        }
    }

    fn node_function(with_children: bool) -> DeleteFunction {
        let mut blocks = vec![Block::SelfParts(SelfPartsBlock {
            column: "parent_id".to_string(),
            detach: false,
            callee: callee("node"),
        })];
        if with_children {
            blocks.push(Block::ChildCascade(ChildCascadeBlock {
                child: TableRef::new("citydb", "leaf"),
                child_key: "id".to_string(),
                column: "node_id".to_string(),
                detach: false,
                owner_check: None,
                callee: callee("leaf"),
            }));
        }
        blocks.push(Block::LocalDelete(LocalDeleteBlock { captured: vec![] }));
        DeleteFunction {
            table: TableRef::new("citydb", "node"),
            name: "del_node".to_string(),
            key_column: "id".to_string(),
            blocks,
        }
    }

    fn populated() -> InMemoryDatabase {
        let mut db = InMemoryDatabase::new(schema());
        db.insert("node", &[("id", 1)]).unwrap();
        db.insert("node", &[("id", 2), ("parent_id", 1)]).unwrap();
        db.insert("node", &[("id", 3), ("parent_id", 2)]).unwrap();
        db.insert("leaf", &[("id", 10), ("node_id", 3)]).unwrap();
        db
    }

    #[test]
    fn insert_rejects_dangling_reference() {
        let mut db = InMemoryDatabase::new(schema());

        let err = db.insert("leaf", &[("id", 1), ("node_id", 99)]).unwrap_err();

        assert!(matches!(err, SimulationError::DanglingReference { value: 99, .. }));
    }

    #[test]
    fn insert_rejects_duplicate_key() {
        let mut db = InMemoryDatabase::new(schema());
        db.insert("node", &[("id", 1)]).unwrap();

        let err = db.insert("node", &[("id", 1)]).unwrap_err();

        assert!(matches!(err, SimulationError::DuplicateKey { key: 1, .. }));
    }

    fn node_loop() -> InMemoryDatabase {
        let mut db = InMemoryDatabase::new(schema());
        db.insert("node", &[("id", 1)]).unwrap();
        db.insert("node", &[("id", 2), ("parent_id", 1)]).unwrap();
        db.update("node", 1, "parent_id", 2).unwrap();
        db
    }

    #[test]
    fn update_checks_the_new_reference() {
        let mut db = populated();

        let dangling = db.update("node", 1, "parent_id", 99).unwrap_err();
        let missing = db.update("node", 42, "parent_id", 1).unwrap_err();
        db.update("leaf", 10, "node_id", 1).unwrap();

        assert!(matches!(dangling, SimulationError::DanglingReference { value: 99, .. }));
        assert!(matches!(missing, SimulationError::MissingRow { key: 42, .. }));
        assert_eq!(db.value("leaf", 10, "node_id"), Some(1));
        assert_eq!(db.value("node", 1, "parent_id"), None);
    }

    #[test]
    fn update_needs_a_single_column_key() {
        let schema = SchemaGraph::new("citydb").with_table(
            Table::new("citydb", "pair")
                .with_column("a_id", "integer", false)
                .with_column("b_id", "integer", false)
                .with_primary_key(&["a_id", "b_id"]),
        );
        let mut db = InMemoryDatabase::new(schema);
        db.insert("pair", &[("a_id", 1), ("b_id", 2)]).unwrap();

        let err = db.update("pair", 1, "b_id", 3).unwrap_err();

        assert!(matches!(err, SimulationError::NoKey(_)));
        assert_eq!(err.to_string(), "citydb.pair has no single-column primary key");
    }

    #[test]
    fn detached_self_parts_break_parent_loops() {
        let mut function = node_function(false);
        if let Block::SelfParts(b) = &mut function.blocks[0] {
            b.detach = true;
        }
        let mut sim = Simulator::new(node_loop(), [function]);

        let deleted = sim.delete("del_node", &[1]).unwrap();

        assert_eq!(deleted, vec![1, 2]);
        assert_eq!(sim.database().count("node"), 0);
        assert_eq!(sim.trace().len(), 3);
    }

    #[test]
    fn parent_loop_without_detach_hits_the_depth_guard() {
        let mut sim = Simulator::new(node_loop(), [node_function(false)]).with_max_depth(16);

        let err = sim.delete("del_node", &[1]).unwrap_err();

        assert!(matches!(err, SimulationError::DepthExceeded { depth: 17, .. }));
        assert_eq!(sim.database().ids("node"), vec![1, 2]);
    }

    #[test]
    fn self_parts_recurse_down_the_tree() {
        let mut sim = Simulator::new(populated(), [node_function(true), local_only("leaf")]);

        let deleted = sim.delete("del_node", &[1]).unwrap();

        assert_eq!(deleted, vec![1, 2, 3]);
        assert_eq!(sim.database().count("node"), 0);
        assert_eq!(sim.database().count("leaf"), 0);
        assert_eq!(
            sim.trace().iter().map(|c| c.caller).collect::<Vec<_>>(),
            vec![
                Caller::External,
                Caller::FromOwner,
                Caller::FromOwner,
                Caller::FromOwner,
            ]
        );
    }

    #[test]
    fn restricted_reference_rolls_back_the_whole_call() {
        let mut sim = Simulator::new(populated(), [node_function(false)]);

        let err = sim.delete("del_node", &[1]).unwrap_err();

        assert!(matches!(err, SimulationError::ForeignKeyViolation { .. }));
        assert_eq!(sim.database().ids("node"), vec![1, 2, 3]);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut sim = Simulator::new(populated(), [node_function(true), local_only("leaf")]);

        let deleted = sim.delete("del_node", &[]).unwrap();

        assert!(deleted.is_empty());
        assert_eq!(sim.database().count("node"), 3);
    }

    #[test]
    fn depth_guard_stops_runaway_recursion() {
        let mut sim = Simulator::new(populated(), [node_function(true), local_only("leaf")])
            .with_max_depth(1);

        let err = sim.delete("del_node", &[1]).unwrap_err();

        assert!(matches!(err, SimulationError::DepthExceeded { depth: 2, .. }));
    }

    #[test]
    fn unknown_function_is_reported() {
        let mut sim = Simulator::new(populated(), []);

        let err = sim.delete("del_missing", &[1]).unwrap_err();

        assert_eq!(err, SimulationError::UnknownFunction("del_missing".to_string()));
    }

    #[test]
    fn delete_one_returns_none_for_missing_row() {
        let mut sim = Simulator::new(populated(), [node_function(true), local_only("leaf")]);

        assert_eq!(sim.delete_one("del_node", 42).unwrap(), None);
        assert_eq!(sim.delete_one("del_node", 3).unwrap(), Some(3));
    }
}
