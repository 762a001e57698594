use std::collections::HashMap;

use crate::domain::{Block, DeleteFunction, TableRef};
use crate::naming::{FunctionNamer, NamingError};
use crate::ports::{DeleteDialect, EmitContext};
use crate::script;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    /// Named and referenced by a caller, body not built yet.
    Reserved,
    InProgress,
    Done,
}

#[derive(Debug, Clone)]
struct FunctionRecord {
    function: DeleteFunction,
    state: VisitState,
}

/// Arena of generated functions keyed by table identity. Names are handed
/// out on first sight so that cyclic references resolve to the same function.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    namer: FunctionNamer,
    records: Vec<FunctionRecord>,
    index: HashMap<TableRef, usize>,
    visit_order: Vec<usize>,
}

impl FunctionRegistry {
    pub fn new(namer: FunctionNamer) -> Self {
        Self {
            namer,
            records: Vec::new(),
            index: HashMap::new(),
            visit_order: Vec::new(),
        }
    }

    /// Returns the function name for `table`, assigning one if needed.
    pub fn reserve(&mut self, table: &TableRef) -> Result<String, NamingError> {
        if let Some(&idx) = self.index.get(table) {
            return Ok(self.records[idx].function.name.clone());
        }

        let name = self.namer.assign(&table.name)?;
        self.index.insert(table.clone(), self.records.len());
        self.records.push(FunctionRecord {
            function: DeleteFunction::placeholder(table.clone(), name.clone()),
            state: VisitState::Reserved,
        });
        Ok(name)
    }

    /// Idempotent: a re-entrant registration returns the existing record.
    pub fn register(&mut self, table: &TableRef) -> Result<&DeleteFunction, NamingError> {
        self.reserve(table)?;
        let idx = self.index[table];
        Ok(&self.records[idx].function)
    }

    /// Moves a table to `InProgress`. Returns `false` when it was already
    /// visited, in which case the caller must not build it again.
    pub fn begin(&mut self, table: &TableRef) -> Result<bool, NamingError> {
        self.reserve(table)?;
        let idx = self.index[table];
        let record = &mut self.records[idx];
        if record.state != VisitState::Reserved {
            return Ok(false);
        }
        record.state = VisitState::InProgress;
        self.visit_order.push(idx);
        Ok(true)
    }

    pub fn complete(&mut self, table: &TableRef, key_column: String, blocks: Vec<Block>) {
        if let Some(&idx) = self.index.get(table) {
            let record = &mut self.records[idx];
            record.function.key_column = key_column;
            record.function.blocks = blocks;
            record.state = VisitState::Done;
        }
    }

    pub fn state(&self, table: &TableRef) -> Option<VisitState> {
        self.index.get(table).map(|&idx| self.records[idx].state)
    }

    pub fn get(&self, table: &TableRef) -> Option<&DeleteFunction> {
        self.index.get(table).map(|&idx| &self.records[idx].function)
    }

    pub(crate) fn get_mut(&mut self, table: &TableRef) -> Option<&mut DeleteFunction> {
        self.index
            .get(table)
            .map(|&idx| &mut self.records[idx].function)
    }

    pub fn name_of(&self, table: &TableRef) -> Option<&str> {
        self.get(table).map(|f| f.name.as_str())
    }

    /// Completed functions in depth-first visit order.
    pub fn functions(&self) -> Vec<&DeleteFunction> {
        self.visit_order
            .iter()
            .map(|&idx| &self.records[idx])
            .filter(|r| r.state == VisitState::Done)
            .map(|r| &r.function)
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions().into_iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn emit_all(&self, dialect: &dyn DeleteDialect, ctx: &EmitContext, notes: &[String]) -> String {
        script::assemble(dialect, ctx, &self.functions(), notes)
    }
}
