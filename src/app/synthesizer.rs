//! Builds one delete function per reachable table, starting at a root.
//!
//! The walk is an explicit stack so that deep ownership chains cannot blow
//! the call stack, and callees are named before they are built so that
//! cycles (self references, mutual owners) close over reserved names.
//!
//! Naming a cycle is not enough at run time: rows that own each other in a
//! loop would be handed back and forth forever. Owning links that can lead
//! back to their own function are therefore detached before recursing.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Block, BridgeCascadeBlock, BridgeEntry, Callee, Caller, ChildCascadeBlock, ChildShape, Discriminator,
    ForeignKeyEdge, LocalDeleteBlock, OwnerCheck, OwnerRef, ParentCascadeBlock,
    ReferencedCleanupBlock, RelationKind, SelfPartsBlock, SubtypeCase, SubtypeDispatchBlock,
    TableRef,
};
use crate::naming::{FunctionNamer, NamingError};
use crate::ports::{ClassifyError, IntrospectionError, RelationClassifier, SchemaIntrospector};
use crate::registry::{FunctionRegistry, VisitState};

pub const DEFAULT_PREFIX: &str = "del_";
pub const DEFAULT_DISCRIMINATOR: &str = "objectclass_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub prefix: String,
    pub max_identifier_len: usize,
    pub discriminator_column: String,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            max_identifier_len: 63,
            discriminator_column: DEFAULT_DISCRIMINATOR.to_string(),
        }
    }
}

impl SynthesisOptions {
    pub fn with_max_identifier_len(mut self, len: usize) -> Self {
        self.max_identifier_len = len;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("introspection failed at {table}: {source}")]
    Introspection {
        table: String,
        #[source]
        source: IntrospectionError,
    },
    #[error("cannot classify {edge} (visiting {table}): {source}")]
    Classification {
        table: String,
        edge: String,
        #[source]
        source: ClassifyError,
    },
    #[error(transparent)]
    Naming(#[from] NamingError),
    #[error("{table} has typed subtypes but no {column} column to dispatch on")]
    MissingDiscriminator { table: String, column: String },
}

/// Result of a run: every generated function plus notes for human review.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub registry: FunctionRegistry,
    pub notes: Vec<String>,
}

pub struct DeleteSynthesizer<'a> {
    introspector: &'a dyn SchemaIntrospector,
    classifier: &'a dyn RelationClassifier,
    options: SynthesisOptions,
}

impl<'a> DeleteSynthesizer<'a> {
    pub fn new(
        introspector: &'a dyn SchemaIntrospector,
        classifier: &'a dyn RelationClassifier,
        options: SynthesisOptions,
    ) -> Self {
        Self {
            introspector,
            classifier,
            options,
        }
    }

    #[instrument(skip(self), fields(root = %root))]
    pub fn synthesize(&self, root: &TableRef) -> Result<Synthesis, SynthesisError> {
        let mut registry = FunctionRegistry::new(FunctionNamer::new(
            self.options.prefix.clone(),
            self.options.max_identifier_len,
        ));
        let mut notes = Vec::new();
        let mut stack = vec![root.clone()];

        while let Some(table) = stack.pop() {
            if !registry.begin(&table)? {
                continue;
            }
            debug!(table = %table, "building delete function");

            let key_column = self.inspect(&table, self.introspector.primary_key_column(&table))?;
            let blocks = self.build_blocks(&table, &mut registry, &mut notes)?;

            let pending: Vec<TableRef> = blocks
                .iter()
                .flat_map(Block::callees)
                .map(|c| c.table.clone())
                .collect();
            registry.complete(&table, key_column, blocks);

            for callee in pending.into_iter().rev() {
                if registry.state(&callee) != Some(VisitState::Done) {
                    stack.push(callee);
                }
            }
        }

        self.break_ownership_cycles(&mut registry, &mut notes)?;

        info!(
            functions = registry.functions().len(),
            notes = notes.len(),
            "delete functions synthesized"
        );
        Ok(Synthesis { registry, notes })
    }

    fn build_blocks(
        &self,
        table: &TableRef,
        registry: &mut FunctionRegistry,
        notes: &mut Vec<String>,
    ) -> Result<Vec<Block>, SynthesisError> {
        let mut blocks = Vec::new();

        for edge in self.inspect(table, self.introspector.self_referencing_foreign_keys(table))? {
            let kind = self.classify(table, &edge, table, table, &edge.child_column)?;
            if kind == RelationKind::Composition {
                debug!(table = %table, column = %edge.child_column, "self parts");
                if !edge.nullable {
                    cycle_note(notes, &edge);
                }
                blocks.push(Block::SelfParts(SelfPartsBlock {
                    column: edge.child_column.clone(),
                    detach: edge.nullable,
                    callee: self.callee(registry, table)?,
                }));
            }
        }

        let mut isa_children = Vec::new();
        for child in self.inspect(table, self.introspector.child_foreign_keys(table))? {
            let edge = &child.edge;
            if edge.child_is_key {
                if !isa_children.contains(&edge.child) {
                    isa_children.push(edge.child.clone());
                }
                continue;
            }

            match &child.shape {
                ChildShape::Bridge(bridge) => {
                    blocks.push(self.bridge_block(table, bridge, registry)?);
                }
                shape => {
                    if let ChildShape::SuspectedBridge { reason } = shape {
                        warn!(table = %edge.child, "{reason}");
                        if !notes.contains(reason) {
                            notes.push(reason.clone());
                        }
                    }
                    if let Some(block) = self.child_block(table, edge, registry)? {
                        blocks.push(block);
                    }
                }
            }
        }

        if !isa_children.is_empty() {
            blocks.push(self.dispatch_block(table, &isa_children, registry)?);
        }

        let mut captured = Vec::new();
        let mut cleanups = Vec::new();
        for edge in self.inspect(table, self.introspector.referenced_tables(table))? {
            let kind = self.classify(table, &edge, &edge.parent, table, &edge.child_column)?;
            if !kind.is_owning() {
                continue;
            }
            let owner_check = match kind {
                RelationKind::Aggregation => Some(self.owner_check(&edge.parent)?),
                _ => None,
            };
            debug!(table = %table, edge = %edge, %kind, "referenced cleanup");
            cleanups.push(Block::ReferencedCleanup(ReferencedCleanupBlock {
                column: edge.child_column.clone(),
                slot: captured.len(),
                target: edge.parent.clone(),
                target_key: edge.parent_column.clone(),
                owner_check,
                callee: self.callee(registry, &edge.parent)?,
            }));
            captured.push(edge.child_column.clone());
        }
        blocks.push(Block::LocalDelete(LocalDeleteBlock { captured }));
        blocks.extend(cleanups);

        if let Some(parent) = self.inspect(table, self.introspector.parent_foreign_key(table))? {
            debug!(table = %table, parent = %parent.parent, "parent cascade");
            blocks.push(Block::ParentCascade(ParentCascadeBlock {
                callee: self.callee(registry, &parent.parent)?,
            }));
        }

        Ok(blocks)
    }

    /// Child cascades whose callee can call back into the cascading
    /// function get their link detached. NOT NULL links cannot be, and are
    /// reported for review instead.
    fn break_ownership_cycles(
        &self,
        registry: &mut FunctionRegistry,
        notes: &mut Vec<String>,
    ) -> Result<(), SynthesisError> {
        let tables: Vec<TableRef> = registry.functions().iter().map(|f| f.table.clone()).collect();

        for table in tables {
            let cyclic: Vec<usize> = match registry.get(&table) {
                Some(function) => function
                    .blocks
                    .iter()
                    .enumerate()
                    .filter_map(|(i, block)| match block {
                        Block::ChildCascade(b)
                            if !b.detach && owner_call_reaches(registry, &b.callee.table, &table) =>
                        {
                            Some(i)
                        }
                        _ => None,
                    })
                    .collect(),
                None => continue,
            };
            if cyclic.is_empty() {
                continue;
            }

            let edges: Vec<ForeignKeyEdge> = self
                .inspect(&table, self.introspector.child_foreign_keys(&table))?
                .into_iter()
                .map(|c| c.edge)
                .collect();
            let Some(function) = registry.get_mut(&table) else {
                continue;
            };
            for i in cyclic {
                let Block::ChildCascade(block) = &mut function.blocks[i] else {
                    continue;
                };
                let Some(edge) = edges
                    .iter()
                    .find(|e| e.child == block.child && e.child_column == block.column)
                else {
                    continue;
                };
                if edge.nullable {
                    debug!(table = %table, edge = %edge, "detaching cyclic ownership link");
                    block.detach = true;
                } else {
                    cycle_note(notes, edge);
                }
            }
        }
        Ok(())
    }

    fn child_block(
        &self,
        table: &TableRef,
        edge: &ForeignKeyEdge,
        registry: &mut FunctionRegistry,
    ) -> Result<Option<Block>, SynthesisError> {
        let kind = self.classify(table, edge, &edge.child, table, &edge.child_column)?;
        let (detach, owner_check) = match kind {
            RelationKind::Composition => (false, None),
            RelationKind::Aggregation if edge.nullable => (true, Some(self.owner_check(&edge.child)?)),
            // A not-null link cannot outlive its owner.
            RelationKind::Aggregation => (false, None),
            RelationKind::Association | RelationKind::None => {
                debug!(table = %table, edge = %edge, %kind, "child left alone");
                return Ok(None);
            }
        };

        debug!(table = %table, edge = %edge, %kind, "child cascade");
        let child_key = self.inspect(&edge.child, self.introspector.primary_key_column(&edge.child))?;
        Ok(Some(Block::ChildCascade(ChildCascadeBlock {
            child: edge.child.clone(),
            child_key,
            column: edge.child_column.clone(),
            detach,
            owner_check,
            callee: self.callee(registry, &edge.child)?,
        })))
    }

    fn bridge_block(
        &self,
        table: &TableRef,
        bridge: &BridgeEntry,
        registry: &mut FunctionRegistry,
    ) -> Result<Block, SynthesisError> {
        let kind = self
            .classifier
            .classify(&bridge.m_table, table, Some(&bridge.bridge.name))
            .map_err(|source| SynthesisError::Classification {
                table: table.qualified_name(),
                edge: bridge_label(bridge),
                source,
            })?;

        let (owner_check, callee) = match kind {
            RelationKind::Composition => (None, Some(self.callee(registry, &bridge.m_table)?)),
            RelationKind::Aggregation => (
                Some(self.owner_check(&bridge.m_table)?),
                Some(self.callee(registry, &bridge.m_table)?),
            ),
            RelationKind::Association | RelationKind::None => (None, None),
        };
        debug!(table = %table, bridge = %bridge.bridge, %kind, "bridge cascade");

        Ok(Block::BridgeCascade(BridgeCascadeBlock {
            bridge: bridge.bridge.clone(),
            root_column: bridge.root_column.clone(),
            m_column: bridge.m_column.clone(),
            target: bridge.m_table.clone(),
            target_key: bridge.m_key.clone(),
            owner_check,
            callee,
        }))
    }

    fn dispatch_block(
        &self,
        table: &TableRef,
        isa_children: &[TableRef],
        registry: &mut FunctionRegistry,
    ) -> Result<Block, SynthesisError> {
        let classes = self.inspect(table, self.introspector.direct_subtype_tables(table))?;

        let mut cases = Vec::new();
        let mut hooks = Vec::new();
        for subtype in isa_children {
            let objectclass_ids: Vec<i32> = classes
                .iter()
                .filter(|(_, t)| *t == subtype)
                .map(|(id, _)| *id)
                .collect();
            let callee = self.callee(registry, subtype)?;
            if objectclass_ids.is_empty() {
                debug!(table = %table, hook = %subtype, "untyped subtype");
                hooks.push(callee);
            } else {
                cases.push(SubtypeCase {
                    objectclass_ids,
                    callee,
                });
            }
        }

        let discriminator = if cases.is_empty() {
            None
        } else {
            Some(self.discriminator(table)?)
        };

        Ok(Block::SubtypeDispatch(SubtypeDispatchBlock {
            discriminator,
            cases,
            hooks,
        }))
    }

    /// The discriminator lives on the topmost supertype of `table`.
    fn discriminator(&self, table: &TableRef) -> Result<Discriminator, SynthesisError> {
        let mut root = table.clone();
        let mut seen = HashSet::from([root.clone()]);
        while let Some(parent) = self.inspect(&root, self.introspector.parent_foreign_key(&root))? {
            if !seen.insert(parent.parent.clone()) {
                break;
            }
            root = parent.parent;
        }

        let column = &self.options.discriminator_column;
        if !self.inspect(&root, self.introspector.has_column(&root, column))? {
            return Err(SynthesisError::MissingDiscriminator {
                table: root.qualified_name(),
                column: column.clone(),
            });
        }

        let key_column = self.inspect(&root, self.introspector.primary_key_column(&root))?;
        Ok(Discriminator {
            table: root,
            key_column,
            column: column.clone(),
        })
    }

    /// Every FK path through which a row of `owned` can still be owned.
    fn owner_check(&self, owned: &TableRef) -> Result<OwnerCheck, SynthesisError> {
        let mut owners = Vec::new();

        let outgoing = self
            .inspect(owned, self.introspector.referenced_tables(owned))?
            .into_iter()
            .chain(self.inspect(owned, self.introspector.self_referencing_foreign_keys(owned))?);
        for edge in outgoing {
            let kind = self.classify(owned, &edge, owned, &edge.parent, &edge.child_column)?;
            if kind.is_owning() {
                owners.push(OwnerRef::OwnColumn {
                    column: edge.child_column.clone(),
                });
            }
        }

        for child in self.inspect(owned, self.introspector.child_foreign_keys(owned))? {
            let edge = &child.edge;
            if edge.child_is_key {
                continue;
            }
            let owner_ref = match &child.shape {
                ChildShape::Bridge(bridge) => {
                    let kind = self
                        .classifier
                        .classify(owned, &bridge.m_table, Some(&bridge.bridge.name))
                        .map_err(|source| SynthesisError::Classification {
                            table: owned.qualified_name(),
                            edge: bridge_label(bridge),
                            source,
                        })?;
                    kind.is_owning().then(|| OwnerRef::Referencing {
                        table: bridge.bridge.clone(),
                        column: bridge.root_column.clone(),
                    })
                }
                _ => {
                    let kind = self.classify(owned, edge, owned, &edge.child, &edge.child_column)?;
                    kind.is_owning().then(|| OwnerRef::Referencing {
                        table: edge.child.clone(),
                        column: edge.child_column.clone(),
                    })
                }
            };
            if let Some(owner_ref) = owner_ref {
                if !owners.contains(&owner_ref) {
                    owners.push(owner_ref);
                }
            }
        }

        Ok(OwnerCheck { owners })
    }

    fn callee(&self, registry: &mut FunctionRegistry, table: &TableRef) -> Result<Callee, SynthesisError> {
        Ok(Callee {
            table: table.clone(),
            function: registry.reserve(table)?,
        })
    }

    fn inspect<T>(&self, table: &TableRef, result: Result<T, IntrospectionError>) -> Result<T, SynthesisError> {
        result.map_err(|source| SynthesisError::Introspection {
            table: table.qualified_name(),
            source,
        })
    }

    fn classify(
        &self,
        visiting: &TableRef,
        edge: &ForeignKeyEdge,
        owned: &TableRef,
        owner: &TableRef,
        link: &str,
    ) -> Result<RelationKind, SynthesisError> {
        self.classifier
            .classify(owned, owner, Some(link))
            .map_err(|source| SynthesisError::Classification {
                table: visiting.qualified_name(),
                edge: edge.to_string(),
                source,
            })
    }
}

/// Whether an owner cascade entering `from` can call `target` again,
/// following only the blocks each caller flag leaves active.
fn owner_call_reaches(registry: &FunctionRegistry, from: &TableRef, target: &TableRef) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![(from.clone(), Caller::FromOwner)];

    while let Some((table, caller)) = stack.pop() {
        if &table == target {
            return true;
        }
        if !seen.insert((table.clone(), caller)) {
            continue;
        }
        let Some(function) = registry.get(&table) else {
            continue;
        };
        for block in &function.blocks {
            match block {
                Block::SubtypeDispatch(b) => {
                    if !caller.skips_subtype_dispatch() {
                        stack.extend(b.cases.iter().map(|c| (c.callee.table.clone(), Caller::FromParent)));
                    }
                    stack.extend(b.hooks.iter().map(|h| (h.table.clone(), Caller::FromParent)));
                }
                Block::ParentCascade(b) => {
                    if !caller.skips_parent_cascade() {
                        stack.push((b.callee.table.clone(), Caller::FromSubtype));
                    }
                }
                other => {
                    stack.extend(other.callees().into_iter().map(|c| (c.table.clone(), Caller::FromOwner)));
                }
            }
        }
    }
    false
}

fn cycle_note(notes: &mut Vec<String>, edge: &ForeignKeyEdge) {
    let note = format!(
        "{edge} is a NOT NULL link on an ownership cycle; rows that own each other in a loop cannot be deleted"
    );
    warn!(%edge, "ownership cycle cannot be detached");
    if !notes.contains(&note) {
        notes.push(note);
    }
}

fn bridge_label(bridge: &BridgeEntry) -> String {
    format!(
        "{} ({} -> {})",
        bridge.bridge, bridge.m_column, bridge.m_table
    )
}
