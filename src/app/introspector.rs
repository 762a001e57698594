//! FK queries over a materialised schema snapshot.

use std::collections::{BTreeMap, HashSet};

use crate::domain::{
    BridgeEntry, ChildEdge, ChildShape, ForeignKey, ForeignKeyEdge, ReferencedEntry, SchemaGraph,
    Table, TableRef,
};
use crate::ports::{IntrospectionError, SchemaIntrospector};

pub struct GraphIntrospector<'a> {
    schema: &'a SchemaGraph,
}

impl<'a> GraphIntrospector<'a> {
    pub fn new(schema: &'a SchemaGraph) -> Self {
        Self { schema }
    }

    fn table(&self, table: &TableRef) -> Result<&'a Table, IntrospectionError> {
        self.schema
            .table(table)
            .ok_or_else(|| IntrospectionError::UnknownTable(table.qualified_name()))
    }

    fn edge(&self, fk: &ForeignKey) -> Result<ForeignKeyEdge, IntrospectionError> {
        if !fk.is_single_column() {
            return Err(IntrospectionError::CompositeForeignKey {
                name: fk.name.clone(),
                table: fk.source().qualified_name(),
            });
        }

        let child = self.table(&fk.source())?;
        // Referenced table must exist as well.
        self.table(&fk.target())?;

        let child_column = fk.from_columns[0].clone();
        let nullable = child
            .column(&child_column)
            .map(|c| c.nullable)
            .unwrap_or(true);

        Ok(ForeignKeyEdge {
            child: fk.source(),
            child_is_key: child.is_key_column(&child_column),
            child_column,
            parent: fk.target(),
            parent_column: fk.to_columns[0].clone(),
            nullable,
            on_delete: fk.on_delete,
        })
    }

    fn outgoing(&self, table: &TableRef) -> Result<Vec<ForeignKeyEdge>, IntrospectionError> {
        self.table(table)?
            .foreign_keys
            .iter()
            .map(|fk| self.edge(fk))
            .collect()
    }

    fn is_isa_link(&self, edge: &ForeignKeyEdge) -> Result<bool, IntrospectionError> {
        if !edge.child_is_key || edge.is_self_reference() {
            return Ok(false);
        }
        Ok(self.table(&edge.parent)?.is_key_column(&edge.parent_column))
    }

    fn isa_children(&self, table: &TableRef) -> Result<Vec<TableRef>, IntrospectionError> {
        let mut children = Vec::new();
        for fk in self.schema.foreign_keys_to(table) {
            let edge = self.edge(fk)?;
            if self.is_isa_link(&edge)? && !children.contains(&edge.child) {
                children.push(edge.child);
            }
        }
        Ok(children)
    }

    fn shape_of(&self, edge: &ForeignKeyEdge) -> Result<ChildShape, IntrospectionError> {
        if edge.child_is_key {
            return Ok(ChildShape::Plain);
        }

        let child = self.table(&edge.child)?;
        let others: Vec<&ForeignKey> = child
            .foreign_keys
            .iter()
            .filter(|fk| fk.is_single_column() && !fk.from_columns[0].eq_ignore_ascii_case(&edge.child_column))
            .collect();

        if child.primary_key.len() == 2 && child.key_contains(&edge.child_column) && !edge.nullable {
            let m_column = child
                .primary_key
                .iter()
                .find(|k| !k.eq_ignore_ascii_case(&edge.child_column));
            let m_fk = m_column.and_then(|m| {
                others
                    .iter()
                    .find(|fk| fk.from_columns[0].eq_ignore_ascii_case(m))
            });

            if let Some(fk) = m_fk {
                let m_nullable = child
                    .column(&fk.from_columns[0])
                    .map(|c| c.nullable)
                    .unwrap_or(true);
                if !m_nullable {
                    return Ok(ChildShape::Bridge(BridgeEntry {
                        bridge: edge.child.clone(),
                        root_column: edge.child_column.clone(),
                        m_column: fk.from_columns[0].clone(),
                        m_table: fk.target(),
                        m_key: fk.to_columns[0].clone(),
                    }));
                }
            }
        }

        Ok(self.suspect_shape(child, edge, &others))
    }

    /// Two not-null FKs and nothing but key columns besides them, yet the
    /// primary key is not that FK pair.
    fn suspect_shape(&self, child: &Table, edge: &ForeignKeyEdge, others: &[&ForeignKey]) -> ChildShape {
        let [other] = others else {
            return ChildShape::Plain;
        };
        let other_column = &other.from_columns[0];
        let not_null = |name: &str| child.column(name).is_some_and(|c| !c.nullable);

        if edge.nullable || !not_null(other_column) {
            return ChildShape::Plain;
        }

        let only_links = child.columns.iter().all(|c| {
            c.is_named(&edge.child_column) || c.is_named(other_column) || child.key_contains(&c.name)
        });
        if !only_links {
            return ChildShape::Plain;
        }

        ChildShape::SuspectedBridge {
            reason: format!(
                "{} links {} and {} but its primary key ({}) is not the FK pair",
                child.qualified_name(),
                edge.parent,
                other.referenced_table(),
                child.primary_key.join(", ")
            ),
        }
    }

    fn collect_classes(
        &self,
        table: &TableRef,
        classes: &mut Vec<i32>,
        visited: &mut HashSet<TableRef>,
    ) -> Result<(), IntrospectionError> {
        if !visited.insert(table.clone()) {
            return Ok(());
        }
        classes.extend(self.table(table)?.objectclass_ids.iter().copied());
        for child in self.isa_children(table)? {
            self.collect_classes(&child, classes, visited)?;
        }
        Ok(())
    }
}

impl SchemaIntrospector for GraphIntrospector<'_> {
    fn primary_key_column(&self, table: &TableRef) -> Result<String, IntrospectionError> {
        self.table(table)?
            .single_key()
            .map(str::to_string)
            .ok_or_else(|| IntrospectionError::MissingPrimaryKey(table.qualified_name()))
    }

    fn has_column(&self, table: &TableRef, column: &str) -> Result<bool, IntrospectionError> {
        Ok(self.table(table)?.column(column).is_some())
    }

    fn self_referencing_foreign_keys(
        &self,
        table: &TableRef,
    ) -> Result<Vec<ForeignKeyEdge>, IntrospectionError> {
        Ok(self
            .outgoing(table)?
            .into_iter()
            .filter(ForeignKeyEdge::is_self_reference)
            .collect())
    }

    fn child_foreign_keys(&self, table: &TableRef) -> Result<Vec<ChildEdge>, IntrospectionError> {
        self.table(table)?;

        let mut children = Vec::new();
        for fk in self.schema.foreign_keys_to(table) {
            let edge = self.edge(fk)?;
            if edge.is_self_reference() {
                continue;
            }
            let shape = self.shape_of(&edge)?;
            children.push(ChildEdge { edge, shape });
        }
        Ok(children)
    }

    fn parent_foreign_key(
        &self,
        table: &TableRef,
    ) -> Result<Option<ForeignKeyEdge>, IntrospectionError> {
        for edge in self.outgoing(table)? {
            if self.is_isa_link(&edge)? {
                return Ok(Some(edge));
            }
        }
        Ok(None)
    }

    fn referenced_tables(
        &self,
        table: &TableRef,
    ) -> Result<Vec<ReferencedEntry>, IntrospectionError> {
        let mut referenced = Vec::new();
        for edge in self.outgoing(table)? {
            if edge.is_self_reference() || self.is_isa_link(&edge)? {
                continue;
            }
            referenced.push(edge);
        }
        Ok(referenced)
    }

    fn direct_subtype_tables(
        &self,
        table: &TableRef,
    ) -> Result<BTreeMap<i32, TableRef>, IntrospectionError> {
        let mut mapping = BTreeMap::new();
        for subtype in self.isa_children(table)? {
            let mut classes = Vec::new();
            let mut visited = HashSet::from([table.clone()]);
            self.collect_classes(&subtype, &mut classes, &mut visited)?;
            for class in classes {
                mapping.entry(class).or_insert_with(|| subtype.clone());
            }
        }
        Ok(mapping)
    }
}
