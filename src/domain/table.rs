use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::foreign_key::{FkAction, ForeignKey};

/// Identity of a table: owning schema plus name.
///
/// Unquoted SQL identifiers fold case, so equality and hashing ignore ASCII
/// case while the original spelling is kept for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn qualified_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for TableRef {}

impl Hash for TableRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.to_ascii_lowercase().hash(state);
        self.name.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    /// Object classes whose instances are stored in this table.
    #[serde(default)]
    pub objectclass_ids: Vec<i32>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            objectclass_ids: Vec::new(),
        }
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.schema.clone(), self.name.clone())
    }

    pub fn qualified_name(&self) -> String {
        self.table_ref().qualified_name()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_named(name))
    }

    /// Returns the key column when the primary key consists of exactly one column.
    pub fn single_key(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [key] => Some(key.as_str()),
            _ => None,
        }
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.single_key()
            .is_some_and(|key| key.eq_ignore_ascii_case(name))
    }

    pub fn key_contains(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k.eq_ignore_ascii_case(name))
    }

    pub fn with_column(mut self, name: &str, data_type: &str, nullable: bool) -> Self {
        self.columns.push(Column::new(name, data_type, nullable));
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Adds a single-column FK to `to_table.to_column` in this table's schema.
    pub fn with_foreign_key(
        mut self,
        column: &str,
        to_table: &str,
        to_column: &str,
        on_delete: FkAction,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            name: format!("{}_{}_fk", self.name, column),
            from_schema: self.schema.clone(),
            from_table: self.name.clone(),
            from_columns: vec![column.to_string()],
            to_schema: self.schema.clone(),
            to_table: to_table.to_string(),
            to_columns: vec![to_column.to_string()],
            on_delete,
        });
        self
    }

    pub fn with_objectclasses(mut self, ids: &[i32]) -> Self {
        self.objectclass_ids = ids.to_vec();
        self
    }
}
