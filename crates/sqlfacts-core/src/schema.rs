//! Schema Model built from uploaded DDL
//!
//! Keys are lower-cased on insertion so every lookup is case-insensitive.
//! A model is built once and then only read; a re-upload replaces it wholesale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-column detail of a table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDetail {
    pub name: String,

    /// Canonical display type, e.g. `VARCHAR(255)` or `NUMERIC(10,2)`
    pub data_type: String,

    pub nullable: bool,

    pub is_primary_key: bool,

    pub is_foreign_key: bool,
}

impl ColumnDetail {
    /// Create a nullable, non-key column
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
            is_foreign_key: false,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Primary-key membership always forces the column non-nullable
    pub fn with_primary_key(mut self, is_primary_key: bool) -> Self {
        self.is_primary_key = is_primary_key;
        if is_primary_key {
            self.nullable = false;
        }
        self
    }

    pub fn with_foreign_key(mut self, is_foreign_key: bool) -> Self {
        self.is_foreign_key = is_foreign_key;
        self
    }
}

/// A table definition with its columns in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDetail {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    pub columns: Vec<ColumnDetail>,
}

impl TableDetail {
    pub fn new(name: impl Into<String>, schema: Option<String>) -> Self {
        Self {
            name: name.into(),
            schema,
            columns: Vec::new(),
        }
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDetail> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Validator reference structure: table → column → canonical type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModel {
    /// Lower-cased table name → lower-cased column name → type
    pub tables: BTreeMap<String, BTreeMap<String, String>>,

    /// Declaration-ordered detail form with nullability and key flags
    pub table_details: Vec<TableDetail>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table definition, replacing any earlier one of the same name
    pub fn insert_table(&mut self, detail: TableDetail) {
        let key = detail.name.to_lowercase();

        let columns = detail
            .columns
            .iter()
            .map(|c| (c.name.to_lowercase(), c.data_type.clone()))
            .collect();
        self.tables.insert(key.clone(), columns);

        match self
            .table_details
            .iter_mut()
            .find(|t| t.name.to_lowercase() == key)
        {
            Some(existing) => *existing = detail,
            None => self.table_details.push(detail),
        }
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    pub fn table_columns(&self, table: &str) -> Option<&BTreeMap<String, String>> {
        self.tables.get(&table.to_lowercase())
    }

    /// Canonical type of `table.column`, if both are known
    pub fn column_type(&self, table: &str, column: &str) -> Option<&str> {
        self.table_columns(table)?
            .get(&column.to_lowercase())
            .map(String::as_str)
    }

    pub fn table_detail(&self, table: &str) -> Option<&TableDetail> {
        self.table_details
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(table))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
