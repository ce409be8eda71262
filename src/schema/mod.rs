//! Table and column definitions.
//!
//! A table is a named group of numeric columns sampled over time. Tables are
//! defined once per file and never change afterwards; every data block in the
//! file refers to its table by a small integer id.
//!
//! Ids are not stored on disk. Both the writer and every reader assign them
//! in definition order through a [`SchemaCatalog`], so the n-th table
//! definition in a file always has id `n`.
//!
//! Definitions are stored by field name. Fields a reader does not know are
//! skipped, and fields an older writer did not know take their defaults.

mod catalog;

pub use catalog::SchemaCatalog;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a table within one log file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name, unique within its table.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Unit of measurement, e.g. `"ms"` or `"bytes"`.
    #[serde(default)]
    pub unit: String,
}

impl ColumnDef {
    /// Create a new column definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), description: description.into(), unit: unit.into() }
    }

    /// Create a column with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, "", "")
    }
}

/// Definition of a table as written to the log.
///
/// The `id` is not part of the serialized payload; it is assigned by the
/// catalog that registers the definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Catalog-assigned id.
    #[serde(skip)]
    pub id: TableId,
    /// Table name, unique within a file.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Nominal sampling interval in milliseconds. Advisory only.
    #[serde(default)]
    pub sample_interval_millis: u64,
    /// Columns in value order.
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Number of columns, i.e. the required arity of every row.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column names in value order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
