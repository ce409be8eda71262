//! Name → id → definition mapping shared by writers and readers.

use super::{ColumnDef, TableDef, TableId};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// In-memory catalog of the tables defined in one log file.
///
/// Ids are dense and handed out in registration order, which is also the
/// order definitions appear in the file.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    tables: Vec<Arc<TableDef>>,
    by_name: HashMap<String, TableId>,
}

impl SchemaCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new table and assign it the next id.
    ///
    /// Fails with [`Error::DuplicateTable`] if the name is already taken and
    /// with [`Error::InvalidArgument`] if the definition is malformed. The
    /// catalog is unchanged on failure.
    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        sample_interval_millis: u64,
        columns: Vec<ColumnDef>,
    ) -> Result<Arc<TableDef>> {
        self.insert(TableDef {
            id: TableId::default(),
            name: name.to_string(),
            description: description.to_string(),
            sample_interval_millis,
            columns,
        })
    }

    /// Check that `table` could be registered, without registering it.
    pub fn check(&self, table: &TableDef) -> Result<()> {
        validate(table)?;
        if self.by_name.contains_key(&table.name) {
            return Err(Error::DuplicateTable(table.name.clone()));
        }
        self.next_id().map(|_| ())
    }

    /// Register a definition, overwriting its id with the next free one.
    pub fn insert(&mut self, mut table: TableDef) -> Result<Arc<TableDef>> {
        self.check(&table)?;
        let id = self.next_id()?;
        table.id = id;

        let table = Arc::new(table);
        self.by_name.insert(table.name.clone(), id);
        self.tables.push(Arc::clone(&table));
        Ok(table)
    }

    fn next_id(&self) -> Result<TableId> {
        u32::try_from(self.tables.len())
            .map(TableId)
            .map_err(|_| Error::invalid_argument("too many tables in one log file"))
    }

    /// Look up a table by id.
    pub fn get(&self, id: TableId) -> Option<&Arc<TableDef>> {
        self.tables.get(id.0 as usize)
    }

    /// Look up a table by name.
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<TableDef>> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table has been registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TableDef>> {
        self.tables.iter()
    }
}

fn validate(table: &TableDef) -> Result<()> {
    if table.name.is_empty() {
        return Err(Error::invalid_argument("table name cannot be empty"));
    }
    if table.columns.is_empty() {
        return Err(Error::invalid_argument(format!(
            "table '{}' must have at least one column",
            table.name
        )));
    }

    let mut seen = HashSet::with_capacity(table.columns.len());
    for column in &table.columns {
        if column.name.is_empty() {
            return Err(Error::invalid_argument(format!(
                "table '{}' has a column with an empty name",
                table.name
            )));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(Error::invalid_argument(format!(
                "table '{}' has duplicate column '{}'",
                table.name, column.name
            )));
        }
    }
    Ok(())
}
