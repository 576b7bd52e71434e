use super::Change;
use crate::core::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// Shared in-memory record store.
///
/// Tables are created lazily on first write. The store only ever holds data
/// that a physical transaction has committed; in-flight changes live in the
/// owning connection's buffer until then.
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Apply a batch of committed changes in order, atomically with respect
    /// to readers.
    pub fn apply(&self, changes: &[Change]) -> Result<()> {
        let mut tables = self.tables.write()?;

        for change in changes {
            match change {
                Change::Put { table, key, value } => {
                    tables
                        .entry(table.clone())
                        .or_default()
                        .insert(key.clone(), value.clone());
                }
                Change::Delete { table, key } => {
                    if let Some(rows) = tables.get_mut(table) {
                        rows.remove(key);
                    }
                }
            }
        }

        Ok(())
    }

    /// Read a committed record
    pub fn get(&self, table: &str, key: &str) -> Result<Option<String>> {
        let tables = self.tables.read()?;
        Ok(tables.get(table).and_then(|rows| rows.get(key)).cloned())
    }

    /// Check whether a committed record exists
    pub fn contains(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self.get(table, key)?.is_some())
    }

    /// Number of committed records in a table (0 for unknown tables)
    pub fn row_count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        Ok(tables.get(table).map(|rows| rows.len()).unwrap_or(0))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
