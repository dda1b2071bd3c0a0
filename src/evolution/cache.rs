//! Process-local cache of columns known to exist
//!
//! Entries are only valid for one `alter_counter` value. Any other worker
//! finishing an ALTER bumps the counter, which clears the cache.

use std::collections::HashMap;

use crate::schema::Column;

#[derive(Debug, Default)]
pub struct ExistenceCache {
    alter_counter: Option<u64>,
    known: HashMap<String, Column>,
}

impl ExistenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Align the cache with the persisted counter. Returns whether it was cleared.
    pub fn sync(&mut self, alter_counter: u64) -> bool {
        if self.alter_counter == Some(alter_counter) {
            return false;
        }
        self.known.clear();
        self.alter_counter = Some(alter_counter);
        true
    }

    /// Follow a counter bump made by this process. Entries survive only if the
    /// cache was current at `from`.
    pub fn advance(&mut self, from: u64, to: u64) {
        if self.alter_counter != Some(from) {
            self.known.clear();
        }
        self.alter_counter = Some(to);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.known.contains_key(name)
    }

    /// Columns of `columns` not known to exist
    pub fn misses(&self, columns: &[Column]) -> Vec<Column> {
        columns
            .iter()
            .filter(|c| !self.contains(&c.name))
            .cloned()
            .collect()
    }

    pub fn insert_all<'a>(&mut self, columns: impl IntoIterator<Item = &'a Column>) {
        for column in columns {
            self.known.insert(column.name.clone(), column.clone());
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.known.remove(name);
    }

    pub fn alter_counter(&self) -> Option<u64> {
        self.alter_counter
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
