//! In-memory storage backend

use super::{Record, Repository, Storage};
use crate::error::StoreError;
use crate::resource::ResourceRecord;
use crate::stack::StackRecord;
use crate::template::TemplateRecord;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One table of rows with sequential keys starting at 1
#[derive(Debug)]
pub struct Table<R: Record> {
    rows: RwLock<BTreeMap<R::Key, R>>,
    next_key: AtomicU64,
}

impl<R: Record> Table<R> {
    /// Create empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_key: AtomicU64::new(1),
        }
    }

    /// Remove every row; keys keep increasing
    pub fn clear(&self) {
        self.rows.write().clear();
    }

    /// Snapshot of every row in key order
    #[must_use]
    pub fn rows(&self) -> Vec<(R::Key, R)> {
        self.rows
            .read()
            .iter()
            .map(|(key, row)| (*key, row.clone()))
            .collect()
    }
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Repository<R> for Table<R> {
    fn create(&self, record: R) -> Result<R::Key, StoreError> {
        let key = R::Key::from(self.next_key.fetch_add(1, Ordering::SeqCst));
        self.rows.write().insert(key, record);
        Ok(key)
    }

    fn read(&self, key: R::Key) -> Result<R, StoreError> {
        self.rows
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(R::KIND, key))
    }

    fn update(&self, key: R::Key, record: R) -> Result<(), StoreError> {
        match self.rows.write().get_mut(&key) {
            Some(row) => {
                *row = record;
                Ok(())
            }
            None => Err(StoreError::not_found(R::KIND, key)),
        }
    }

    fn find(&self, filter: &dyn Fn(&R) -> bool) -> Result<Vec<R::Key>, StoreError> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|(_, row)| filter(row))
            .map(|(key, _)| *key)
            .collect())
    }

    fn delete(&self, key: R::Key) -> Result<(), StoreError> {
        self.rows
            .write()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(R::KIND, key))
    }

    fn len(&self) -> usize {
        self.rows.read().len()
    }
}

/// Process-local store for tests and the simulator
#[derive(Debug, Default)]
pub struct MemoryStore {
    stacks: Table<StackRecord>,
    templates: Table<TemplateRecord>,
    resources: Table<ResourceRecord>,
}

impl MemoryStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every row of every table
    pub fn clear(&self) {
        self.stacks.clear();
        self.templates.clear();
        self.resources.clear();
    }

    /// Resource table, for inspection
    #[must_use]
    pub fn resource_table(&self) -> &Table<ResourceRecord> {
        &self.resources
    }
}

impl Storage for MemoryStore {
    fn stacks(&self) -> &dyn Repository<StackRecord> {
        &self.stacks
    }

    fn templates(&self) -> &dyn Repository<TemplateRecord> {
        &self.templates
    }

    fn resources(&self) -> &dyn Repository<ResourceRecord> {
        &self.resources
    }
}
