//! Storage seam for stacks, template generations and resource instances
//!
//! Rows are plain structured records. The orchestrator only talks to the
//! [`Storage`] trait, so any backend providing read-your-writes per key can
//! stand in for the in-memory one.

mod memory;

pub use memory::{MemoryStore, Table};

use crate::error::StoreError;
use crate::resource::ResourceRecord;
use crate::stack::StackRecord;
use crate::template::TemplateRecord;
use std::fmt;
use std::hash::Hash;

/// A persisted row type
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    /// Storage key issued on create
    type Key: Copy + Ord + Hash + fmt::Debug + fmt::Display + From<u64> + Send + Sync + 'static;

    /// Entity kind used in error messages
    const KIND: &'static str;
}

/// CRUD access to one entity kind
pub trait Repository<R: Record>: Send + Sync {
    /// Insert a row and return its new key
    fn create(&self, record: R) -> Result<R::Key, StoreError>;

    /// Read a row
    fn read(&self, key: R::Key) -> Result<R, StoreError>;

    /// Replace an existing row
    fn update(&self, key: R::Key, record: R) -> Result<(), StoreError>;

    /// Keys of every row matching `filter`, in key order
    fn find(&self, filter: &dyn Fn(&R) -> bool) -> Result<Vec<R::Key>, StoreError>;

    /// Remove a row
    fn delete(&self, key: R::Key) -> Result<(), StoreError>;

    /// Number of rows
    fn len(&self) -> usize;

    /// Check if no rows are stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All repositories the orchestrator needs
pub trait Storage: Send + Sync {
    /// Stack rows
    fn stacks(&self) -> &dyn Repository<StackRecord>;

    /// Template generations
    fn templates(&self) -> &dyn Repository<TemplateRecord>;

    /// Resource instances
    fn resources(&self) -> &dyn Repository<ResourceRecord>;
}
