//! Unit-of-work contract consumed from the persistence layer.
//!
//! Command handlers never see a connection. Each command gets a fresh unit of
//! work from a [`UnitOfWorkFactory`], reaches collections through
//! [`UnitOfWork::repository`], and the executor commits and disposes it.
//!
//! Documents are JSON objects identified by a string `_id`; inserting an `_id`
//! that already exists fails with [`StoreError::DuplicateKey`], which the
//! executor turns into a terminal "already exists" rejection.

mod in_memory;

pub use in_memory::{InMemoryStore, InMemoryUnitOfWork};

use serde_json::Value;
use thiserror::Error;

/// Whether writes are applied immediately or staged until commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    #[default]
    NonTransactional,
    /// Required where several documents must change together, e.g.
    /// enrollment updates touching a course and its users.
    Transactional,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{collection} {id} already exists")]
    DuplicateKey { collection: String, id: String },

    #[error("{collection} {id} not found")]
    NotFound { collection: String, id: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unit of work already disposed")]
    Disposed,

    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// A transactional scope over the document store.
pub trait UnitOfWork: Send {
    fn mode(&self) -> TransactionMode;

    /// Insert a document; its `_id` must be unique in the collection.
    fn insert(&mut self, collection: &str, document: Value) -> Result<String, StoreError>;

    fn find(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Replace an existing document.
    fn update(&mut self, collection: &str, id: &str, document: Value) -> Result<(), StoreError>;

    /// Remove a document. Returns whether it existed.
    fn delete(&mut self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Make staged writes durable.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Release the underlying resources. Uncommitted writes are discarded.
    /// Disposing twice is a no-op.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;

    /// Access one collection.
    fn repository(&mut self, name: &str) -> Repository<'_, Self>
    where
        Self: Sized,
    {
        Repository {
            work: self,
            name: name.to_string(),
        }
    }
}

/// Creates a unit of work per command.
pub trait UnitOfWorkFactory: Send + Sync {
    type Work: UnitOfWork + 'static;

    fn begin(&self, mode: TransactionMode) -> Result<Self::Work, StoreError>;
}

/// A collection seen through a unit of work.
pub struct Repository<'a, W: UnitOfWork> {
    work: &'a mut W,
    name: String,
}

impl<'a, W: UnitOfWork> Repository<'a, W> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, document: Value) -> Result<String, StoreError> {
        self.work.insert(&self.name, document)
    }

    pub fn find(&mut self, id: &str) -> Result<Option<Value>, StoreError> {
        self.work.find(&self.name, id)
    }

    /// Like `find`, but a missing document is an error.
    pub fn get(&mut self, id: &str) -> Result<Value, StoreError> {
        self.find(id)?.ok_or_else(|| StoreError::NotFound {
            collection: self.name.clone(),
            id: id.to_string(),
        })
    }

    pub fn update(&mut self, id: &str, document: Value) -> Result<(), StoreError> {
        self.work.update(&self.name, id, document)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        self.work.delete(&self.name, id)
    }
}
