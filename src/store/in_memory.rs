use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::{StoreError, TransactionMode, UnitOfWork, UnitOfWorkFactory};

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// In-memory document store with a unique `_id` per collection.
///
/// Cheap to clone; clones share the same data. Tracks open units of work so
/// tests can assert every unit was disposed.
#[derive(Clone)]
pub struct InMemoryStore {
    collections: Arc<RwLock<Collections>>,
    available: Arc<AtomicBool>,
    open_units: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            open_units: Arc::new(AtomicUsize::new(0)),
            commits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate an outage: while unavailable every operation fails with
    /// `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Units of work begun but not yet disposed.
    pub fn open_units(&self) -> usize {
        self.open_units.load(Ordering::SeqCst)
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Read a committed document.
    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.collections
            .read()
            .ok()?
            .get(collection)?
            .get(id)
            .cloned()
    }

    /// Number of committed documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>, StoreError> {
        self.collections
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>, StoreError> {
        self.collections
            .write()
            .map_err(|_| StoreError::LockPoisoned("write"))
    }
}

impl UnitOfWorkFactory for InMemoryStore {
    type Work = InMemoryUnitOfWork;

    fn begin(&self, mode: TransactionMode) -> Result<InMemoryUnitOfWork, StoreError> {
        self.ensure_available()?;
        self.open_units.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryUnitOfWork {
            store: self.clone(),
            mode,
            staged: Vec::new(),
            disposed: false,
        })
    }
}

#[derive(Debug, Clone)]
enum Write {
    Insert { collection: String, id: String, document: Value },
    Update { collection: String, id: String, document: Value },
    Delete { collection: String, id: String },
}

impl Write {
    fn target(&self) -> (&str, &str) {
        match self {
            Write::Insert { collection, id, .. }
            | Write::Update { collection, id, .. }
            | Write::Delete { collection, id } => (collection.as_str(), id.as_str()),
        }
    }
}

/// Unit of work over an [`InMemoryStore`].
///
/// Non-transactional units write through immediately. Transactional units
/// stage writes, read their own staged writes, and apply everything under a
/// single write lock on `commit`.
pub struct InMemoryUnitOfWork {
    store: InMemoryStore,
    mode: TransactionMode,
    staged: Vec<Write>,
    disposed: bool,
}

impl InMemoryUnitOfWork {
    fn check(&self) -> Result<(), StoreError> {
        if self.disposed {
            return Err(StoreError::Disposed);
        }
        self.store.ensure_available()
    }

    /// Current view of a document: staged writes first, then the store.
    fn current(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        for write in self.staged.iter().rev() {
            if write.target() == (collection, id) {
                return Ok(match write {
                    Write::Insert { document, .. } | Write::Update { document, .. } => {
                        Some(document.clone())
                    }
                    Write::Delete { .. } => None,
                });
            }
        }
        Ok(self
            .store
            .read()?
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn stage_or_apply(&mut self, write: Write) -> Result<(), StoreError> {
        match self.mode {
            TransactionMode::Transactional => {
                self.staged.push(write);
                Ok(())
            }
            TransactionMode::NonTransactional => {
                let mut collections = self.store.write()?;
                apply(&mut collections, write)
            }
        }
    }
}

fn document_id(document: &Value) -> Result<String, StoreError> {
    document
        .get("_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidDocument("missing string _id".to_string()))
}

/// Check a batch of writes against the live collections, tracking the
/// existence each earlier write in the batch leaves behind.
fn validate(collections: &Collections, writes: &[Write]) -> Result<(), StoreError> {
    let mut overlay: HashMap<(&str, &str), bool> = HashMap::new();
    for write in writes {
        let (collection, id) = write.target();
        let exists = match overlay.get(&(collection, id)) {
            Some(exists) => *exists,
            None => collections
                .get(collection)
                .map_or(false, |docs| docs.contains_key(id)),
        };
        let after = match write {
            Write::Insert { .. } if exists => {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
            }
            Write::Update { .. } if !exists => {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
            }
            Write::Insert { .. } | Write::Update { .. } => true,
            Write::Delete { .. } => false,
        };
        overlay.insert((collection, id), after);
    }
    Ok(())
}

fn apply(collections: &mut Collections, write: Write) -> Result<(), StoreError> {
    match write {
        Write::Insert {
            collection,
            id,
            document,
        } => {
            let docs = collections.entry(collection.clone()).or_default();
            if docs.contains_key(&id) {
                return Err(StoreError::DuplicateKey { collection, id });
            }
            docs.insert(id, document);
        }
        Write::Update {
            collection,
            id,
            document,
        } => match collections.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) {
            Some(existing) => *existing = document,
            None => return Err(StoreError::NotFound { collection, id }),
        },
        Write::Delete { collection, id } => {
            if let Some(docs) = collections.get_mut(&collection) {
                docs.remove(&id);
            }
        }
    }
    Ok(())
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn insert(&mut self, collection: &str, document: Value) -> Result<String, StoreError> {
        self.check()?;
        let id = document_id(&document)?;
        if self.current(collection, &id)?.is_some() {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                id,
            });
        }
        self.stage_or_apply(Write::Insert {
            collection: collection.to_string(),
            id: id.clone(),
            document,
        })?;
        Ok(id)
    }

    fn find(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        self.current(collection, id)
    }

    fn update(&mut self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        self.check()?;
        if self.current(collection, id)?.is_none() {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.stage_or_apply(Write::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            document,
        })
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.check()?;
        let existed = self.current(collection, id)?.is_some();
        self.stage_or_apply(Write::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        Ok(existed)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.check()?;
        if !self.staged.is_empty() {
            let mut collections = self.store.write()?;
            // All writes must succeed before any is applied
            validate(&collections, &self.staged)?;
            for write in self.staged.drain(..) {
                apply(&mut collections, write)?;
            }
        }
        self.store.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.staged.clear();
        self.disposed = true;
        self.store.open_units.fetch_sub(1, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}
