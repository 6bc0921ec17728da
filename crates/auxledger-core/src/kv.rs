//! Key-value store contract and scoped transactions.
//!
//! The receipt store needs point reads, an atomic batch write and a
//! point-in-time snapshot for reads that span several keys.
//! [`KvTransaction`] layers `set`/`delete` over a backing [`KvStore`] as an
//! in-memory overlay: reads see buffered writes, nothing reaches the backing
//! store until [`KvTransaction::commit`] applies the whole overlay as one
//! [`WriteBatch`]. Dropping a transaction without committing discards it.
//!
//! [`MemoryKvStore`] is the in-memory implementation used by tests; the node
//! uses RocksDB (auxledger-node).

use std::collections::BTreeMap;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::error::LedgerError;

/// A single mutation in a [`WriteBatch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Ordered set of mutations applied atomically by [`KvStore::write`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Point reads over a key-value namespace.
pub trait KvRead {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Default implementation delegates to [`get`](Self::get).
    fn has(&self, key: &[u8]) -> Result<bool, LedgerError> {
        Ok(self.get(key)?.is_some())
    }
}

/// An ordered key-value store with atomic batch writes.
pub trait KvStore: KvRead + Send + Sync {
    /// Apply every operation in `batch` atomically: all or none.
    fn write(&self, batch: WriteBatch) -> Result<(), LedgerError>;

    /// Consistent read view: batches written after this call are not visible
    /// through it.
    fn snapshot(&self) -> Result<Box<dyn KvRead + '_>, LedgerError>;
}

/// Buffered read-your-writes transaction over a [`KvStore`].
///
/// `None` in the overlay marks a buffered delete.
pub struct KvTransaction<'a, S: KvStore + ?Sized> {
    store: &'a S,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore + ?Sized> KvTransaction<'a, S> {
    pub fn begin(store: &'a S) -> Self {
        Self {
            store,
            overlay: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.overlay.insert(key.into(), Some(value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.overlay.insert(key.into(), None);
    }

    /// Number of keys with buffered writes.
    pub fn pending(&self) -> usize {
        self.overlay.len()
    }

    /// Apply all buffered writes to the backing store as one batch.
    ///
    /// On error nothing has been applied.
    pub fn commit(mut self) -> Result<(), LedgerError> {
        let overlay = std::mem::take(&mut self.overlay);
        let mut batch = WriteBatch::default();
        for (key, value) in overlay {
            match value {
                Some(value) => batch.put(key, value),
                None => batch.delete(key),
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        self.store.write(batch)
    }

    /// Discard all buffered writes.
    pub fn rollback(mut self) {
        self.overlay.clear();
    }
}

impl<S: KvStore + ?Sized> KvRead for KvTransaction<'_, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
        match self.overlay.get(key) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.store.get(key),
        }
    }
}

impl<S: KvStore + ?Sized> Drop for KvTransaction<'_, S> {
    fn drop(&mut self) {
        if !self.overlay.is_empty() {
            tracing::debug!(discarded = self.overlay.len(), "rolling back uncommitted writes");
        }
    }
}

/// In-memory key-value store for testing.
///
/// A single `BTreeMap` behind a read-write lock; batches are applied under
/// the write lock so readers never see a partial batch.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of every entry, for comparing store states.
    pub fn entries(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.entries.read().clone()
    }

    /// Write a single key directly, bypassing transactions.
    pub fn put_raw(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Remove a single key directly, bypassing transactions.
    pub fn remove_raw(&self, key: &[u8]) {
        self.entries.write().remove(key);
    }
}

impl KvRead for MemoryKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.entries.read().get(key).cloned())
    }
}

/// Snapshot of a [`MemoryKvStore`]. Holds the read lock, so writers wait
/// until it is dropped.
struct MemorySnapshot<'a>(RwLockReadGuard<'a, BTreeMap<Vec<u8>, Vec<u8>>>);

impl KvRead for MemorySnapshot<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.0.get(key).cloned())
    }
}

impl KvStore for MemoryKvStore {
    fn write(&self, batch: WriteBatch) -> Result<(), LedgerError> {
        let mut entries = self.entries.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Box<dyn KvRead + '_>, LedgerError> {
        Ok(Box::new(MemorySnapshot(self.entries.read())))
    }
}

impl<S: KvRead + ?Sized> KvRead for std::sync::Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> Result<bool, LedgerError> {
        (**self).has(key)
    }
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn write(&self, batch: WriteBatch) -> Result<(), LedgerError> {
        (**self).write(batch)
    }

    fn snapshot(&self) -> Result<Box<dyn KvRead + '_>, LedgerError> {
        (**self).snapshot()
    }
}
