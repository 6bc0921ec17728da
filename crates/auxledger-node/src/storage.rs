//! RocksDB-backed key-value store for the receipt ledger.
//!
//! Implements [`KvStore`] over a single column family. Every key the receipt
//! store writes (list nodes, metadata, per-height indexes) lives there, and
//! each commit is applied as one RocksDB [`WriteBatch`](rocksdb::WriteBatch)
//! for crash safety. Multi-key reads go through a RocksDB snapshot.

use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, Snapshot};

use auxledger_core::error::LedgerError;
use auxledger_core::kv::{BatchOp, KvRead, KvStore, WriteBatch};

/// Column family holding all ledger keys.
pub const CF_EVM_AUX: &str = "evm_aux";

/// RocksDB-backed key-value store.
pub struct RocksKvStore {
    db: DB,
    read_only: bool,
}

impl RocksKvStore {
    /// Open or create a database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_EVM_AUX, Options::default());
        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), vec![cf])
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(Self {
            db,
            read_only: false,
        })
    }

    /// Open an existing database without write access.
    ///
    /// Writes through [`KvStore::write`] fail with a storage error.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db = DB::open_cf_for_read_only(&Options::default(), path.as_ref(), [CF_EVM_AUX], false)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(Self { db, read_only: true })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db
            .flush_cf(self.cf()?)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    /// Manual compaction, reclaiming space left by evicted receipts.
    pub fn compact(&self) -> Result<(), LedgerError> {
        self.db
            .compact_range_cf(self.cf()?, None::<&[u8]>, None::<&[u8]>);
        Ok(())
    }

    fn cf(&self) -> Result<&ColumnFamily, LedgerError> {
        self.db
            .cf_handle(CF_EVM_AUX)
            .ok_or_else(|| LedgerError::Storage(format!("missing column family: {CF_EVM_AUX}")))
    }
}

impl KvRead for RocksKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
        self.db
            .get_cf(self.cf()?, key)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }
}

/// Point-in-time view of the ledger column family.
struct RocksSnapshot<'a> {
    snapshot: Snapshot<'a>,
    cf: &'a ColumnFamily,
}

impl KvRead for RocksSnapshot<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
        self.snapshot
            .get_cf(self.cf, key)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }
}

impl KvStore for RocksKvStore {
    fn write(&self, batch: WriteBatch) -> Result<(), LedgerError> {
        if self.read_only {
            return Err(LedgerError::Storage("database opened read-only".into()));
        }
        let cf = self.cf()?;
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => rocks_batch.put_cf(cf, key, value),
                BatchOp::Delete { key } => rocks_batch.delete_cf(cf, key),
            }
        }
        self.db
            .write(rocks_batch)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    fn snapshot(&self) -> Result<Box<dyn KvRead + '_>, LedgerError> {
        Ok(Box::new(RocksSnapshot {
            cf: self.cf()?,
            snapshot: self.db.snapshot(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (RocksKvStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksKvStore::open(dir.path().join("receipts")).unwrap();
        (store, dir)
    }

    #[test]
    fn missing_key_is_none() {
        let (store, _dir) = temp_store();
        assert_eq!(store.get(b"absent").unwrap(), None);
        assert!(!store.has(b"absent").unwrap());
    }

    #[test]
    fn batch_applies_puts_and_deletes() {
        let (store, _dir) = temp_store();
        let mut batch = WriteBatch::default();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        store.write(batch).unwrap();

        let mut batch = WriteBatch::default();
        batch.delete(b"a".to_vec());
        batch.put(b"c".to_vec(), b"3".to_vec());
        store.write(batch).unwrap();

        assert_eq!(store.get(b"a").unwrap(), None);
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"c").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn snapshot_ignores_later_batches() {
        let (store, _dir) = temp_store();
        let mut batch = WriteBatch::default();
        batch.put(b"a".to_vec(), b"1".to_vec());
        store.write(batch).unwrap();

        let snap = store.snapshot().unwrap();
        let mut batch = WriteBatch::default();
        batch.put(b"a".to_vec(), b"2".to_vec());
        batch.put(b"b".to_vec(), b"3".to_vec());
        store.write(batch).unwrap();

        assert_eq!(snap.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(!snap.has(b"b").unwrap());
        assert_eq!(store.get(b"a").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipts");
        {
            let store = RocksKvStore::open(&path).unwrap();
            let mut batch = WriteBatch::default();
            batch.put(b"k".to_vec(), b"v".to_vec());
            store.write(batch).unwrap();
            store.flush().unwrap();
        }

        let ro = RocksKvStore::open_read_only(&path).unwrap();
        assert!(ro.is_read_only());
        assert_eq!(ro.get(b"k").unwrap(), Some(b"v".to_vec()));

        let mut batch = WriteBatch::default();
        batch.put(b"x".to_vec(), b"y".to_vec());
        let err = ro.write(batch).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn read_only_open_of_missing_db_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RocksKvStore::open_read_only(dir.path().join("nothing-here")).is_err());
    }

    #[test]
    fn compact_and_flush_succeed() {
        let (store, _dir) = temp_store();
        let mut batch = WriteBatch::default();
        batch.put(b"k".to_vec(), vec![7u8; 128]);
        store.write(batch).unwrap();
        store.flush().unwrap();
        store.compact().unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(vec![7u8; 128]));
    }
}
