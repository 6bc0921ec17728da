//! Bounded, insertion-ordered receipt store.
//!
//! Receipts form a singly-linked list materialized directly in the key-value
//! namespace: each node is stored under its transaction hash and points at
//! its successor by hash. A metadata record tracks `size`, `head` (oldest)
//! and `tail` (newest). Appends touch the old tail and the new node only;
//! eviction walks forward from the head, so the store never needs a separate
//! ordered index.
//!
//! Each commit also writes two per-height indexes: the hashes of the
//! successful transactions at that height and a logs bloom over every event
//! committed there.
//!
//! All writes of a commit go through one [`KvTransaction`]; any error before
//! the final commit drops the transaction and nothing becomes visible. Reads
//! that touch more than one key run against a backend snapshot, so they
//! never mix state from before and after a concurrent commit.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::bloom::LogsBloom;
use crate::constants::{
    height_key, BLOOM_FILTER_PREFIX, DEFAULT_MAX_RECEIPTS, META_HEAD_KEY, META_SIZE_KEY,
    META_TAIL_KEY, TX_HASH_LIST_PREFIX,
};
use crate::error::{LedgerError, ReceiptError, ResultExt};
use crate::kv::{KvRead, KvStore, KvTransaction};
use crate::traits::ReadReceipts;
use crate::types::{HeightReceipts, Receipt, ReceiptNode, StoreMetadata};

/// Receipt store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptStoreConfig {
    /// Maximum number of receipts retained. Zero disables the store.
    pub max_receipts: u64,
}

impl Default for ReceiptStoreConfig {
    fn default() -> Self {
        Self {
            max_receipts: DEFAULT_MAX_RECEIPTS,
        }
    }
}

/// Size-capped receipt history over a [`KvStore`].
pub struct ReceiptStore<S: KvStore> {
    db: S,
    config: ReceiptStoreConfig,
    /// Serializes commits; readers never take it.
    writer: Mutex<()>,
}

impl<S: KvStore> ReceiptStore<S> {
    pub fn new(db: S, config: ReceiptStoreConfig) -> Self {
        Self {
            db,
            config,
            writer: Mutex::new(()),
        }
    }

    pub fn max_receipts(&self) -> u64 {
        self.config.max_receipts
    }

    /// The backing key-value store.
    pub fn db(&self) -> &S {
        &self.db
    }

    /// Point lookup of a receipt by transaction hash. Does not walk the list.
    ///
    /// # Errors
    ///
    /// - [`ReceiptError::NotFound`] if the key is absent or its payload is empty
    /// - [`ReceiptError::Decode`] if the stored node is malformed
    pub fn get_receipt(&self, tx_hash: &[u8]) -> Result<Receipt, LedgerError> {
        match load_node(&self.db, tx_hash)? {
            Some(node) => Ok(node.receipt),
            None => Err(ReceiptError::NotFound(hex::encode(tx_hash)).into()),
        }
    }

    /// Current `size`, `head` and `tail`.
    pub fn metadata(&self) -> Result<StoreMetadata, LedgerError> {
        let snap = self.db.snapshot()?;
        read_metadata(&*snap)
    }

    /// Hashes of successful transactions committed at `height`.
    ///
    /// A height that was never committed yields an empty list.
    pub fn tx_hash_list(&self, height: u64) -> Result<Vec<Vec<u8>>, LedgerError> {
        read_tx_hash_list(&self.db, height)
    }

    /// Encoded logs bloom for `height`, `None` if the height was never committed.
    pub fn bloom_filter(&self, height: u64) -> Result<Option<Vec<u8>>, LedgerError> {
        self.db.get(&height_key(BLOOM_FILTER_PREFIX, height))
    }

    /// Tx hashes, bloom and optionally the receipts committed at `height`,
    /// read from one snapshot.
    ///
    /// # Errors
    ///
    /// - [`ReceiptError::NotFound`] if a listed receipt was already evicted
    /// - decode and backend storage errors
    pub fn height_receipts(&self, height: u64, with_receipts: bool) -> Result<HeightReceipts, LedgerError> {
        let snap = self.db.snapshot()?;
        let tx_hashes = read_tx_hash_list(&*snap, height).op("getting tx hash")?;
        let logs_bloom = snap
            .get(&height_key(BLOOM_FILTER_PREFIX, height))
            .op("reading bloom filter")?;

        let mut receipts = Vec::new();
        if with_receipts {
            receipts.reserve(tx_hashes.len());
            for hash in &tx_hashes {
                let node = load_node(&*snap, hash)
                    .and_then(|node| node.ok_or_else(|| ReceiptError::NotFound(hex::encode(hash)).into()))
                    .op("reading receipt")?;
                receipts.push(node.receipt);
            }
        }
        Ok(HeightReceipts {
            tx_hashes,
            logs_bloom,
            receipts,
        })
    }

    /// Append a block's receipts, evict the oldest entries over the cap and
    /// write the per-height indexes, all in one atomic commit.
    ///
    /// No-op for an empty batch or when `max_receipts` is zero. Receipts with
    /// an empty hash are skipped. Re-committing a hash already in the store
    /// replaces its receipt in place: list position and `size` are unchanged.
    ///
    /// # Errors
    ///
    /// Any error leaves the store exactly as it was before the call:
    /// - [`ReceiptError::MissingHead`] / [`ReceiptError::MissingTail`] /
    ///   [`ReceiptError::TailNodeMissing`] on inconsistent metadata
    /// - [`ReceiptError::ShortEviction`] if the list is shorter than `size`
    /// - decode/encode and backend storage errors
    pub fn commit_receipts(&self, receipts: &[Receipt], height: u64) -> Result<(), LedgerError> {
        if receipts.is_empty() || self.config.max_receipts == 0 {
            return Ok(());
        }
        let _writer = self.writer.lock();
        let mut tx = KvTransaction::begin(&self.db);

        let StoreMetadata { mut size, mut head, mut tail } =
            read_metadata(&tx).op("getting db params")?;

        // The node currently at the tail of the list, not yet re-persisted.
        let mut tail_node = if head.is_empty() {
            None
        } else {
            let node = load_node(&tx, &tail)
                .op("unmarshalling tail")?
                .ok_or_else(|| ReceiptError::TailNodeMissing(hex::encode(&tail)))?;
            Some(node)
        };

        let mut tx_hashes = Vec::new();
        // Hashes linked by this batch, so duplicates within it are detected
        // before the tail that holds them has been persisted.
        let mut linked: HashSet<Vec<u8>> = HashSet::new();

        for receipt in receipts {
            if receipt.tx_hash.is_empty() {
                continue;
            }

            if receipt.tx_hash == tail {
                // Re-commit of the current tail: replace in place.
                if let Some(node) = tail_node.as_mut() {
                    node.receipt = receipt.clone();
                }
            } else if linked.contains(&receipt.tx_hash) || tx.has(&receipt.tx_hash)? {
                // Already linked further up the list: replace the payload,
                // keep the successor pointer.
                let mut node = load_node(&tx, &receipt.tx_hash)
                    .op("loading re-committed receipt")?
                    .ok_or_else(|| {
                        ReceiptError::BrokenList(format!(
                            "receipt {} vanished during commit",
                            hex::encode(&receipt.tx_hash)
                        ))
                    })?;
                node.receipt = receipt.clone();
                tx.set(receipt.tx_hash.clone(), node.encode().op("marshal receipt item")?);
                debug!(tx_hash = %hex::encode(&receipt.tx_hash), "receipt re-committed in place");
            } else {
                match tail_node.take() {
                    None => head = receipt.tx_hash.clone(),
                    Some(mut prev) => {
                        prev.next_hash = receipt.tx_hash.clone();
                        if put_node(&mut tx, &tail, &prev).op("marshal receipt item")? {
                            size += 1;
                        }
                    }
                }
                tail = receipt.tx_hash.clone();
                tail_node = Some(ReceiptNode::tail(receipt.clone()));
                linked.insert(receipt.tx_hash.clone());
            }

            if receipt.is_success() {
                tx_hashes.push(receipt.tx_hash.clone());
            }
        }

        if let Some(last) = &tail_node {
            if put_node(&mut tx, &tail, last).op("marshal receipt item")? {
                size += 1;
            }
        }

        if size > self.config.max_receipts {
            let excess = size - self.config.max_receipts;
            let (new_head, deleted) =
                remove_old_entries(&mut tx, head, excess).op("removing old receipts")?;
            size = size.checked_sub(deleted).ok_or(ReceiptError::InvalidDeleteCount { size, deleted })?;
            head = new_head;
            info!(evicted = deleted, size, "evicted oldest receipts");
        }

        write_metadata(&mut tx, size, &head, &tail);

        let encoded_hashes = bincode::encode_to_vec(&tx_hashes, bincode::config::standard())
            .map_err(|e| ReceiptError::Encode {
                what: "tx hash list",
                reason: e.to_string(),
            })
            .op("append tx list")?;
        let bloom = LogsBloom::from_events(
            receipts
                .iter()
                .filter(|r| !r.tx_hash.is_empty())
                .flat_map(|r| &r.logs),
        );
        tx.set(height_key(TX_HASH_LIST_PREFIX, height), encoded_hashes);
        tx.set(height_key(BLOOM_FILTER_PREFIX, height), bloom.to_bytes());

        tx.commit().op("committing receipts")?;
        debug!(height, receipts = receipts.len(), successful = tx_hashes.len(), size, "receipts committed");
        Ok(())
    }

    /// Walk the list from head to tail and check it against the metadata.
    ///
    /// Returns the number of nodes visited, which equals `size` on success.
    pub fn verify_integrity(&self) -> Result<u64, LedgerError> {
        let snap = self.db.snapshot()?;
        let meta = read_metadata(&*snap).op("getting db params")?;
        if meta.is_empty() {
            return Ok(0);
        }

        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut last = meta.head.clone();
        loop {
            if !seen.insert(last.clone()) {
                return Err(ReceiptError::BrokenList(format!("cycle at {}", hex::encode(&last))).into());
            }
            if seen.len() as u64 > meta.size {
                return Err(ReceiptError::BrokenList(format!("list longer than size {}", meta.size)).into());
            }
            let node = load_node(&*snap, &last)?.ok_or_else(|| {
                ReceiptError::BrokenList(format!("missing node {}", hex::encode(&last)))
            })?;
            if node.is_tail() {
                break;
            }
            last = node.next_hash;
        }

        let visited = seen.len() as u64;
        if visited != meta.size {
            return Err(ReceiptError::BrokenList(format!(
                "visited {visited} nodes, size is {}",
                meta.size
            ))
            .into());
        }
        if last != meta.tail {
            return Err(ReceiptError::BrokenList(format!(
                "list ends at {}, tail is {}",
                hex::encode(&last),
                hex::encode(&meta.tail)
            ))
            .into());
        }
        Ok(visited)
    }
}

impl<S: KvStore> ReadReceipts for ReceiptStore<S> {
    fn receipt(&self, tx_hash: &[u8]) -> Result<Receipt, LedgerError> {
        self.get_receipt(tx_hash)
    }

    fn tx_hash_list(&self, height: u64) -> Result<Vec<Vec<u8>>, LedgerError> {
        ReceiptStore::tx_hash_list(self, height)
    }

    fn bloom_filter(&self, height: u64) -> Result<Option<Vec<u8>>, LedgerError> {
        ReceiptStore::bloom_filter(self, height)
    }

    fn height_receipts(&self, height: u64, with_receipts: bool) -> Result<HeightReceipts, LedgerError> {
        ReceiptStore::height_receipts(self, height, with_receipts)
    }
}

// --- Internal helpers ---

/// Read and validate the metadata record. Absent metadata is an empty store.
fn read_metadata<R: KvRead + ?Sized>(db: &R) -> Result<StoreMetadata, LedgerError> {
    let Some(size_bytes) = db.get(META_SIZE_KEY)? else {
        return Ok(StoreMetadata::default());
    };
    let size_arr: [u8; 8] = size_bytes
        .as_slice()
        .try_into()
        .map_err(|_| ReceiptError::InvalidSizeValue(size_bytes.len()))?;
    let size = u64::from_le_bytes(size_arr);
    if size == 0 {
        return Ok(StoreMetadata::default());
    }

    let head = db.get(META_HEAD_KEY)?.unwrap_or_default();
    if head.is_empty() {
        return Err(ReceiptError::MissingHead.into());
    }
    let tail = db.get(META_TAIL_KEY)?.unwrap_or_default();
    if tail.is_empty() {
        return Err(ReceiptError::MissingTail.into());
    }
    Ok(StoreMetadata { size, head, tail })
}

/// Decode the successful tx hashes stored for `height`; absent is empty.
fn read_tx_hash_list<R: KvRead + ?Sized>(db: &R, height: u64) -> Result<Vec<Vec<u8>>, LedgerError> {
    let Some(bytes) = db.get(&height_key(TX_HASH_LIST_PREFIX, height))? else {
        return Ok(Vec::new());
    };
    let (hashes, _): (Vec<Vec<u8>>, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
        .map_err(|e| ReceiptError::Decode {
            what: "tx hash list",
            reason: e.to_string(),
        })?;
    Ok(hashes)
}

fn write_metadata<S: KvStore + ?Sized>(tx: &mut KvTransaction<'_, S>, size: u64, head: &[u8], tail: &[u8]) {
    tx.set(META_HEAD_KEY, head);
    tx.set(META_TAIL_KEY, tail);
    tx.set(META_SIZE_KEY, size.to_le_bytes());
}

/// Load and decode a list node. An absent key or empty payload is `None`.
fn load_node<R: KvRead + ?Sized>(db: &R, key: &[u8]) -> Result<Option<ReceiptNode>, LedgerError> {
    match db.get(key)? {
        Some(bytes) if !bytes.is_empty() => Ok(Some(ReceiptNode::decode(&bytes)?)),
        _ => Ok(None),
    }
}

/// Persist a node. Returns `true` if the key did not exist before.
fn put_node<S: KvStore + ?Sized>(
    tx: &mut KvTransaction<'_, S>,
    key: &[u8],
    node: &ReceiptNode,
) -> Result<bool, LedgerError> {
    let encoded = node.encode()?;
    let created = !tx.has(key)?;
    tx.set(key, encoded);
    Ok(created)
}

/// Delete `count` nodes starting at `head`, following `next_hash`.
///
/// Returns the new head (empty if the list was consumed) and the number of
/// nodes deleted. Stopping short of `count` means `size` overstated the list
/// and is reported as [`ReceiptError::ShortEviction`].
fn remove_old_entries<S: KvStore + ?Sized>(
    tx: &mut KvTransaction<'_, S>,
    mut head: Vec<u8>,
    count: u64,
) -> Result<(Vec<u8>, u64), LedgerError> {
    let mut deleted = 0u64;
    while deleted < count && !head.is_empty() {
        let Some(node) = load_node(&*tx, &head).op("unmarshal head")? else {
            break;
        };
        tx.delete(head);
        deleted += 1;
        head = node.next_hash;
    }
    if deleted < count {
        return Err(ReceiptError::ShortEviction {
            requested: count,
            deleted,
        }
        .into());
    }
    Ok((head, deleted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryKvStore, WriteBatch};
    use crate::types::{LogEvent, ReceiptStatus};

    fn store(max: u64) -> ReceiptStore<MemoryKvStore> {
        ReceiptStore::new(MemoryKvStore::new(), ReceiptStoreConfig { max_receipts: max })
    }

    fn ok(hash: &str) -> Receipt {
        Receipt::new(hash, ReceiptStatus::Success, vec![])
    }

    fn failed(hash: &str) -> Receipt {
        Receipt::new(hash, ReceiptStatus::Failure, vec![])
    }

    fn with_topic(hash: &str, status: ReceiptStatus, topic: &str) -> Receipt {
        Receipt::new(hash, status, vec![LogEvent::new(Vec::new(), vec![topic.as_bytes().to_vec()], Vec::new())])
    }

    /// Hashes from head to tail.
    fn walk(store: &ReceiptStore<MemoryKvStore>) -> Vec<Vec<u8>> {
        let meta = store.metadata().unwrap();
        let mut out = Vec::new();
        let mut cursor = meta.head;
        while !cursor.is_empty() {
            let node = load_node(store.db(), &cursor).unwrap().unwrap();
            out.push(cursor);
            cursor = node.next_hash;
        }
        out
    }

    fn hashes(names: &[&str]) -> Vec<Vec<u8>> {
        names.iter().map(|n| n.as_bytes().to_vec()).collect()
    }

    #[test]
    fn empty_store_metadata() {
        let s = store(5);
        assert_eq!(s.metadata().unwrap(), StoreMetadata::default());
        assert_eq!(s.verify_integrity().unwrap(), 0);
    }

    #[test]
    fn get_receipt_missing_is_not_found() {
        let s = store(5);
        let err = s.get_receipt(b"nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, LedgerError::Receipt(ReceiptError::NotFound(_))));
    }

    #[test]
    fn get_receipt_empty_payload_is_not_found() {
        let s = store(5);
        s.db().put_raw(b"a".to_vec(), Vec::new());
        assert!(s.get_receipt(b"a").unwrap_err().is_not_found());
    }

    #[test]
    fn get_receipt_malformed_is_decode_error() {
        let s = store(5);
        s.db().put_raw(b"a".to_vec(), vec![0xFF; 4]);
        let err = s.get_receipt(b"a").unwrap_err();
        assert!(matches!(err, LedgerError::Receipt(ReceiptError::Decode { .. })));
    }

    #[test]
    fn commit_empty_batch_is_noop() {
        let s = store(5);
        s.commit_receipts(&[], 1).unwrap();
        assert!(s.db().is_empty());
    }

    #[test]
    fn commit_with_zero_cap_is_noop() {
        let s = store(0);
        s.commit_receipts(&[ok("a")], 1).unwrap();
        assert!(s.db().is_empty());
    }

    #[test]
    fn end_to_end_single_receipt() {
        let s = store(5);
        let r = with_topic("a", ReceiptStatus::Success, "T1");
        s.commit_receipts(&[r.clone()], 10).unwrap();

        assert_eq!(s.get_receipt(b"a").unwrap(), r);
        assert_eq!(s.tx_hash_list(10).unwrap(), hashes(&["a"]));
        let bloom = LogsBloom::from_bytes(&s.bloom_filter(10).unwrap().unwrap()).unwrap();
        assert!(bloom.may_contain(b"T1"));

        let meta = s.metadata().unwrap();
        assert_eq!(meta.size, 1);
        assert_eq!(meta.head, b"a".to_vec());
        assert_eq!(meta.tail, b"a".to_vec());
    }

    #[test]
    fn commit_links_in_input_order() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), ok("b")], 1).unwrap();
        s.commit_receipts(&[ok("c")], 2).unwrap();
        assert_eq!(walk(&s), hashes(&["a", "b", "c"]));
        assert_eq!(s.metadata().unwrap().size, 3);
        assert_eq!(s.verify_integrity().unwrap(), 3);
    }

    #[test]
    fn only_successful_hashes_are_indexed() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), failed("b"), ok("c")], 4).unwrap();
        assert_eq!(s.tx_hash_list(4).unwrap(), hashes(&["a", "c"]));
        // Failed receipts are still stored.
        assert_eq!(s.get_receipt(b"b").unwrap().status, ReceiptStatus::Failure);
    }

    #[test]
    fn bloom_includes_failed_receipt_logs() {
        let s = store(10);
        s.commit_receipts(
            &[
                with_topic("a", ReceiptStatus::Success, "T1"),
                with_topic("b", ReceiptStatus::Failure, "T2"),
            ],
            3,
        )
        .unwrap();
        let bloom = LogsBloom::from_bytes(&s.bloom_filter(3).unwrap().unwrap()).unwrap();
        assert!(bloom.may_contain(b"T1"));
        assert!(bloom.may_contain(b"T2"));
    }

    #[test]
    fn uncommitted_height_has_empty_index() {
        let s = store(10);
        assert!(s.tx_hash_list(99).unwrap().is_empty());
        assert!(s.bloom_filter(99).unwrap().is_none());
    }

    #[test]
    fn empty_hashes_are_skipped() {
        let s = store(10);
        s.commit_receipts(&[ok(""), ok("a"), ok("")], 1).unwrap();
        assert_eq!(walk(&s), hashes(&["a"]));
        assert_eq!(s.metadata().unwrap().size, 1);
        assert_eq!(s.tx_hash_list(1).unwrap(), hashes(&["a"]));
    }

    #[test]
    fn eviction_keeps_most_recent() {
        let s = store(3);
        s.commit_receipts(&[ok("a"), ok("b")], 1).unwrap();
        s.commit_receipts(&[ok("c"), ok("d")], 2).unwrap();
        s.commit_receipts(&[ok("e")], 3).unwrap();

        assert_eq!(walk(&s), hashes(&["c", "d", "e"]));
        let meta = s.metadata().unwrap();
        assert_eq!(meta.size, 3);
        assert_eq!(meta.head, b"c".to_vec());
        assert!(s.get_receipt(b"a").unwrap_err().is_not_found());
        assert!(s.get_receipt(b"b").unwrap_err().is_not_found());
        assert!(s.get_receipt(b"c").is_ok());
    }

    #[test]
    fn eviction_within_single_oversized_batch() {
        let s = store(2);
        s.commit_receipts(&[ok("a"), ok("b"), ok("c"), ok("d")], 1).unwrap();
        assert_eq!(walk(&s), hashes(&["c", "d"]));
        assert_eq!(s.metadata().unwrap().size, 2);
        // The height index still lists every successful tx of the batch.
        assert_eq!(s.tx_hash_list(1).unwrap(), hashes(&["a", "b", "c", "d"]));
    }

    #[test]
    fn cap_of_one_keeps_only_latest() {
        let s = store(1);
        for (height, name) in ["a", "b", "c"].iter().enumerate() {
            s.commit_receipts(&[ok(name)], height as u64 + 1).unwrap();
            assert_eq!(walk(&s), hashes(&[*name]));
        }
        assert_eq!(s.verify_integrity().unwrap(), 1);
    }

    #[test]
    fn recommit_of_tail_does_not_grow() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), ok("b")], 1).unwrap();
        s.commit_receipts(&[failed("b")], 2).unwrap();
        assert_eq!(s.metadata().unwrap().size, 2);
        assert_eq!(walk(&s), hashes(&["a", "b"]));
        assert_eq!(s.get_receipt(b"b").unwrap().status, ReceiptStatus::Failure);
    }

    #[test]
    fn recommit_of_interior_hash_keeps_list_intact() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), ok("b"), ok("c")], 1).unwrap();
        s.commit_receipts(&[with_topic("a", ReceiptStatus::Success, "X"), ok("d")], 2).unwrap();

        assert_eq!(walk(&s), hashes(&["a", "b", "c", "d"]));
        assert_eq!(s.metadata().unwrap().size, 4);
        assert_eq!(s.verify_integrity().unwrap(), 4);
        assert_eq!(s.get_receipt(b"a").unwrap().logs.len(), 1);
        assert_eq!(s.tx_hash_list(2).unwrap(), hashes(&["a", "d"]));
    }

    #[test]
    fn duplicate_within_batch_counts_once() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), ok("b"), ok("a")], 1).unwrap();
        assert_eq!(s.metadata().unwrap().size, 2);
        assert_eq!(walk(&s), hashes(&["a", "b"]));
        assert_eq!(s.verify_integrity().unwrap(), 2);
    }

    #[test]
    fn missing_tail_node_aborts_without_writes() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), ok("b")], 1).unwrap();
        s.db().remove_raw(b"b");
        let before = s.db().entries();

        let err = s.commit_receipts(&[ok("c")], 2).unwrap_err();
        assert!(matches!(err.root(), LedgerError::Receipt(ReceiptError::TailNodeMissing(_))));
        assert_eq!(s.db().entries(), before);
        assert!(s.get_receipt(b"c").unwrap_err().is_not_found());
    }

    #[test]
    fn missing_head_pointer_is_corruption() {
        let s = store(10);
        s.commit_receipts(&[ok("a")], 1).unwrap();
        s.db().remove_raw(META_HEAD_KEY);
        let err = s.commit_receipts(&[ok("b")], 2).unwrap_err();
        assert_eq!(err.to_string(), "getting db params: no head for non zero size receipt db");
    }

    #[test]
    fn missing_tail_pointer_is_corruption() {
        let s = store(10);
        s.commit_receipts(&[ok("a")], 1).unwrap();
        s.db().put_raw(META_TAIL_KEY.to_vec(), Vec::new());
        let err = s.metadata().unwrap_err();
        assert!(matches!(err, LedgerError::Receipt(ReceiptError::MissingTail)));
    }

    #[test]
    fn malformed_size_value_is_rejected() {
        let s = store(10);
        s.db().put_raw(META_SIZE_KEY.to_vec(), vec![1, 2, 3]);
        assert!(matches!(
            s.metadata().unwrap_err(),
            LedgerError::Receipt(ReceiptError::InvalidSizeValue(3))
        ));
    }

    #[test]
    fn overstated_size_fails_eviction_atomically() {
        let s = store(3);
        s.commit_receipts(&[ok("a"), ok("b"), ok("c")], 1).unwrap();
        // Claim more nodes than the list holds.
        s.db().put_raw(META_SIZE_KEY.to_vec(), 10u64.to_le_bytes().to_vec());
        let before = s.db().entries();

        let err = s.commit_receipts(&[ok("d")], 2).unwrap_err();
        assert!(matches!(
            err.root(),
            LedgerError::Receipt(ReceiptError::ShortEviction { requested: 8, deleted: 4 })
        ));
        assert!(err.to_string().starts_with("removing old receipts"));
        assert_eq!(s.db().entries(), before);
    }

    #[test]
    fn corrupt_interior_node_fails_eviction_atomically() {
        let s = store(2);
        s.commit_receipts(&[ok("a"), ok("b")], 1).unwrap();
        s.db().put_raw(b"a".to_vec(), vec![0xFF; 3]);
        let before = s.db().entries();

        let err = s.commit_receipts(&[ok("c")], 2).unwrap_err();
        assert!(matches!(err.root(), LedgerError::Receipt(ReceiptError::Decode { .. })));
        assert_eq!(s.db().entries(), before);
    }

    struct FailingWrites(MemoryKvStore);

    impl KvRead for FailingWrites {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
            self.0.get(key)
        }
    }

    impl KvStore for FailingWrites {
        fn write(&self, _batch: WriteBatch) -> Result<(), LedgerError> {
            Err(LedgerError::Storage("injected write failure".into()))
        }

        fn snapshot(&self) -> Result<Box<dyn KvRead + '_>, LedgerError> {
            self.0.snapshot()
        }
    }

    #[test]
    fn backend_write_failure_surfaces_with_context() {
        let s = ReceiptStore::new(FailingWrites(MemoryKvStore::new()), ReceiptStoreConfig::default());
        let err = s.commit_receipts(&[ok("a")], 1).unwrap_err();
        assert_eq!(err.to_string(), "committing receipts: storage: injected write failure");
        assert!(s.db().0.is_empty());
    }

    #[test]
    fn verify_detects_wrong_size() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), ok("b")], 1).unwrap();
        s.db().put_raw(META_SIZE_KEY.to_vec(), 1u64.to_le_bytes().to_vec());
        assert!(matches!(
            s.verify_integrity().unwrap_err(),
            LedgerError::Receipt(ReceiptError::BrokenList(_))
        ));
    }

    #[test]
    fn verify_detects_cycle() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), ok("b")], 1).unwrap();
        let mut node = load_node(s.db(), b"b").unwrap().unwrap();
        node.next_hash = b"a".to_vec();
        s.db().put_raw(b"b".to_vec(), node.encode().unwrap());
        s.db().put_raw(META_SIZE_KEY.to_vec(), 5u64.to_le_bytes().to_vec());
        let err = s.verify_integrity().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn verify_detects_dangling_pointer() {
        let s = store(10);
        s.commit_receipts(&[ok("a"), ok("b")], 1).unwrap();
        s.db().remove_raw(b"b");
        let err = s.verify_integrity().unwrap_err();
        assert!(err.to_string().contains("missing node 62"));
    }

    fn height_of(hash: &[u8]) -> u64 {
        u64::from_be_bytes(hash.try_into().unwrap())
    }

    #[test]
    fn readers_see_consistent_state_during_commits() {
        let s = std::sync::Arc::new(store(3));
        let writer = {
            let s = s.clone();
            std::thread::spawn(move || {
                for height in 1..=300u64 {
                    let receipt = Receipt::new(height.to_be_bytes().to_vec(), ReceiptStatus::Success, vec![]);
                    s.commit_receipts(&[receipt], height).unwrap();
                }
            })
        };

        loop {
            let visited = s.verify_integrity().unwrap();
            assert!(visited <= 3);

            // Hashes are consecutive heights, so size must span head..=tail.
            let meta = s.metadata().unwrap();
            if !meta.is_empty() {
                assert_eq!(height_of(&meta.tail) - height_of(&meta.head) + 1, meta.size);
                let stored = s.height_receipts(height_of(&meta.tail), false).unwrap();
                assert_eq!(stored.tx_hashes, vec![meta.tail.clone()]);
            }

            if writer.is_finished() {
                break;
            }
        }
        writer.join().unwrap();

        assert_eq!(s.verify_integrity().unwrap(), 3);
        assert_eq!(height_of(&s.metadata().unwrap().head), 298);
    }

    #[test]
    fn empty_topic_reaches_height_bloom() {
        let s = store(10);
        s.commit_receipts(&[with_topic("a", ReceiptStatus::Success, "")], 2).unwrap();
        let bloom = LogsBloom::from_bytes(&s.bloom_filter(2).unwrap().unwrap()).unwrap();
        assert!(bloom.may_contain(b""));
    }

    #[test]
    fn height_receipts_reads_one_view() {
        let s = store(10);
        s.commit_receipts(&[with_topic("a", ReceiptStatus::Success, "T1"), failed("b")], 4)
            .unwrap();

        let bare = s.height_receipts(4, false).unwrap();
        assert_eq!(bare.tx_hashes, hashes(&["a"]));
        assert!(bare.logs_bloom.is_some());
        assert!(bare.receipts.is_empty());

        let full = s.height_receipts(4, true).unwrap();
        assert_eq!(full.receipts, vec![s.get_receipt(b"a").unwrap()]);

        let none = s.height_receipts(9, true).unwrap();
        assert_eq!(none, HeightReceipts::default());
    }

    #[test]
    fn read_receipts_impl_delegates() {
        let s = store(10);
        s.commit_receipts(&[ok("a")], 5).unwrap();
        let reader: &dyn ReadReceipts = &s;
        assert_eq!(reader.receipt(b"a").unwrap().tx_hash, b"a".to_vec());
        assert_eq!(reader.tx_hash_list(5).unwrap(), hashes(&["a"]));
        assert!(reader.bloom_filter(5).unwrap().is_some());
    }
}
