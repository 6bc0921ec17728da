//! Ledger node composition.
//!
//! [`Node`] wires a RocksDB-backed [`ReceiptStore`] to a [`BlockQuery`] over
//! the consensus engine's block metadata and chain head. The consensus side
//! is supplied by the embedder through [`BlockMetadataSource`] and
//! [`ChainHead`].

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::{debug, info, warn};

use auxledger_core::block_query::BlockQuery;
use auxledger_core::error::{LedgerError, ResultExt};
use auxledger_core::receipt_store::ReceiptStore;
use auxledger_core::traits::{BlockMetadataSource, ChainHead};
use auxledger_core::types::{BlockDescriptor, Receipt, StoreMetadata};

use crate::config::NodeConfig;
use crate::storage::RocksKvStore;

/// A receipt ledger node: persistent receipt store plus block lookups.
pub struct Node {
    receipts: Arc<ReceiptStore<RocksKvStore>>,
    query: BlockQuery,
    config: NodeConfig,
}

impl Node {
    /// Open the receipt database under `config.data_dir` and compose the
    /// query layer over the given consensus sources.
    pub fn open(
        config: NodeConfig,
        blocks: Arc<dyn BlockMetadataSource>,
        head: Arc<dyn ChainHead>,
    ) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| LedgerError::Storage(format!("creating data_dir: {e}")))?;
        let db = RocksKvStore::open(config.db_path()).op("opening receipt database")?;
        let receipts = Arc::new(ReceiptStore::new(db, config.receipt_store_config()));

        let meta = receipts.metadata().op("reading receipt metadata")?;
        info!(
            db_path = %config.db_path().display(),
            size = meta.size,
            max_receipts = config.max_receipts,
            "receipt store opened"
        );
        if config.max_receipts == 0 {
            warn!("max_receipts is 0, receipts will not be stored");
        }

        let query = BlockQuery::new(receipts.clone(), blocks, head, config.query_config());
        Ok(Self {
            receipts,
            query,
            config,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The underlying receipt store.
    pub fn receipts(&self) -> &Arc<ReceiptStore<RocksKvStore>> {
        &self.receipts
    }

    /// Record the receipts of a finalized block.
    pub fn commit_block(&self, height: u64, receipts: &[Receipt]) -> Result<(), LedgerError> {
        self.receipts
            .commit_receipts(receipts, height)
            .op("committing block receipts")?;
        debug!(height, receipts = receipts.len(), "block receipts recorded");
        Ok(())
    }

    pub fn receipt(&self, tx_hash: &[u8]) -> Result<Receipt, LedgerError> {
        self.receipts.get_receipt(tx_hash)
    }

    pub fn block_by_number(&self, height: u64, full: bool) -> Result<BlockDescriptor, LedgerError> {
        self.query.block_by_number(height, full)
    }

    pub fn block_by_hash(
        &self,
        hash: &[u8],
        full: bool,
        cancel: Option<&AtomicBool>,
    ) -> Result<BlockDescriptor, LedgerError> {
        self.query.block_by_hash(hash, full, cancel)
    }

    /// Current receipt store bookkeeping.
    pub fn stats(&self) -> Result<StoreMetadata, LedgerError> {
        self.receipts.metadata()
    }

    /// Walk the receipt list and check it against the metadata.
    pub fn verify(&self) -> Result<u64, LedgerError> {
        self.receipts.verify_integrity()
    }

    /// Flush the receipt database to disk.
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.receipts.db().flush()
    }
}
