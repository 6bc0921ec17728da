//! Block lookups over consensus metadata and the receipt store's per-height
//! indexes.
//!
//! By-number lookups combine the consensus engine's block metadata with the
//! successful transaction hashes and logs bloom committed at that height.
//! By-hash lookups have no hash index to consult: they page backwards from
//! the chain head in fixed-size windows of range metadata until the hash is
//! found or height 1 has been examined.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::constants::DEFAULT_SEARCH_WINDOW;
use crate::error::{LedgerError, QueryError, ResultExt};
use crate::traits::{BlockMetadataSource, ChainHead, ReadReceipts};
use crate::types::{BlockDescriptor, BlockTransactions};

/// Query layer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Heights below the window top requested per range call.
    pub search_window: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search_window: DEFAULT_SEARCH_WINDOW,
        }
    }
}

/// Assembles Ethereum-style block descriptors.
pub struct BlockQuery {
    receipts: Arc<dyn ReadReceipts>,
    blocks: Arc<dyn BlockMetadataSource>,
    head: Arc<dyn ChainHead>,
    config: QueryConfig,
}

impl BlockQuery {
    pub fn new(
        receipts: Arc<dyn ReadReceipts>,
        blocks: Arc<dyn BlockMetadataSource>,
        head: Arc<dyn ChainHead>,
        config: QueryConfig,
    ) -> Self {
        Self {
            receipts,
            blocks,
            head,
            config,
        }
    }

    pub fn config(&self) -> QueryConfig {
        self.config
    }

    /// Descriptor for the block at `height`.
    ///
    /// `number` is reported as 0 when `height` is the current chain head.
    /// With `full`, transactions carry encoded receipts instead of hashes.
    pub fn block_by_number(&self, height: u64, full: bool) -> Result<BlockDescriptor, LedgerError> {
        let meta = self
            .blocks
            .block_by_height(height)
            .op("getting block metadata")?;
        let head = self.head.head_height().op("getting chain head")?;
        let number = if height == head { 0 } else { height };

        let stored = self.receipts.height_receipts(height, full)?;
        let logs_bloom = if stored.tx_hashes.is_empty() {
            None
        } else {
            stored.logs_bloom
        };

        let transactions = if full {
            let mut encoded = Vec::with_capacity(stored.receipts.len());
            for receipt in &stored.receipts {
                encoded.push(receipt.encode().op("marshall receipt")?);
            }
            BlockTransactions::Receipts(encoded)
        } else {
            BlockTransactions::Hashes(stored.tx_hashes)
        };

        Ok(BlockDescriptor {
            hash: meta.hash,
            parent_hash: meta.parent_hash,
            timestamp: meta.timestamp,
            number,
            logs_bloom,
            transactions,
        })
    }

    /// Encoded form of [`block_by_number`](Self::block_by_number).
    pub fn get_block_by_number(&self, height: u64, full: bool) -> Result<Vec<u8>, LedgerError> {
        self.block_by_number(height, full)?
            .encode()
            .op("marshall block info")
    }

    /// Height of the block with id `hash`, searching backwards from the head.
    ///
    /// Each window requests `[max(top - W, 1), top]`; the next window's top
    /// is the previous window's bottom. `cancel` is checked before every
    /// request.
    ///
    /// # Errors
    ///
    /// - [`QueryError::BlockNotFound`] once height 1 has been examined
    /// - [`QueryError::Cancelled`] if `cancel` was set
    /// - upstream metadata failures, wrapped
    pub fn find_height_by_hash(
        &self,
        hash: &[u8],
        cancel: Option<&AtomicBool>,
    ) -> Result<u64, LedgerError> {
        let window = self.config.search_window.max(1);
        let mut top = self.head.head_height().op("getting chain head")?;
        let mut bottom = window_start(top, window);

        while top > 0 {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(QueryError::Cancelled.into());
            }
            let metas = self
                .blocks
                .block_range_metadata(bottom, top)
                .op("getting blockchain info")?;
            if let Some(found) = metas.iter().rev().find(|m| m.hash == hash) {
                debug!(height = found.height, hash = %hex::encode(hash), "block hash resolved");
                return Ok(found.height);
            }
            if bottom == 1 {
                break;
            }
            top = bottom;
            bottom = window_start(top, window);
        }
        Err(QueryError::BlockNotFound(hex::encode(hash)).into())
    }

    /// Descriptor for the block with id `hash`.
    pub fn block_by_hash(
        &self,
        hash: &[u8],
        full: bool,
        cancel: Option<&AtomicBool>,
    ) -> Result<BlockDescriptor, LedgerError> {
        let height = self.find_height_by_hash(hash, cancel)?;
        self.block_by_number(height, full)
    }

    /// Encoded form of [`block_by_hash`](Self::block_by_hash).
    pub fn get_block_by_hash(
        &self,
        hash: &[u8],
        full: bool,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<u8>, LedgerError> {
        let height = self.find_height_by_hash(hash, cancel)?;
        self.get_block_by_number(height, full)
    }
}

/// Lowest height of a window whose top is `top`, never below 1.
fn window_start(top: u64, window: u64) -> u64 {
    if top > window { top - window } else { 1 }
}
