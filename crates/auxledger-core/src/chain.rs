//! In-memory consensus metadata for testing.
//!
//! [`MemoryChain`] implements both [`BlockMetadataSource`] and [`ChainHead`]
//! over a vector of blocks starting at height 1. It records every range
//! request so tests can check how the reverse hash search paginates.

use parking_lot::{Mutex, RwLock};

use crate::error::{LedgerError, QueryError};
use crate::traits::{BlockMetadataSource, ChainHead};
use crate::types::{BlockIdMeta, BlockMeta};

/// Genesis timestamp used by [`MemoryChain::with_blocks`].
const BASE_TIMESTAMP: u64 = 1_600_000_000;

#[derive(Default)]
pub struct MemoryChain {
    /// Block at height `h` lives at index `h - 1`.
    blocks: RwLock<Vec<BlockMeta>>,
    range_requests: Mutex<Vec<(u64, u64)>>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain of `count` blocks with deterministic hashes and 5s spacing.
    pub fn with_blocks(count: u64) -> Self {
        let chain = Self::new();
        for _ in 0..count {
            chain.push_next();
        }
        chain
    }

    /// Deterministic hash of the synthetic block at `height`.
    pub fn synthetic_hash(height: u64) -> Vec<u8> {
        let mut hash = b"blk-".to_vec();
        hash.extend_from_slice(&height.to_be_bytes());
        hash
    }

    /// Append a synthetic block on top of the current head. Returns its height.
    pub fn push_next(&self) -> u64 {
        let mut blocks = self.blocks.write();
        let height = blocks.len() as u64 + 1;
        let parent_hash = blocks.last().map(|b| b.hash.clone()).unwrap_or_default();
        blocks.push(BlockMeta {
            hash: Self::synthetic_hash(height),
            parent_hash,
            timestamp: BASE_TIMESTAMP + height * 5,
        });
        height
    }

    /// Append an explicit block. Returns its height.
    pub fn push(&self, meta: BlockMeta) -> u64 {
        let mut blocks = self.blocks.write();
        blocks.push(meta);
        blocks.len() as u64
    }

    /// Every `(min, max)` passed to `block_range_metadata`, in call order.
    pub fn range_requests(&self) -> Vec<(u64, u64)> {
        self.range_requests.lock().clone()
    }
}

impl BlockMetadataSource for MemoryChain {
    fn block_by_height(&self, height: u64) -> Result<BlockMeta, LedgerError> {
        let blocks = self.blocks.read();
        height
            .checked_sub(1)
            .and_then(|idx| blocks.get(idx as usize))
            .cloned()
            .ok_or_else(|| QueryError::Upstream(format!("height {height} must be in 1..={}", blocks.len())).into())
    }

    fn block_range_metadata(
        &self,
        min_height: u64,
        max_height: u64,
    ) -> Result<Vec<BlockIdMeta>, LedgerError> {
        self.range_requests.lock().push((min_height, max_height));
        if min_height == 0 || min_height > max_height {
            return Err(QueryError::Upstream(format!(
                "invalid height range {min_height}..={max_height}"
            ))
            .into());
        }
        let blocks = self.blocks.read();
        let max = max_height.min(blocks.len() as u64);
        Ok((min_height..=max)
            .map(|height| BlockIdMeta {
                height,
                hash: blocks[(height - 1) as usize].hash.clone(),
            })
            .collect())
    }
}

impl ChainHead for MemoryChain {
    fn head_height(&self) -> Result<u64, LedgerError> {
        Ok(self.blocks.read().len() as u64)
    }
}
