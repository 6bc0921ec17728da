//! Trait interfaces between the ledger and its collaborators.
//!
//! - [`BlockMetadataSource`]: consensus-engine block metadata (external)
//! - [`ChainHead`]: current chain head height from node state (external)
//! - [`ReadReceipts`]: receipt and per-height index reads (the receipt store implements)

use crate::error::LedgerError;
use crate::types::{BlockIdMeta, BlockMeta, HeightReceipts, Receipt};

/// Block metadata served by the consensus engine.
///
/// Calls may block on network I/O; implementations apply their own
/// deadlines. Failures should be reported as [`QueryError::Upstream`](crate::error::QueryError::Upstream).
pub trait BlockMetadataSource: Send + Sync {
    /// Hash, parent hash and timestamp of the block at `height`.
    fn block_by_height(&self, height: u64) -> Result<BlockMeta, LedgerError>;

    /// Block ids for `min_height..=max_height`, in ascending height order.
    fn block_range_metadata(
        &self,
        min_height: u64,
        max_height: u64,
    ) -> Result<Vec<BlockIdMeta>, LedgerError>;
}

/// Read access to the node's current chain head.
pub trait ChainHead: Send + Sync {
    fn head_height(&self) -> Result<u64, LedgerError>;
}

/// Read side of the receipt store, as consumed by the query layer.
pub trait ReadReceipts: Send + Sync {
    /// Point lookup by transaction hash. Fails with a not-found error on a miss.
    fn receipt(&self, tx_hash: &[u8]) -> Result<Receipt, LedgerError>;

    /// Hashes of successful transactions committed at `height`; empty if none.
    fn tx_hash_list(&self, height: u64) -> Result<Vec<Vec<u8>>, LedgerError>;

    /// Encoded logs bloom for `height`, if the height was committed.
    fn bloom_filter(&self, height: u64) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Tx hashes, bloom and (with `with_receipts`) the receipts of `height`,
    /// all from one consistent view. A receipt evicted before the view was
    /// taken is a not-found error.
    fn height_receipts(&self, height: u64, with_receipts: bool) -> Result<HeightReceipts, LedgerError>;
}
