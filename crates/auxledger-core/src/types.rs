//! Ledger types: receipts, list nodes, store metadata, block descriptors.
//!
//! Hashes are opaque byte sequences. Receipts and list nodes are persisted
//! with bincode (standard config); the same encoding is what full block
//! descriptors carry for each receipt.

use serde::{Deserialize, Serialize};

use crate::error::ReceiptError;

/// Execution outcome of a transaction.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default,
    bincode::Encode, bincode::Decode,
)]
pub enum ReceiptStatus {
    #[default]
    Failure,
    Success,
}

impl ReceiptStatus {
    /// Numeric status code: 1 for success, 0 for failure.
    pub fn code(self) -> u32 {
        match self {
            Self::Success => 1,
            Self::Failure => 0,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// An event emitted during transaction execution.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct LogEvent {
    /// Address of the emitting contract.
    pub address: Vec<u8>,
    /// Indexed topics, in emission order.
    pub topics: Vec<Vec<u8>>,
    /// Unindexed payload.
    pub data: Vec<u8>,
}

impl LogEvent {
    pub fn new(address: Vec<u8>, topics: Vec<Vec<u8>>, data: Vec<u8>) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}

/// Outcome record of one executed transaction. Never mutated once created.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Receipt {
    /// Transaction hash; the receipt's unique key.
    pub tx_hash: Vec<u8>,
    pub status: ReceiptStatus,
    /// Emitted events in execution order.
    pub logs: Vec<LogEvent>,
    /// Height of the block that executed the transaction.
    pub block_height: u64,
    /// Position of the transaction within its block.
    pub transaction_index: u32,
    pub gas_used: u64,
    /// Address of the contract created by this transaction, if any.
    pub contract_address: Option<Vec<u8>>,
}

impl Receipt {
    /// Create a receipt with the fields the ledger indexes on.
    pub fn new(tx_hash: impl Into<Vec<u8>>, status: ReceiptStatus, logs: Vec<LogEvent>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            status,
            logs,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Canonical bincode encoding, as returned in full block descriptors.
    pub fn encode(&self) -> Result<Vec<u8>, ReceiptError> {
        bincode::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            ReceiptError::Encode {
                what: "receipt",
                reason: e.to_string(),
            }
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ReceiptError> {
        let (receipt, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ReceiptError::Decode {
                what: "receipt",
                reason: e.to_string(),
            })?;
        Ok(receipt)
    }
}

/// On-disk list node: a receipt plus the key of its successor.
///
/// An empty `next_hash` marks the tail.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct ReceiptNode {
    pub receipt: Receipt,
    pub next_hash: Vec<u8>,
}

impl ReceiptNode {
    /// A node with no successor.
    pub fn tail(receipt: Receipt) -> Self {
        Self {
            receipt,
            next_hash: Vec::new(),
        }
    }

    pub fn is_tail(&self) -> bool {
        self.next_hash.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, ReceiptError> {
        bincode::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            ReceiptError::Encode {
                what: "receipt node",
                reason: e.to_string(),
            }
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ReceiptError> {
        let (node, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ReceiptError::Decode {
                what: "receipt node",
                reason: e.to_string(),
            })?;
        Ok(node)
    }
}

/// The receipt list's singleton bookkeeping record.
///
/// `size == 0` iff `head` and `tail` are both empty.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct StoreMetadata {
    /// Number of nodes currently retained.
    pub size: u64,
    /// Key of the oldest retained node.
    pub head: Vec<u8>,
    /// Key of the newest retained node.
    pub tail: Vec<u8>,
}

impl StoreMetadata {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Consensus-engine metadata for a single block.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockMeta {
    pub hash: Vec<u8>,
    pub parent_hash: Vec<u8>,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

/// One entry of a block-range metadata response.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockIdMeta {
    pub height: u64,
    pub hash: Vec<u8>,
}

/// Transactions of a block descriptor, uniform per response.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum BlockTransactions {
    /// Bare transaction hashes.
    Hashes(Vec<Vec<u8>>),
    /// Encoded receipts (see [`Receipt::encode`]).
    Receipts(Vec<Vec<u8>>),
}

impl BlockTransactions {
    pub fn len(&self) -> usize {
        match self {
            Self::Hashes(items) | Self::Receipts(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw items regardless of variant.
    pub fn items(&self) -> &[Vec<u8>] {
        match self {
            Self::Hashes(items) | Self::Receipts(items) => items,
        }
    }
}

/// Everything the receipt store holds for one height, read from a single
/// snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeightReceipts {
    /// Successful transaction hashes in commit order.
    pub tx_hashes: Vec<Vec<u8>>,
    pub logs_bloom: Option<Vec<u8>>,
    /// Receipts for `tx_hashes`, in the same order. Empty unless requested.
    pub receipts: Vec<Receipt>,
}

/// Ethereum-style block descriptor assembled by the query layer.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockDescriptor {
    pub hash: Vec<u8>,
    pub parent_hash: Vec<u8>,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Reported block number; 0 when the block is the current chain head.
    pub number: u64,
    /// Aggregated logs bloom; absent when the height has no receipts.
    pub logs_bloom: Option<Vec<u8>>,
    pub transactions: BlockTransactions,
}

impl BlockDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>, ReceiptError> {
        bincode::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            ReceiptError::Encode {
                what: "block descriptor",
                reason: e.to_string(),
            }
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ReceiptError> {
        let (desc, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ReceiptError::Decode {
                what: "block descriptor",
                reason: e.to_string(),
            })?;
        Ok(desc)
    }
}
