//! JSON-RPC server for the receipt ledger.
//!
//! Uses jsonrpsee 0.24 to expose Ethereum-style block and receipt lookups
//! plus receipt store statistics. Byte fields are rendered as lowercase hex;
//! hash parameters accept an optional `0x` prefix. Block numbers are taken as
//! either a JSON integer or an Ethereum hex quantity such as `"0x1b4"`.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use auxledger_core::error::LedgerError;
use auxledger_core::types::{BlockDescriptor, BlockTransactions, LogEvent, Receipt};

use crate::node::Node;

/// Error code for malformed parameters.
pub const INVALID_PARAMS: i32 = -22;
/// Error code for lookups with no result.
pub const NOT_FOUND: i32 = -5;
/// Error code for internal failures.
pub const INTERNAL: i32 = -1;

/// JSON representation of a block descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockJson {
    /// Block hash as hex.
    pub hash: String,
    /// Parent block hash as hex.
    pub parent_hash: String,
    /// Block timestamp (Unix seconds).
    pub timestamp: u64,
    /// Reported block number; 0 for the current chain head.
    pub number: u64,
    /// Logs bloom as hex, absent when the block has no receipts.
    pub logs_bloom: Option<String>,
    /// Whether `transactions` holds encoded receipts rather than hashes.
    pub full: bool,
    /// Transaction hashes, or bincode-encoded receipts when `full`, as hex.
    pub transactions: Vec<String>,
}

impl From<&BlockDescriptor> for BlockJson {
    fn from(desc: &BlockDescriptor) -> Self {
        Self {
            hash: hex::encode(&desc.hash),
            parent_hash: hex::encode(&desc.parent_hash),
            timestamp: desc.timestamp,
            number: desc.number,
            logs_bloom: desc.logs_bloom.as_ref().map(hex::encode),
            full: matches!(desc.transactions, BlockTransactions::Receipts(_)),
            transactions: desc.transactions.items().iter().map(hex::encode).collect(),
        }
    }
}

/// JSON representation of an emitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogJson {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

impl From<&LogEvent> for LogJson {
    fn from(log: &LogEvent) -> Self {
        Self {
            address: hex::encode(&log.address),
            topics: log.topics.iter().map(hex::encode).collect(),
            data: hex::encode(&log.data),
        }
    }
}

/// JSON representation of a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptJson {
    /// Transaction hash as hex.
    pub tx_hash: String,
    /// 1 for success, 0 for failure.
    pub status: u32,
    pub block_height: u64,
    pub transaction_index: u32,
    pub gas_used: u64,
    /// Created contract address as hex, if any.
    pub contract_address: Option<String>,
    pub logs: Vec<LogJson>,
}

impl From<&Receipt> for ReceiptJson {
    fn from(receipt: &Receipt) -> Self {
        Self {
            tx_hash: hex::encode(&receipt.tx_hash),
            status: receipt.status.code(),
            block_height: receipt.block_height,
            transaction_index: receipt.transaction_index,
            gas_used: receipt.gas_used,
            contract_address: receipt.contract_address.as_ref().map(hex::encode),
            logs: receipt.logs.iter().map(LogJson::from).collect(),
        }
    }
}

/// JSON representation of receipt store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsJson {
    /// Receipts currently retained.
    pub size: u64,
    /// Configured retention cap.
    pub max_receipts: u64,
    /// Oldest retained transaction hash as hex (empty when the store is empty).
    pub head: String,
    /// Newest retained transaction hash as hex (empty when the store is empty).
    pub tail: String,
}

/// Block number parameter as sent by Ethereum clients or plain integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockNumberParam {
    Number(u64),
    Quantity(String),
}

impl BlockNumberParam {
    pub fn height(&self) -> Result<u64, ErrorObjectOwned> {
        match self {
            Self::Number(height) => Ok(*height),
            Self::Quantity(quantity) => parse_quantity(quantity),
        }
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(quantity: &str) -> Result<u64, ErrorObjectOwned> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .ok_or_else(|| rpc_error(INVALID_PARAMS, "block number must be a 0x-prefixed hex quantity"))?;
    if digits.is_empty() {
        return Err(rpc_error(INVALID_PARAMS, "block number must not be empty"));
    }
    u64::from_str_radix(digits, 16).map_err(|_| rpc_error(INVALID_PARAMS, "invalid hex quantity"))
}

/// Parse a hex hash, with or without a `0x` prefix.
pub fn parse_hash(hex_str: &str) -> Result<Vec<u8>, ErrorObjectOwned> {
    let digits = hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str);
    if digits.is_empty() {
        return Err(rpc_error(INVALID_PARAMS, "hash must not be empty"));
    }
    hex::decode(digits).map_err(|_| rpc_error(INVALID_PARAMS, "invalid hex in hash"))
}

/// Create a JSON-RPC error.
fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

/// Map a ledger error, keeping not-found distinguishable from failures.
fn ledger_error(err: LedgerError) -> ErrorObjectOwned {
    let code = if err.is_not_found() { NOT_FOUND } else { INTERNAL };
    rpc_error(code, &err.to_string())
}

/// The ledger JSON-RPC interface.
#[rpc(server)]
pub trait LedgerRpc {
    /// Returns the block at `height`; with `full`, encoded receipts instead of hashes.
    #[method(name = "eth_getBlockByNumber")]
    async fn get_block_by_number(
        &self,
        number: BlockNumberParam,
        full: bool,
    ) -> Result<BlockJson, ErrorObjectOwned>;

    /// Returns the block with the given hash, searching back from the chain head.
    #[method(name = "eth_getBlockByHash")]
    async fn get_block_by_hash(&self, hash: String, full: bool) -> Result<BlockJson, ErrorObjectOwned>;

    /// Returns a retained receipt, or null if unknown or evicted.
    #[method(name = "eth_getTransactionReceipt")]
    async fn get_transaction_receipt(
        &self,
        tx_hash: String,
    ) -> Result<Option<ReceiptJson>, ErrorObjectOwned>;

    /// Returns receipt store statistics.
    #[method(name = "auxledger_receiptStats")]
    async fn receipt_stats(&self) -> Result<StatsJson, ErrorObjectOwned>;
}

/// Implementation of the ledger JSON-RPC server.
pub struct RpcServerImpl {
    node: Arc<Node>,
}

impl RpcServerImpl {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl LedgerRpcServer for RpcServerImpl {
    async fn get_block_by_number(
        &self,
        number: BlockNumberParam,
        full: bool,
    ) -> Result<BlockJson, ErrorObjectOwned> {
        let height = number.height()?;
        let desc = self
            .node
            .block_by_number(height, full)
            .map_err(ledger_error)?;
        Ok(BlockJson::from(&desc))
    }

    async fn get_block_by_hash(&self, hash: String, full: bool) -> Result<BlockJson, ErrorObjectOwned> {
        let hash = parse_hash(&hash)?;
        let desc = self
            .node
            .block_by_hash(&hash, full, None)
            .map_err(ledger_error)?;
        Ok(BlockJson::from(&desc))
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: String,
    ) -> Result<Option<ReceiptJson>, ErrorObjectOwned> {
        let hash = parse_hash(&tx_hash)?;
        match self.node.receipt(&hash) {
            Ok(receipt) => Ok(Some(ReceiptJson::from(&receipt))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ledger_error(e)),
        }
    }

    async fn receipt_stats(&self) -> Result<StatsJson, ErrorObjectOwned> {
        let meta = self.node.stats().map_err(ledger_error)?;
        Ok(StatsJson {
            size: meta.size,
            max_receipts: self.node.config().max_receipts,
            head: hex::encode(&meta.head),
            tail: hex::encode(&meta.tail),
        })
    }
}

/// Start the JSON-RPC server on the given address.
///
/// Returns a [`ServerHandle`] that can be used to stop the server, and the
/// bound address (useful when binding port 0).
pub async fn start_rpc_server(
    addr: &str,
    node: Arc<Node>,
) -> Result<(ServerHandle, SocketAddr), LedgerError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| LedgerError::Storage(format!("RPC server error: {e}")))?;
    let local_addr = server
        .local_addr()
        .map_err(|e| LedgerError::Storage(format!("RPC server error: {e}")))?;

    let rpc_impl = RpcServerImpl::new(node);
    let handle = server.start(rpc_impl.into_rpc());
    tracing::info!(%local_addr, "JSON-RPC server started");
    Ok((handle, local_addr))
}
