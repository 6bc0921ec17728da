//! # auxledger-node: RocksDB storage, configuration and JSON-RPC.
//!
//! Composes the receipt ledger into a running service:
//! - [`storage::RocksKvStore`]: persistent key-value store backed by RocksDB
//! - [`node::Node`]: receipt store plus block query over consensus sources
//! - [`rpc`]: JSON-RPC server for external access
//! - [`config::NodeConfig`]: node configuration
//! - [`logging::init_logging`]: tracing subscriber setup for binaries

pub mod config;
pub mod logging;
pub mod node;
pub mod rpc;
pub mod storage;

pub use config::NodeConfig;
pub use node::Node;
pub use rpc::start_rpc_server;
pub use storage::RocksKvStore;
