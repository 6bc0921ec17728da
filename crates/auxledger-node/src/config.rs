//! Node configuration for the receipt ledger.
//!
//! [`NodeConfig`] carries defaults for the data directory, receipt cap,
//! hash-search window, RPC binding and log level. [`NodeConfig::load`]
//! layers an optional TOML file and `AUXLEDGER_*` environment variables
//! over those defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use auxledger_core::block_query::QueryConfig;
use auxledger_core::constants::{DEFAULT_MAX_RECEIPTS, DEFAULT_SEARCH_WINDOW};
use auxledger_core::error::LedgerError;
use auxledger_core::receipt_store::ReceiptStoreConfig;

/// Default JSON-RPC port.
pub const DEFAULT_RPC_PORT: u16 = 8545;

/// Prefix of environment variable overrides, e.g. `AUXLEDGER_MAX_RECEIPTS`.
pub const ENV_PREFIX: &str = "AUXLEDGER";

/// Configuration for a ledger node instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Maximum number of receipts retained. Zero disables receipt storage.
    pub max_receipts: u64,
    /// Heights per window of the reverse block-hash search.
    pub search_window: u64,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "auxledger_core=debug").
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("auxledger");

        Self {
            data_dir,
            max_receipts: DEFAULT_MAX_RECEIPTS,
            search_window: DEFAULT_SEARCH_WINDOW,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from `path` (if it exists) and the environment.
    ///
    /// Missing keys keep their defaults. The file format follows the
    /// extension; environment variables take precedence over the file.
    pub fn load(path: Option<&Path>) -> Result<Self, LedgerError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<NodeConfig>())
            .map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Path to the RocksDB receipt database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("receipts")
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }

    pub fn receipt_store_config(&self) -> ReceiptStoreConfig {
        ReceiptStoreConfig {
            max_receipts: self.max_receipts,
        }
    }

    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            search_window: self.search_window,
        }
    }
}
