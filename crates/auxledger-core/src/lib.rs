//! # auxledger-core
//! Auxiliary receipt ledger: a size-capped receipt history kept as a linked
//! list inside a key-value store, plus Ethereum-style block lookups.

pub mod block_query;
pub mod bloom;
pub mod chain;
pub mod constants;
pub mod error;
pub mod kv;
pub mod receipt_store;
pub mod traits;
pub mod types;
