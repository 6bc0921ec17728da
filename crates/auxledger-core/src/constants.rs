//! Ledger constants: store keys, default bounds, bloom geometry.

/// Default cap on the number of receipts retained by the store.
pub const DEFAULT_MAX_RECEIPTS: u64 = 2000;

/// Default number of heights requested per window by the reverse hash search.
pub const DEFAULT_SEARCH_WINDOW: u64 = 100;

/// Size in bytes of a serialized logs bloom (2048 bits).
pub const BLOOM_BYTES: usize = 256;

// --- Metadata keys ---
//
// Receipt nodes are keyed by the raw transaction hash. Everything else lives
// under ASCII keys so the two namespaces do not collide for 32-byte hashes.

/// Number of nodes currently retained, 8-byte little-endian.
pub const META_SIZE_KEY: &[u8] = b"evmaux:receipt_size";
/// Key of the oldest retained node.
pub const META_HEAD_KEY: &[u8] = b"evmaux:receipt_head";
/// Key of the newest retained node.
pub const META_TAIL_KEY: &[u8] = b"evmaux:receipt_tail";

/// Prefix of the per-height successful tx-hash list.
pub const TX_HASH_LIST_PREFIX: &[u8] = b"evmaux:txhash:";
/// Prefix of the per-height logs bloom.
pub const BLOOM_FILTER_PREFIX: &[u8] = b"evmaux:bloom:";

/// Build a per-height key: `prefix || height(BE)`.
///
/// Big-endian keeps heights in order under ordered iteration.
pub fn height_key(prefix: &[u8], height: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&height.to_be_bytes());
    key
}
