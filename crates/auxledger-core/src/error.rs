//! Error types for the receipt ledger.
use thiserror::Error;

/// Failures of the receipt store: lookups, decoding and list structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiptError {
    #[error("tx receipt not found: {0}")] NotFound(String),
    #[error("pending receipt not found: {0}")] PendingNotFound(String),
    #[error("decode {what}: {reason}")] Decode { what: &'static str, reason: String },
    #[error("encode {what}: {reason}")] Encode { what: &'static str, reason: String },
    #[error("invalid receipt size value length: {0}")] InvalidSizeValue(usize),
    #[error("no head for non zero size receipt db")] MissingHead,
    #[error("no tail for non zero size receipt db")] MissingTail,
    #[error("cannot find tail node {0}")] TailNodeMissing(String),
    #[error("unable to delete {requested} receipts, only {deleted} deleted")] ShortEviction { requested: u64, deleted: u64 },
    #[error("invalid count of deleted receipts: size {size}, deleted {deleted}")] InvalidDeleteCount { size: u64, deleted: u64 },
    #[error("broken receipt list: {0}")] BrokenList(String),
}

/// Failures of the block query layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("can't find block to match hash {0}")] BlockNotFound(String),
    #[error("upstream block metadata: {0}")] Upstream(String),
    #[error("invalid bloom filter length: {0}")] InvalidBloom(usize),
    #[error("block search cancelled")] Cancelled,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)] Receipt(#[from] ReceiptError),
    #[error(transparent)] Query(#[from] QueryError),
    #[error("storage: {0}")] Storage(String),
    #[error("config: {0}")] Config(String),
    #[error("{op}: {source}")] Context { op: &'static str, source: Box<LedgerError> },
}

impl LedgerError {
    /// Wrap this error with the name of the operation that failed.
    pub fn context(self, op: &'static str) -> Self {
        LedgerError::Context { op, source: Box::new(self) }
    }

    /// The innermost error, looking through every context wrapper.
    pub fn root(&self) -> &LedgerError {
        let mut err = self;
        while let LedgerError::Context { source, .. } = err {
            err = source.as_ref();
        }
        err
    }

    /// Whether the root cause is a typed not-found outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            LedgerError::Receipt(ReceiptError::NotFound(_))
                | LedgerError::Receipt(ReceiptError::PendingNotFound(_))
                | LedgerError::Query(QueryError::BlockNotFound(_))
        )
    }
}

/// Attach an operation name to any error convertible into [`LedgerError`].
pub trait ResultExt<T> {
    fn op(self, op: &'static str) -> Result<T, LedgerError>;
}

impl<T, E: Into<LedgerError>> ResultExt<T> for Result<T, E> {
    fn op(self, op: &'static str) -> Result<T, LedgerError> {
        self.map_err(|e| e.into().context(op))
    }
}
