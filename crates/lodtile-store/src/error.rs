use lodtile_core::Level;

use sled::transaction::TransactionError;
use std::io;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures that callers must handle. Losing a timestamp race is not one of these; it is reported as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Sled(#[from] sled::Error),
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("failed to decompress tile payload: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    #[error("tile payload decompressed to {actual} bytes, but its header claims {expected}")]
    CorruptPayload { expected: usize, actual: usize },
    #[error("tile payload header claims {claimed} bytes, but its block can hold at most {limit}")]
    OversizedPayload { claimed: usize, limit: usize },
    #[error("value in tree {tree} has length {len}, expected an 8-byte timestamp")]
    CorruptValue { tree: &'static str, len: usize },
    #[error("key has length {len}, expected a 13-byte tile key")]
    CorruptKey { len: usize },
    #[error("tile level {0} exceeds the maximum level")]
    InvalidLevel(Level),
    #[error("malformed tile snapshot bytes: {0}")]
    Wire(String),
    #[error("tile codec rejected payload: {0}")]
    Decode(String),
}

/// Transactions abort with the [`StoreError`] that stopped them.
impl From<TransactionError<StoreError>> for StoreError {
    fn from(e: TransactionError<StoreError>) -> Self {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}
