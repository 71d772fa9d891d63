use crate::{StoreError, StoreResult};

use lodtile_core::Timestamp;

use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::{IVec, Tree};

pub const TIMESTAMP_TREE_NAME: &str = "tile_timestamp";
pub const PAYLOAD_TREE_NAME: &str = "tile_payload";

pub fn open_timestamp_tree(db: &sled::Db) -> sled::Result<Tree> {
    db.open_tree(TIMESTAMP_TREE_NAME)
}

pub fn open_payload_tree(db: &sled::Db) -> sled::Result<Tree> {
    db.open_tree(PAYLOAD_TREE_NAME)
}

/// Timestamps are stored as 8 little-endian bytes, both in the timestamp tree and the dirty tree.
pub fn encode_timestamp(timestamp: Timestamp) -> [u8; 8] {
    timestamp.to_le_bytes()
}

pub fn decode_timestamp(tree: &'static str, bytes: &[u8]) -> StoreResult<Timestamp> {
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| StoreError::CorruptValue {
        tree,
        len: bytes.len(),
    })?;
    Ok(Timestamp::from_le_bytes(bytes))
}

/// Applies `payload` at `key` iff `timestamp` is strictly newer than the stored timestamp. `None` deletes the payload entry
/// but still records the timestamp.
///
/// Runs inside a transaction over (timestamp tree, payload tree), so the read of the current timestamp conflicts with any
/// concurrent writer of the same key.
pub fn write_if_newer(
    timestamp_txn: &TransactionalTree,
    payload_txn: &TransactionalTree,
    key: &[u8],
    timestamp: Timestamp,
    payload: Option<&[u8]>,
) -> Result<bool, ConflictableTransactionError<StoreError>> {
    if let Some(current) = timestamp_txn.get(key)? {
        let current = decode_timestamp(TIMESTAMP_TREE_NAME, &current)
            .map_err(ConflictableTransactionError::Abort)?;
        if timestamp <= current {
            return Ok(false);
        }
    }

    timestamp_txn.insert(key, &encode_timestamp(timestamp)[..])?;
    match payload {
        Some(bytes) => {
            payload_txn.insert(key, bytes)?;
        }
        None => {
            payload_txn.remove(key)?;
        }
    }
    Ok(true)
}

/// Reads the timestamp and payload at `key` as one consistent pair.
pub fn read_tile(
    timestamp_txn: &TransactionalTree,
    payload_txn: &TransactionalTree,
    key: &[u8],
) -> Result<Option<(Timestamp, Option<IVec>)>, ConflictableTransactionError<StoreError>> {
    let timestamp = match timestamp_txn.get(key)? {
        Some(bytes) => decode_timestamp(TIMESTAMP_TREE_NAME, &bytes)
            .map_err(ConflictableTransactionError::Abort)?,
        None => return Ok(None),
    };
    Ok(Some((timestamp, payload_txn.get(key)?)))
}
