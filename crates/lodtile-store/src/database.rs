mod dirty_tree;
mod format_marker;
mod tile_key;
mod tile_trees;

pub use format_marker::{read_format_version, FORMAT_VERSION};
pub use tile_key::{TileKey, TILE_KEY_LEN};

pub(crate) use dirty_tree::{read_all_dirty, remove_dirty, write_dirty};

use crate::{compression, PersistenceFlags, StoreConfig, StoreError, StoreResult};
use dirty_tree::open_dirty_tree;
use format_marker::{prepare_store_dir, write_format_version};
use tile_trees::{open_payload_tree, open_timestamp_tree, read_tile, write_if_newer};

use lodtile_core::{Level, TilePos, Timestamp};

use sled::transaction::TransactionResult;
use sled::{IVec, Transactional, Tree};
use std::io;
use std::path::PathBuf;

/// The persisted state of one tile.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredTile {
    pub timestamp: Timestamp,
    /// Compressed payload bytes. `None` means the tile is present but empty.
    pub payload: Option<IVec>,
}

/// # Tile Database
///
/// The persistent backing store for tile payloads and dirty markers. Every operation is synchronous and may block on disk
/// I/O.
///
/// ## Implementation
///
/// All data is stored in three [`sled::Tree`]s, each keyed by [`TileKey::into_sled_key`].
///
/// ### Timestamp Tree
///
/// Maps a tile to the 8-byte timestamp of its current payload. A tile with no entry here has never been generated.
///
/// ### Payload Tree
///
/// Maps a tile to its LZ4-compressed payload. A tile with a timestamp but no payload is known to be empty. The timestamp and
/// payload of one key are only ever written together, in one transaction that first reads the current timestamp; any two
/// writers of the same key conflict, and only a strictly newer timestamp is applied.
///
/// ### Dirty Tree
///
/// Maps a tile to the timestamp at which it was last invalidated. This is only the durable copy of the
/// [`DirtyTracker`](crate::DirtyTracker)'s in-memory map, which is the source of truth while the process runs.
pub struct TileDb {
    db: sled::Db,
    timestamp_tree: Tree,
    payload_tree: Tree,
    dirty_tree: Tree,
    persistence: PersistenceFlags,
    path: Option<PathBuf>,
}

impl TileDb {
    /// Opens the store described by `config`. A store directory written by a different [`FORMAT_VERSION`] is wiped first.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        match &config.path {
            Some(path) => prepare_store_dir(path)?,
            None if config.temporary => {}
            None => {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "a persistent tile store needs a path",
                )))
            }
        }

        let db = config.to_sled_config().open()?;
        if let Some(path) = &config.path {
            write_format_version(path)?;
            log::info!(
                "opened tile store at {} (format version {})",
                path.display(),
                FORMAT_VERSION
            );
        } else {
            log::info!("opened temporary tile store");
        }

        let mut this = Self::open_with_db(db, config.persistence)?;
        this.path = config.path.clone();
        Ok(this)
    }

    /// Opens the tile trees inside an existing `db`. No format version check is done.
    pub fn open_with_db(db: sled::Db, persistence: PersistenceFlags) -> StoreResult<Self> {
        if persistence != PersistenceFlags::ENABLED {
            log::debug!("tile persistence restricted: {:?}", persistence);
        }
        Ok(Self {
            timestamp_tree: open_timestamp_tree(&db)?,
            payload_tree: open_payload_tree(&db)?,
            dirty_tree: open_dirty_tree(&db)?,
            db,
            persistence,
            path: None,
        })
    }

    pub fn persistence(&self) -> PersistenceFlags {
        self.persistence
    }

    pub(crate) fn dirty_tree(&self) -> &Tree {
        &self.dirty_tree
    }

    /// Reads the timestamp of the tile's current payload, if the tile has ever been generated.
    pub fn timestamp(&self, pos: TilePos) -> StoreResult<Option<Timestamp>> {
        let key = checked_key(pos)?;
        if !self.persistence.reads_enabled() {
            return Ok(None);
        }
        self.timestamp_tree
            .get(key)?
            .map(|bytes| tile_trees::decode_timestamp(tile_trees::TIMESTAMP_TREE_NAME, &bytes))
            .transpose()
    }

    /// Reads the timestamp and compressed payload of the tile as one consistent pair.
    pub fn get(&self, pos: TilePos) -> StoreResult<Option<StoredTile>> {
        let key = checked_key(pos)?;
        if !self.persistence.reads_enabled() {
            return Ok(None);
        }
        let result: TransactionResult<_, StoreError> = (&self.timestamp_tree, &self.payload_tree)
            .transaction(|(timestamp_txn, payload_txn)| read_tile(timestamp_txn, payload_txn, &key));
        Ok(result?.map(|(timestamp, payload)| StoredTile { timestamp, payload }))
    }

    /// Stores `payload` for the tile iff `timestamp` is strictly newer than the stored one. An empty `payload` deletes the
    /// payload entry instead of storing a zero-length value.
    ///
    /// Returns `false` if the write was stale (or writes are disabled); that is routine under concurrent regeneration.
    pub fn put(&self, pos: TilePos, timestamp: Timestamp, payload: &[u8]) -> StoreResult<bool> {
        let key = checked_key(pos)?;
        if !self.persistence.writes_enabled() {
            return Ok(false);
        }

        // Compress outside of the transaction; its closure may run more than once.
        let compressed = (!payload.is_empty()).then(|| compression::compress(payload));
        let compressed_slice = compressed.as_ref().map(|c| c.as_slice());

        let result: TransactionResult<bool, StoreError> = (&self.timestamp_tree, &self.payload_tree)
            .transaction(|(timestamp_txn, payload_txn)| {
                write_if_newer(timestamp_txn, payload_txn, &key, timestamp, compressed_slice)
            });
        if let Some(compressed) = compressed {
            compressed.release();
        }

        let applied = result?;
        if !applied {
            log::trace!("rejected stale write of {:?} at {}", pos, timestamp);
        }
        Ok(applied)
    }

    /// Deletes the payload of the tile, leaving its timestamp in place. Returns `true` if a payload was removed.
    pub fn delete_payload(&self, pos: TilePos) -> StoreResult<bool> {
        let key = checked_key(pos)?;
        if !self.persistence.writes_enabled() {
            return Ok(false);
        }
        Ok(self.payload_tree.remove(key)?.is_some())
    }

    /// Number of tiles at `level` that have ever been generated.
    pub fn tile_count(&self, level: Level) -> StoreResult<usize> {
        if !self.persistence.reads_enabled() {
            return Ok(0);
        }
        let range = TileKey::level_range(level);
        let (min, max) = (range.start().into_sled_key(), range.end().into_sled_key());
        let mut count = 0;
        for iter_result in self.timestamp_tree.range(min..=max) {
            iter_result?;
            count += 1;
        }
        Ok(count)
    }

    /// Removes every tile and every dirty marker.
    pub fn clear(&self) -> StoreResult<()> {
        if !self.persistence.writes_enabled() {
            return Ok(());
        }
        self.timestamp_tree.clear()?;
        self.payload_tree.clear()?;
        self.dirty_tree.clear()?;
        Ok(())
    }

    /// Blocks until all pending writes are durable. Returns the number of bytes flushed.
    pub fn flush(&self) -> StoreResult<usize> {
        Ok(self.db.flush()?)
    }

    pub fn close(self) -> StoreResult<()> {
        self.flush()?;
        match &self.path {
            Some(path) => log::info!("closed tile store at {}", path.display()),
            None => log::info!("closed temporary tile store"),
        }
        Ok(())
    }
}

fn checked_key(pos: TilePos) -> StoreResult<[u8; TILE_KEY_LEN]> {
    if !pos.is_level_valid() {
        return Err(StoreError::InvalidLevel(pos.level));
    }
    Ok(TileKey::from_pos(pos).into_sled_key())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::decompress_to_vec;

    use lodtile_core::MAX_LEVEL;

    fn temporary_db(persistence: PersistenceFlags) -> TileDb {
        let db = sled::Config::default().temporary(true).open().unwrap();
        TileDb::open_with_db(db, persistence).unwrap()
    }

    fn read_payload(db: &TileDb, pos: TilePos) -> Option<(Timestamp, Option<Vec<u8>>)> {
        db.get(pos).unwrap().map(|stored| {
            (
                stored.timestamp,
                stored.payload.map(|p| decompress_to_vec(&p).unwrap()),
            )
        })
    }

    #[test]
    fn unknown_tile_reads_nothing() {
        let db = temporary_db(PersistenceFlags::ENABLED);
        let pos = TilePos::new(0, 0, 0, 0);
        assert_eq!(db.get(pos).unwrap(), None);
        assert_eq!(db.timestamp(pos).unwrap(), None);
    }

    #[test]
    fn newer_write_wins_in_either_order() {
        let pos = TilePos::new(1, 2, 3, 4);

        let db = temporary_db(PersistenceFlags::ENABLED);
        assert!(db.put(pos, 5, b"five").unwrap());
        assert!(!db.put(pos, 3, b"three").unwrap());
        assert!(!db.put(pos, 5, b"five again").unwrap());
        assert_eq!(read_payload(&db, pos), Some((5, Some(b"five".to_vec()))));

        let db = temporary_db(PersistenceFlags::ENABLED);
        assert!(db.put(pos, 3, b"three").unwrap());
        assert!(db.put(pos, 5, b"five").unwrap());
        assert_eq!(read_payload(&db, pos), Some((5, Some(b"five".to_vec()))));
    }

    #[test]
    fn empty_payload_keeps_timestamp_but_no_value() {
        let db = temporary_db(PersistenceFlags::ENABLED);
        let pos = TilePos::new(0, -1, 0, 1);
        assert!(db.put(pos, 1, b"abc").unwrap());
        assert!(db.put(pos, 2, b"").unwrap());
        assert_eq!(read_payload(&db, pos), Some((2, None)));
        assert_eq!(db.timestamp(pos).unwrap(), Some(2));
    }

    #[test]
    fn delete_payload_keeps_timestamp() {
        let db = temporary_db(PersistenceFlags::ENABLED);
        let pos = TilePos::new(3, 0, 0, 0);
        assert!(!db.delete_payload(pos).unwrap());
        db.put(pos, 7, b"data").unwrap();
        assert!(db.delete_payload(pos).unwrap());
        assert_eq!(read_payload(&db, pos), Some((7, None)));
    }

    #[test]
    fn invalid_level_is_rejected() {
        let db = temporary_db(PersistenceFlags::ENABLED);
        let pos = TilePos::new(MAX_LEVEL + 1, 0, 0, 0);
        assert!(matches!(db.put(pos, 1, b"x"), Err(StoreError::InvalidLevel(_))));
        assert!(matches!(db.get(pos), Err(StoreError::InvalidLevel(_))));
    }

    #[test]
    fn disabled_persistence_never_touches_store() {
        let pos = TilePos::new(0, 0, 0, 0);

        let db = temporary_db(PersistenceFlags {
            disable_reads: false,
            disable_writes: true,
        });
        assert!(!db.put(pos, 1, b"abc").unwrap());
        assert_eq!(db.get(pos).unwrap(), None);

        let db = temporary_db(PersistenceFlags {
            disable_reads: true,
            disable_writes: false,
        });
        assert!(db.put(pos, 1, b"abc").unwrap());
        assert_eq!(db.get(pos).unwrap(), None);
        assert_eq!(db.timestamp(pos).unwrap(), None);
        assert_eq!(db.tile_count(0).unwrap(), 0);
    }

    #[test]
    fn count_tiles_per_level() {
        let db = temporary_db(PersistenceFlags::ENABLED);
        for x in -2..2 {
            db.put(TilePos::new(0, x, 0, 0), 1, b"a").unwrap();
        }
        db.put(TilePos::new(1, 0, 0, 0), 1, b"").unwrap();

        assert_eq!(db.tile_count(0).unwrap(), 4);
        assert_eq!(db.tile_count(1).unwrap(), 1);
        assert_eq!(db.tile_count(2).unwrap(), 0);

        db.clear().unwrap();
        assert_eq!(db.tile_count(0).unwrap(), 0);
    }

    #[test]
    fn reopen_keeps_tiles_of_same_format() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at_path(dir.path().join("store"));
        let pos = TilePos::new(0, 9, 9, 9);

        let db = TileDb::open(&config).unwrap();
        db.put(pos, 4, b"persisted").unwrap();
        db.close().unwrap();

        let db = TileDb::open(&config).unwrap();
        assert_eq!(read_payload(&db, pos), Some((4, Some(b"persisted".to_vec()))));
    }

    #[test]
    fn persistent_store_needs_a_path() {
        assert!(TileDb::open(&StoreConfig::default()).is_err());
    }
}
