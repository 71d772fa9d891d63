use crate::{StoreResult, TileCodec, TileMetadata, TileSnapshot, TileStorage};

use lodtile_core::{TilePos, Timestamp};

/// # Tile Handle
///
/// Read, write and dirty operations for exactly one tile position.
///
/// A handle holds no tile state; every call goes to the store. A tile is either *unknown* (never generated, no timestamp) or
/// *present* (has a timestamp, and a payload unless it is empty). Its data timestamp only ever increases.
#[derive(Clone, Copy)]
pub struct TileHandle<'a> {
    pos: TilePos,
    storage: &'a TileStorage,
}

impl<'a> TileHandle<'a> {
    pub(crate) fn new(pos: TilePos, storage: &'a TileStorage) -> Self {
        Self { pos, storage }
    }

    #[inline]
    pub fn pos(&self) -> TilePos {
        self.pos
    }

    /// The data timestamp, or `None` if the tile was never generated.
    pub fn timestamp(&self) -> StoreResult<Option<Timestamp>> {
        self.storage.db().timestamp(self.pos)
    }

    /// The current content of the tile, read as one consistent (timestamp, payload) pair.
    ///
    /// `None` means the tile was never generated. An empty tile yields a snapshot without payload.
    pub fn snapshot(&self) -> StoreResult<Option<TileSnapshot>> {
        match self.storage.db().get(self.pos)? {
            Some(stored) => TileSnapshot::from_stored(self.pos, stored.timestamp, stored.payload.as_deref()).map(Some),
            None => Ok(None),
        }
    }

    /// Stores `tile` iff `metadata.timestamp` is newer than the current data timestamp. `None`, or a tile that encodes to no
    /// bytes, makes the tile empty.
    ///
    /// Returns `false` for a stale write. That is routine when the same tile is regenerated concurrently. This never clears a
    /// dirty mark; see [`TileHandle::set_and_resolve`].
    pub fn set<T: TileCodec>(&self, metadata: TileMetadata, tile: Option<&T>) -> StoreResult<bool> {
        let applied = self.set_silently(metadata, tile)?;
        if applied {
            self.storage.notify_changed(&[self.pos]);
        }
        Ok(applied)
    }

    pub(crate) fn set_silently<T: TileCodec>(&self, metadata: TileMetadata, tile: Option<&T>) -> StoreResult<bool> {
        let mut payload = Vec::new();
        if let Some(tile) = tile {
            tile.encode_tile(&mut payload);
        }
        self.storage.db().put(self.pos, metadata.timestamp, &payload)
    }

    /// Like [`TileHandle::set`], but if the write applied, also clears a dirty mark that the new data answers, i.e. one that
    /// is not newer than `metadata.timestamp`.
    pub fn set_and_resolve<T: TileCodec>(&self, metadata: TileMetadata, tile: Option<&T>) -> StoreResult<bool> {
        if !self.set(metadata, tile)? {
            return Ok(false);
        }
        if let Some(dirty) = self.dirty_timestamp() {
            if dirty <= metadata.timestamp {
                self.storage.dirty_tracker().clear_dirty(self.pos, dirty)?;
            }
        }
        Ok(true)
    }

    pub fn dirty_timestamp(&self) -> Option<Timestamp> {
        self.storage.dirty_tracker().dirty_timestamp(self.pos)
    }

    /// Marks the tile dirty at `timestamp`.
    ///
    /// Rejected if the tile was never generated, if `timestamp` is not newer than the data timestamp, or if the tile is
    /// already dirty at `timestamp` or later.
    pub fn mark_dirty(&self, timestamp: Timestamp) -> StoreResult<bool> {
        let marked = self.mark_dirty_silently(timestamp)?;
        if marked {
            self.storage.notify_dirty(&[self.pos]);
        }
        Ok(marked)
    }

    pub(crate) fn mark_dirty_silently(&self, timestamp: Timestamp) -> StoreResult<bool> {
        match self.timestamp()? {
            Some(data_timestamp) if timestamp > data_timestamp => {
                self.storage.dirty_tracker().mark_dirty(self.pos, timestamp)
            }
            data_timestamp => {
                log::trace!(
                    "rejected dirty mark of {:?} at {}, data timestamp is {:?}",
                    self.pos,
                    timestamp,
                    data_timestamp
                );
                Ok(false)
            }
        }
    }

    /// Clears the dirty mark that is currently recorded. Returns `false` if the tile is not dirty, or if a newer mark replaced
    /// the recorded one concurrently.
    pub fn clear_dirty(&self) -> StoreResult<bool> {
        match self.dirty_timestamp() {
            Some(dirty) => self.storage.dirty_tracker().clear_dirty(self.pos, dirty),
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for TileHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileHandle").field("pos", &self.pos).finish()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
