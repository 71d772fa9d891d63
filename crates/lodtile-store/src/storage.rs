use crate::{
    DirtyTracker, PersistenceFlags, StoreConfig, StoreResult, TileCodec, TileDb, TileHandle, TileMetadata, TileSnapshot,
};

use lodtile_core::{TilePos, Timestamp};

use parking_lot::RwLock;
use std::sync::Arc;

/// Observes changes to a [`TileStorage`]. Called synchronously on the thread that made the change, after it is durable.
pub trait TileStorageListener: Send + Sync {
    /// New data was stored for `positions`.
    fn tiles_changed(&self, positions: &[TilePos]);

    /// `positions` were newly marked dirty.
    fn tiles_dirty(&self, positions: &[TilePos]);
}

/// # Tile Storage
///
/// The process-wide entry point: one [`TileDb`] plus the [`DirtyTracker`] recovered from it. Everything is reached through
/// [`TileStorage::handle`] or the `multi_*` batch methods, which behave exactly like calling the handle method once per
/// position, in order, but notify listeners once per batch.
pub struct TileStorage {
    db: TileDb,
    tracker: DirtyTracker,
    listeners: RwLock<Vec<Arc<dyn TileStorageListener>>>,
}

impl TileStorage {
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        Self::from_db(TileDb::open(config)?)
    }

    pub fn open_with_db(db: sled::Db, persistence: PersistenceFlags) -> StoreResult<Self> {
        Self::from_db(TileDb::open_with_db(db, persistence)?)
    }

    pub fn from_db(db: TileDb) -> StoreResult<Self> {
        let tracker = DirtyTracker::recover(&db)?;
        Ok(Self {
            db,
            tracker,
            listeners: Default::default(),
        })
    }

    pub fn handle(&self, pos: TilePos) -> TileHandle<'_> {
        TileHandle::new(pos, self)
    }

    pub fn db(&self) -> &TileDb {
        &self.db
    }

    pub fn dirty_tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    pub fn add_listener(&self, listener: Arc<dyn TileStorageListener>) {
        self.listeners.write().push(listener);
    }

    /// Returns `false` if `listener` was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn TileStorageListener>) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(i) => {
                listeners.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn notify_changed(&self, positions: &[TilePos]) {
        if positions.is_empty() {
            return;
        }
        for listener in self.listeners_snapshot() {
            listener.tiles_changed(positions);
        }
    }

    pub(crate) fn notify_dirty(&self, positions: &[TilePos]) {
        if positions.is_empty() {
            return;
        }
        for listener in self.listeners_snapshot() {
            listener.tiles_dirty(positions);
        }
    }

    // Listeners may (un)register listeners, so don't hold the lock while calling them.
    fn listeners_snapshot(&self) -> Vec<Arc<dyn TileStorageListener>> {
        self.listeners.read().clone()
    }

    pub fn multi_snapshot(&self, positions: &[TilePos]) -> StoreResult<Vec<Option<TileSnapshot>>> {
        positions.iter().map(|&pos| self.handle(pos).snapshot()).collect()
    }

    pub fn multi_timestamp(&self, positions: &[TilePos]) -> StoreResult<Vec<Option<Timestamp>>> {
        positions.iter().map(|&pos| self.handle(pos).timestamp()).collect()
    }

    /// In-memory lookups only, like [`TileHandle::dirty_timestamp`].
    pub fn multi_dirty_timestamp(&self, positions: &[TilePos]) -> Vec<Option<Timestamp>> {
        positions
            .iter()
            .map(|&pos| self.tracker.dirty_timestamp(pos))
            .collect()
    }

    pub fn multi_set<T: TileCodec>(
        &self,
        tiles: &[(TilePos, TileMetadata, Option<&T>)],
    ) -> StoreResult<Vec<bool>> {
        let mut applied = Vec::with_capacity(tiles.len());
        let mut changed = Vec::new();
        for &(pos, metadata, tile) in tiles {
            let was_applied = self.handle(pos).set_silently(metadata, tile)?;
            if was_applied {
                changed.push(pos);
            }
            applied.push(was_applied);
        }
        self.notify_changed(&changed);
        Ok(applied)
    }

    pub fn multi_mark_dirty(&self, positions: &[TilePos], timestamp: Timestamp) -> StoreResult<Vec<bool>> {
        let mut marked = Vec::with_capacity(positions.len());
        let mut dirtied = Vec::new();
        for &pos in positions {
            let was_marked = self.handle(pos).mark_dirty_silently(timestamp)?;
            if was_marked {
                dirtied.push(pos);
            }
            marked.push(was_marked);
        }
        self.notify_dirty(&dirtied);
        Ok(marked)
    }

    pub fn multi_clear_dirty(&self, positions: &[TilePos]) -> StoreResult<Vec<bool>> {
        positions.iter().map(|&pos| self.handle(pos).clear_dirty()).collect()
    }

    /// See [`DirtyTracker::for_each_dirty`].
    pub fn for_each_dirty(&self, f: impl FnMut(TilePos, Timestamp)) {
        self.tracker.for_each_dirty(f)
    }

    /// Removes every tile and every dirty mark.
    pub fn clear(&self) -> StoreResult<()> {
        self.db.clear()?;
        self.tracker.forget_all();
        Ok(())
    }

    pub fn flush(&self) -> StoreResult<usize> {
        self.db.flush()
    }

    pub fn close(self) -> StoreResult<()> {
        self.db.close()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
