use crate::database::{read_all_dirty, remove_dirty, write_dirty};
use crate::{PersistenceFlags, StoreError, StoreResult, TileDb};

use lodtile_core::{TilePos, Timestamp};

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use sled::Tree;
use std::sync::Arc;

/// # Dirty Tracker
///
/// The set of tiles that must be regenerated, each with the timestamp of its latest invalidation.
///
/// The in-memory map is the source of truth. Every change is written to the store's dirty tree *before* it becomes visible in
/// memory, so a crash between the two leaves the store ahead of memory, never behind. On startup the map is rebuilt from a full
/// scan of the dirty tree.
///
/// Updates of one position are serialized by a lock for that position alone, which is held across the store write. Map
/// shards are only locked for in-memory reads and writes, so updates and lookups of different positions never wait on each
/// other's I/O.
pub struct DirtyTracker {
    dirty: DashMap<TilePos, Timestamp, RandomState>,
    /// Only holds positions with an update in flight.
    key_locks: DashMap<TilePos, Arc<Mutex<()>>, RandomState>,
    tree: Tree,
    persistence: PersistenceFlags,
}

impl DirtyTracker {
    /// Rebuilds the tracker from the dirty tree of `db`. Must finish before any tile traffic is accepted.
    pub fn recover(db: &TileDb) -> StoreResult<Self> {
        let persistence = db.persistence();
        let dirty = DashMap::with_hasher(RandomState::new());
        if persistence.reads_enabled() {
            for (pos, timestamp) in read_all_dirty(db.dirty_tree())? {
                dirty.insert(pos, timestamp);
            }
        }
        log::info!("recovered {} dirty tiles", dirty.len());

        Ok(Self {
            dirty,
            key_locks: DashMap::with_hasher(RandomState::new()),
            tree: db.dirty_tree().clone(),
            persistence,
        })
    }

    /// Marks `pos` dirty at `timestamp` iff `timestamp` is newer than the recorded dirty timestamp (or none is recorded).
    pub fn mark_dirty(&self, pos: TilePos, timestamp: Timestamp) -> StoreResult<bool> {
        check_level(pos)?;
        self.with_key_lock(pos, || {
            if let Some(current) = self.dirty_timestamp(pos) {
                if timestamp <= current {
                    log::trace!(
                        "rejected dirty mark of {:?} at {}, already dirty at {}",
                        pos,
                        timestamp,
                        current
                    );
                    return Ok(false);
                }
            }
            self.persist(pos, timestamp)?;
            self.dirty.insert(pos, timestamp);
            Ok(true)
        })
    }

    /// Clears the dirty mark of `pos` iff it was recorded at exactly `timestamp`.
    ///
    /// A clear for an older invalidation must not remove a newer one, so an older `timestamp` does not match.
    pub fn clear_dirty(&self, pos: TilePos, timestamp: Timestamp) -> StoreResult<bool> {
        check_level(pos)?;
        self.with_key_lock(pos, || {
            if self.dirty_timestamp(pos) != Some(timestamp) {
                log::trace!("rejected dirty clear of {:?} at {}", pos, timestamp);
                return Ok(false);
            }
            if self.persistence.writes_enabled() {
                remove_dirty(&self.tree, pos)?;
            }
            self.dirty.remove(&pos);
            Ok(true)
        })
    }

    /// In-memory lookup only.
    pub fn dirty_timestamp(&self, pos: TilePos) -> Option<Timestamp> {
        self.dirty.get(&pos).map(|entry| *entry)
    }

    /// Calls `f` on a point-in-time copy of the dirty set, so `f` may freely call back into the tracker.
    pub fn for_each_dirty(&self, mut f: impl FnMut(TilePos, Timestamp)) {
        for (pos, timestamp) in self.dirty_entries() {
            f(pos, timestamp);
        }
    }

    /// A point-in-time copy of the dirty set, in no particular order.
    pub fn dirty_entries(&self) -> Vec<(TilePos, Timestamp)> {
        self.dirty
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Forgets every dirty mark in memory. The caller is responsible for clearing the dirty tree.
    pub(crate) fn forget_all(&self) {
        self.dirty.clear();
    }

    /// Runs `f` while holding the update lock of `pos`.
    fn with_key_lock<T>(&self, pos: TilePos, f: impl FnOnce() -> T) -> T {
        let lock = self.key_locks.entry(pos).or_default().clone();
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // Anyone else using this lock got their reference under the shard lock, so a count of 1 means it is unused.
        self.key_locks
            .remove_if(&pos, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn persist(&self, pos: TilePos, timestamp: Timestamp) -> StoreResult<()> {
        if self.persistence.writes_enabled() {
            write_dirty(&self.tree, pos, timestamp)?;
        }
        Ok(())
    }
}

fn check_level(pos: TilePos) -> StoreResult<()> {
    if pos.is_level_valid() {
        Ok(())
    } else {
        Err(StoreError::InvalidLevel(pos.level))
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
