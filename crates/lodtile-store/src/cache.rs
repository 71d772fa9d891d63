use crate::{SnapshotStats, TileSnapshot};

use lodtile_core::TilePos;

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

/// Holds the newest known [`TileSnapshot`] of each tile for readers such as mesh bakers.
///
/// Snapshots usually arrive uncompressed. Cold entries can be swapped for their compressed form with
/// [`SnapshotCache::try_compress`]; the swap is skipped if the entry changed while compressing.
#[derive(Default)]
pub struct SnapshotCache {
    snapshots: DashMap<TilePos, TileSnapshot, RandomState>,
    stats: Mutex<SnapshotStats>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches `snapshot` unless an entry at least as new is already cached. Returns `true` if it was cached.
    pub fn receive(&self, snapshot: TileSnapshot) -> bool {
        match self.snapshots.entry(snapshot.pos()) {
            Entry::Occupied(entry) if entry.get().timestamp() >= snapshot.timestamp() => {
                log::trace!(
                    "ignored snapshot of {:?} at {}, cached one is at {}",
                    snapshot.pos(),
                    snapshot.timestamp(),
                    entry.get().timestamp()
                );
                snapshot.release();
                false
            }
            Entry::Occupied(mut entry) => {
                let added = snapshot.stats();
                let old = entry.insert(snapshot);
                self.replace_stats(old.stats(), added);
                old.release();
                true
            }
            Entry::Vacant(entry) => {
                *self.stats.lock() += snapshot.stats();
                entry.insert(snapshot);
                true
            }
        }
    }

    /// Another reference to the cached snapshot of `pos`.
    pub fn get(&self, pos: TilePos) -> Option<TileSnapshot> {
        self.snapshots.get(&pos).map(|entry| entry.retain())
    }

    pub fn remove(&self, pos: TilePos) -> bool {
        match self.snapshots.remove(&pos) {
            Some((_, old)) => {
                *self.stats.lock() -= old.stats();
                old.release();
                true
            }
            None => false,
        }
    }

    /// Replaces the cached snapshot of `pos` with its compressed form. Returns `true` if it was replaced.
    pub fn try_compress(&self, pos: TilePos) -> bool {
        let current = match self.get(pos) {
            Some(current) if !current.is_compressed() && !current.is_empty() => current,
            Some(current) => {
                current.release();
                return false;
            }
            None => return false,
        };

        // Compress without holding the entry lock.
        let compressed = current.compressed();

        let replaced = match self.snapshots.entry(pos) {
            Entry::Occupied(mut entry) if TileSnapshot::ptr_eq(entry.get(), &current) => {
                let added = compressed.stats();
                let old = entry.insert(compressed);
                self.replace_stats(old.stats(), added);
                old.release();
                true
            }
            _ => {
                compressed.release();
                false
            }
        };
        current.release();
        replaced
    }

    pub fn stats(&self) -> SnapshotStats {
        *self.stats.lock()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&self) {
        self.snapshots.retain(|_, snapshot| {
            *self.stats.lock() -= snapshot.stats();
            false
        });
    }

    fn replace_stats(&self, removed: SnapshotStats, added: SnapshotStats) {
        let mut stats = self.stats.lock();
        *stats -= removed;
        *stats += added;
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
