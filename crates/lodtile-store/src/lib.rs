//! Versioned, compressed, persistent storage of level-of-detail tiles, plus the index of tiles that need regeneration.
//!
//! Open a [`TileStorage`], then read and write tiles through [`TileStorage::handle`]. Every tile carries a logical
//! [`Timestamp`](lodtile_core::Timestamp), and a write only applies if its timestamp is strictly newer than the stored one,
//! so concurrent generators of the same tile can never regress it.
//!
//! All storage calls block on disk I/O.

mod cache;
mod compression;
mod config;
mod database;
mod dirty_tracker;
mod error;
mod handle;
mod snapshot;
mod stats;
mod storage;
mod tile_buf;

pub use cache::SnapshotCache;
pub use config::{PersistenceFlags, StoreConfig};
pub use database::{read_format_version, StoredTile, TileDb, TileKey, FORMAT_VERSION, TILE_KEY_LEN};
pub use dirty_tracker::DirtyTracker;
pub use error::{StoreError, StoreResult};
pub use handle::TileHandle;
pub use snapshot::{TileCodec, TileMetadata, TileSnapshot};
pub use stats::SnapshotStats;
pub use storage::{TileStorage, TileStorageListener};
pub use tile_buf::{tile_buffer_stats, TileBuf, TileBufferStats};

// Re-exports.
pub use lodtile_core;
pub use sled;
