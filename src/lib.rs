//! Persistent, versioned storage of level-of-detail tiles.
//!
//! This crate only glues the workspace together; see [`lodtile_store`] for the storage engine and [`lodtile_core`] for the
//! shared tile types.

pub mod config;

pub use lodtile_core::{Level, TilePos, Timestamp, MAX_LEVEL};
pub use lodtile_store::{
    DirtyTracker, PersistenceFlags, SnapshotCache, SnapshotStats, StoreConfig, StoreError, StoreResult, TileCodec,
    TileHandle, TileMetadata, TileSnapshot, TileStorage, TileStorageListener,
};

// Re-exports.
pub use lodtile_core;
pub use lodtile_store;
