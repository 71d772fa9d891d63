use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Debug switches that turn persistent store calls into no-ops.
///
/// With reads disabled, every read reports "not found". With writes disabled, every write reports "rejected". Neither
/// touches the backing store.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PersistenceFlags {
    #[serde(default)]
    pub disable_reads: bool,
    #[serde(default)]
    pub disable_writes: bool,
}

impl PersistenceFlags {
    pub const ENABLED: Self = Self {
        disable_reads: false,
        disable_writes: false,
    };
    pub const DISABLED: Self = Self {
        disable_reads: true,
        disable_writes: true,
    };

    #[inline]
    pub fn reads_enabled(&self) -> bool {
        !self.disable_reads
    }

    #[inline]
    pub fn writes_enabled(&self) -> bool {
        !self.disable_writes
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Directory holding the store. May only be `None` for a temporary store.
    pub path: Option<PathBuf>,
    /// Removes the store when it is closed.
    #[serde(default)]
    pub temporary: bool,
    pub cache_capacity_bytes: u64,
    pub flush_every_ms: Option<u64>,
    #[serde(default)]
    pub persistence: PersistenceFlags,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            temporary: false,
            // Tile payloads are small and compressed, so this holds a large working set.
            cache_capacity_bytes: 256 * 1024 * 1024,
            flush_every_ms: Some(500),
            persistence: PersistenceFlags::ENABLED,
        }
    }
}

impl StoreConfig {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Default::default()
        }
    }

    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .temporary(self.temporary)
            .cache_capacity(self.cache_capacity_bytes)
            .flush_every_ms(self.flush_every_ms);
        if let Some(path) = &self.path {
            config = config.path(path);
        }
        config
    }
}
