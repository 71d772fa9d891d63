//! Loading a [`StoreConfig`] from a RON file.
//!
//! ```ron
//! (
//!     path: Some("saves/world/tiles"),
//!     cache_capacity_bytes: 268435456,
//!     flush_every_ms: Some(500),
//!     persistence: (disable_writes: true),
//! )
//! ```

use lodtile_store::StoreConfig;

use ron::ser::PrettyConfig;
use std::path::Path;

pub fn read_file(path: impl AsRef<Path>) -> Result<StoreConfig, ron::Error> {
    let reader = std::fs::File::open(path)?;

    ron::de::from_reader(reader)
}

pub fn write_file(path: impl AsRef<Path>, config: &StoreConfig) -> Result<(), ron::Error> {
    let text = ron::ser::to_string_pretty(config, PrettyConfig::default())?;
    std::fs::write(path, text)?;

    Ok(())
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

    use lodtile_store::PersistenceFlags;

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.ron");
        std::fs::write(
            &path,
            "(path: Some(\"tiles\"), cache_capacity_bytes: 1024, flush_every_ms: None)",
        )
        .unwrap();

        let config = read_file(&path).unwrap();
        assert_eq!(config.path.as_deref(), Some(Path::new("tiles")));
        assert_eq!(config.cache_capacity_bytes, 1024);
        assert_eq!(config.flush_every_ms, None);
        assert!(!config.temporary);
        assert_eq!(config.persistence, PersistenceFlags::ENABLED);
    }

    #[test]
    fn written_config_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.ron");
        let mut config = StoreConfig::at_path("tiles");
        config.persistence = PersistenceFlags::DISABLED;

        write_file(&path, &config).unwrap();
        let read = read_file(&path).unwrap();
        assert_eq!(read.path, config.path);
        assert_eq!(read.persistence, PersistenceFlags::DISABLED);
    }
}
