//! Prints what a tile store holds: tile counts per level and the dirty set.
//!
//! Usage: `lodtile-inspect <store directory | config.ron>`
//!
//! The store is opened read-only. A store written by a different format version is reported and left untouched, since
//! opening it would wipe it.

use lodtile::lodtile_store::{read_format_version, TileKey, FORMAT_VERSION};
use lodtile::{PersistenceFlags, StoreConfig, TileStorage, MAX_LEVEL};

use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(arg) = std::env::args().nth(1) else {
        eprintln!("usage: lodtile-inspect <store directory | config.ron>");
        return ExitCode::FAILURE;
    };

    match inspect(Path::new(&arg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn inspect(arg: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = if arg.extension().map_or(false, |ext| ext == "ron") {
        lodtile::config::read_file(arg)?
    } else {
        StoreConfig::at_path(arg)
    };
    config.persistence = PersistenceFlags {
        disable_reads: false,
        disable_writes: true,
    };

    let dir: PathBuf = config.path.clone().ok_or("config has no store path")?;
    if !dir.is_dir() {
        return Err(format!("no tile store at {}", dir.display()).into());
    }
    match read_format_version(&dir)? {
        Some(FORMAT_VERSION) => {}
        found => {
            println!(
                "{}: format version {:?}, this build reads {}; not opening",
                dir.display(),
                found,
                FORMAT_VERSION
            );
            return Ok(());
        }
    }

    let storage = TileStorage::open(&config)?;

    println!("{}: format version {}", dir.display(), FORMAT_VERSION);
    let mut total = 0;
    for level in 0..=MAX_LEVEL {
        let count = storage.db().tile_count(level)?;
        if count > 0 {
            println!("  level {:>2}: {} tiles", level, count);
        }
        total += count;
    }
    println!("  total:    {} tiles", total);

    let mut dirty = storage.dirty_tracker().dirty_entries();
    dirty.sort_by_key(|&(pos, _)| TileKey::from_pos(pos));
    println!("  dirty:    {} tiles", dirty.len());
    for (pos, timestamp) in dirty {
        println!(
            "    level {:>2} ({}, {}, {}) at {}",
            pos.level, pos.x, pos.y, pos.z, timestamp
        );
    }

    storage.close()?;
    Ok(())
}
