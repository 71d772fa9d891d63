use crate::StoreResult;

use std::fs;
use std::io;
use std::path::Path;

/// On-disk format version of this build. Bump this whenever the layout of any tree changes; stores written with any other
/// version are discarded at startup.
pub const FORMAT_VERSION: u32 = 1;

const MARKER_FILE_NAME: &str = "format_version";

/// Reads the format version recorded in the store at `dir`, if any.
///
/// Returns `None` for a missing or unreadable marker.
pub fn read_format_version(dir: &Path) -> io::Result<Option<u32>> {
    match fs::read_to_string(dir.join(MARKER_FILE_NAME)) {
        Ok(text) => Ok(text.trim().parse().ok()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Makes sure `dir` either holds a store of the current [`FORMAT_VERSION`] or is empty.
///
/// There is no migration path: a store with a missing or mismatched marker is wiped.
pub fn prepare_store_dir(dir: &Path) -> StoreResult<()> {
    if dir.exists() {
        let found = read_format_version(dir)?;
        if found != Some(FORMAT_VERSION) && fs::read_dir(dir)?.next().is_some() {
            log::warn!(
                "tile store at {} has format version {:?}, but this build uses {}; discarding all stored tiles",
                dir.display(),
                found,
                FORMAT_VERSION
            );
            fs::remove_dir_all(dir)?;
        }
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Records [`FORMAT_VERSION`] in `dir`. Must only be called once the store in `dir` has been opened successfully.
pub fn write_format_version(dir: &Path) -> StoreResult<()> {
    fs::write(dir.join(MARKER_FILE_NAME), FORMAT_VERSION.to_string())?;
    Ok(())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
