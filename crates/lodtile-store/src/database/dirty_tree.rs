use super::tile_trees::{decode_timestamp, encode_timestamp};
use super::TileKey;
use crate::StoreResult;

use lodtile_core::{TilePos, Timestamp};

use sled::Tree;

pub const DIRTY_TREE_NAME: &str = "dirty";

pub fn open_dirty_tree(db: &sled::Db) -> sled::Result<Tree> {
    db.open_tree(DIRTY_TREE_NAME)
}

pub fn write_dirty(tree: &Tree, pos: TilePos, timestamp: Timestamp) -> sled::Result<()> {
    tree.insert(TileKey::from_pos(pos).into_sled_key(), &encode_timestamp(timestamp)[..])?;
    Ok(())
}

pub fn remove_dirty(tree: &Tree, pos: TilePos) -> sled::Result<()> {
    tree.remove(TileKey::from_pos(pos).into_sled_key())?;
    Ok(())
}

/// Scans the entire tree. Entries come out in key order.
pub fn read_all_dirty(tree: &Tree) -> StoreResult<Vec<(TilePos, Timestamp)>> {
    let mut entries = Vec::new();
    for iter_result in tree.iter() {
        let (key_bytes, value_bytes) = iter_result?;
        let pos = TileKey::from_sled_key(&key_bytes)?.to_pos();
        entries.push((pos, decode_timestamp(DIRTY_TREE_NAME, &value_bytes)?));
    }
    Ok(entries)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
