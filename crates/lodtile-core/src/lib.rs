//! Leaf types shared by every part of the tile store: tile positions, the Morton interleave behind the spatial key codec, and
//! the variable-length integer codec used by the snapshot wire format.

pub mod morton;
pub mod tile_pos;
pub mod var_len;

pub use morton::Morton3i32;
pub use tile_pos::*;

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

// Re-exports.
pub use ahash;
pub use static_assertions;
