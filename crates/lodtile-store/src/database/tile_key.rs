use crate::{StoreError, StoreResult};

use lodtile_core::{Level, Morton3i32, TilePos};

use core::ops::RangeInclusive;
use lodtile_core::morton::MORTON3_MASK;
use lodtile_core::static_assertions::const_assert_eq;

/// Length in bytes of a [`TileKey`] as stored in `sled`.
pub const TILE_KEY_LEN: usize = 13;

// One level byte plus the 96 used bits of the Morton code.
const_assert_eq!(TILE_KEY_LEN, 1 + (MORTON3_MASK.count_ones() / 8) as usize);

/// The ordered database key of a [`TilePos`].
///
/// The derived [`Ord`] matches the lexicographic order of [`TileKey::into_sled_key`]: all tiles of one level are contiguous,
/// and within a level tiles are sorted in Morton order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TileKey {
    pub level: Level,
    pub morton: Morton3i32,
}

impl TileKey {
    pub fn new(level: Level, morton: Morton3i32) -> Self {
        Self { level, morton }
    }

    pub fn from_pos(pos: TilePos) -> Self {
        Self::new(pos.level, Morton3i32::encode(pos.x, pos.y, pos.z))
    }

    pub fn to_pos(self) -> TilePos {
        let [x, y, z] = self.morton.decode();
        TilePos::new(self.level, x, y, z)
    }

    /// The level byte, then the low 96 bits of the Morton code, most significant byte first. Comparing two of these byte
    /// strings gives the same answer as comparing the keys.
    pub fn into_sled_key(self) -> [u8; TILE_KEY_LEN] {
        let [_, _, _, _, code @ ..] = self.morton.0.to_be_bytes();
        let mut bytes = [0; TILE_KEY_LEN];
        bytes[0] = self.level;
        bytes[1..].copy_from_slice(&code);
        bytes
    }

    pub fn from_sled_key(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() != TILE_KEY_LEN {
            return Err(StoreError::CorruptKey { len: bytes.len() });
        }
        let (level, code) = (bytes[0], &bytes[1..]);
        let mut padded = [0; 16];
        padded[16 - code.len()..].copy_from_slice(code);
        Ok(Self::new(level, Morton3i32(u128::from_be_bytes(padded))))
    }

    pub fn min_key(level: Level) -> Self {
        Self::new(level, Morton3i32::MIN)
    }

    pub fn max_key(level: Level) -> Self {
        Self::new(level, Morton3i32::MAX)
    }

    /// Every key at `level`, inclusive.
    pub fn level_range(level: Level) -> RangeInclusive<Self> {
        Self::min_key(level)..=Self::max_key(level)
    }
}

impl From<TilePos> for TileKey {
    fn from(pos: TilePos) -> Self {
        Self::from_pos(pos)
    }
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

    use lodtile_core::SmallKeyHashSet;

    fn sled_key(level: Level, x: i32, y: i32, z: i32) -> [u8; TILE_KEY_LEN] {
        TileKey::from_pos(TilePos::new(level, x, y, z)).into_sled_key()
    }

    fn key_distance(a: [u8; TILE_KEY_LEN], b: [u8; TILE_KEY_LEN]) -> u128 {
        let as_int = |k: [u8; TILE_KEY_LEN]| {
            let mut bytes = [0; 16];
            bytes[3..].copy_from_slice(&k);
            u128::from_be_bytes(bytes)
        };
        as_int(a).abs_diff(as_int(b))
    }

    #[test]
    fn sled_key_recovers_position() {
        for pos in [
            TilePos::new(0, 0, 0, 0),
            TilePos::new(7, -1, 2, -3),
            TilePos::new(31, i32::MIN, i32::MAX, -12345),
        ] {
            let key = TileKey::from_pos(pos);
            assert_eq!(TileKey::from_sled_key(&key.into_sled_key()).unwrap(), key);
            assert_eq!(key.to_pos(), pos);
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            TileKey::from_sled_key(&[0; 12]),
            Err(StoreError::CorruptKey { len: 12 })
        ));
    }

    #[test]
    fn distinct_positions_have_distinct_keys() {
        let mut seen = SmallKeyHashSet::default();
        for level in 0..3 {
            for x in -3..3 {
                for y in -3..3 {
                    for z in -3..3 {
                        assert!(seen.insert(sled_key(level, x, y, z)));
                    }
                }
            }
        }
    }

    #[test]
    fn byte_order_matches_key_order() {
        let a = TileKey::from_pos(TilePos::new(1, 5, -2, 9));
        let b = TileKey::from_pos(TilePos::new(1, 5, -2, 10));
        let c = TileKey::from_pos(TilePos::new(2, -100, -100, -100));
        assert!(a < b && b < c);
        assert!(a.into_sled_key() < b.into_sled_key());
        assert!(b.into_sled_key() < c.into_sled_key());
    }

    #[test]
    fn levels_are_contiguous() {
        let range = TileKey::level_range(3);
        assert!(range.contains(&TileKey::from_pos(TilePos::new(3, i32::MIN, 0, i32::MAX))));
        assert!(!range.contains(&TileKey::from_pos(TilePos::new(2, i32::MAX, i32::MAX, i32::MAX))));
        assert!(!range.contains(&TileKey::from_pos(TilePos::new(4, i32::MIN, i32::MIN, i32::MIN))));
    }

    #[test]
    fn nearby_tiles_have_nearby_keys() {
        let origin = sled_key(0, 16, 16, 16);
        let far = key_distance(origin, sled_key(0, 16 + 1000, 16, 16));
        for dx in 0..2 {
            for dy in 0..2 {
                for dz in 0..2 {
                    let near = key_distance(origin, sled_key(0, 16 + dx, 16 + dy, 16 + dz));
                    assert!(near < far, "{} >= {}", near, far);
                }
            }
        }
    }
}
