use static_assertions::const_assert;

/// Level of detail. Level 0 is the finest; a tile at level `n` covers voxels of edge length `2^n`.
pub type Level = u8;

/// The coarsest level a [`TilePos`] may have.
pub const MAX_LEVEL: Level = 31;

// Coordinates are shifted by up to `MAX_LEVEL` bits when changing levels.
const_assert!((MAX_LEVEL as u32) < i32::BITS);

/// A logical clock value. Larger is newer. This is never wall-clock time.
pub type Timestamp = i64;

/// The position of one tile in the level-of-detail hierarchy.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TilePos {
    pub level: Level,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TilePos {
    pub const fn new(level: Level, x: i32, y: i32, z: i32) -> Self {
        Self { level, x, y, z }
    }

    #[inline]
    pub const fn is_level_valid(&self) -> bool {
        self.level <= MAX_LEVEL
    }

    /// The tile one level up that contains `self`.
    ///
    /// # Panics
    ///
    /// If `self.level` is [`MAX_LEVEL`] or beyond, since there is no valid level above it.
    pub fn parent(&self) -> Self {
        assert!(
            self.level < MAX_LEVEL,
            "tile at level {} has no parent below MAX_LEVEL {}",
            self.level,
            MAX_LEVEL
        );
        self.up_to(self.level + 1)
    }

    /// The ancestor of `self` at `target_level`.
    ///
    /// # Panics
    ///
    /// If `target_level` is finer than `self.level`.
    pub fn up_to(&self, target_level: Level) -> Self {
        assert!(
            target_level >= self.level,
            "target level {} is finer than current level {}",
            target_level,
            self.level
        );
        let shift = u32::from(target_level - self.level);
        Self::new(
            target_level,
            self.x.checked_shr(shift).unwrap_or(self.x >> 31),
            self.y.checked_shr(shift).unwrap_or(self.y >> 31),
            self.z.checked_shr(shift).unwrap_or(self.z >> 31),
        )
    }

    /// The minimum descendant of `self` at `target_level`.
    ///
    /// # Panics
    ///
    /// If `target_level` is coarser than `self.level`.
    pub fn down_to(&self, target_level: Level) -> Self {
        assert!(
            target_level <= self.level,
            "target level {} is coarser than current level {}",
            target_level,
            self.level
        );
        let shift = u32::from(self.level - target_level);
        Self::new(
            target_level,
            self.x.wrapping_shl(shift),
            self.y.wrapping_shl(shift),
            self.z.wrapping_shl(shift),
        )
    }

    /// True iff `other` is a strict descendant of `self`.
    pub fn contains(&self, other: &TilePos) -> bool {
        other.level < self.level && other.up_to(self.level) == *self
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
