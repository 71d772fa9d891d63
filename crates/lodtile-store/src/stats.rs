use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Memory accounting for a set of [`TileSnapshot`](crate::TileSnapshot)s.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SnapshotStats {
    pub tiles: u64,
    /// Tiles that are not empty.
    pub tiles_with_data: u64,
    /// Bytes held in payload buffers, compressed or not.
    pub allocated_bytes: u64,
    /// Bytes the payloads would take if all of them were uncompressed.
    pub uncompressed_bytes: u64,
}

impl SnapshotStats {
    /// `allocated_bytes / uncompressed_bytes`, or 1.0 if there is no data.
    pub fn compression_ratio(&self) -> f64 {
        if self.uncompressed_bytes == 0 {
            1.0
        } else {
            self.allocated_bytes as f64 / self.uncompressed_bytes as f64
        }
    }
}

impl Add for SnapshotStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            tiles: self.tiles + rhs.tiles,
            tiles_with_data: self.tiles_with_data + rhs.tiles_with_data,
            allocated_bytes: self.allocated_bytes + rhs.allocated_bytes,
            uncompressed_bytes: self.uncompressed_bytes + rhs.uncompressed_bytes,
        }
    }
}

impl Sub for SnapshotStats {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            tiles: self.tiles - rhs.tiles,
            tiles_with_data: self.tiles_with_data - rhs.tiles_with_data,
            allocated_bytes: self.allocated_bytes - rhs.allocated_bytes,
            uncompressed_bytes: self.uncompressed_bytes - rhs.uncompressed_bytes,
        }
    }
}

impl AddAssign for SnapshotStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for SnapshotStats {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Sum for SnapshotStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
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

    #[test]
    fn sum_then_subtract_one_part() {
        let a = SnapshotStats {
            tiles: 1,
            tiles_with_data: 1,
            allocated_bytes: 10,
            uncompressed_bytes: 40,
        };
        let b = SnapshotStats {
            tiles: 1,
            tiles_with_data: 0,
            allocated_bytes: 0,
            uncompressed_bytes: 0,
        };
        let total: SnapshotStats = [a, b].into_iter().sum();
        assert_eq!(total.tiles, 2);
        assert_eq!(total - b, a);
        assert_eq!(total.compression_ratio(), 0.25);
        assert_eq!(SnapshotStats::default().compression_ratio(), 1.0);
    }
}
