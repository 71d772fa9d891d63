//! Z-order (Morton) encoding of signed 3D coordinates.
//!
//! Each coordinate has its sign bit flipped before interleaving, so that the code is monotonic along every axis across zero.
//! Bits are interleaved round-robin starting with `x` in the least significant position. Three 32-bit coordinates fill the
//! low 96 bits of a `u128`.

/// A Morton code for an `[i32; 3]` coordinate. Only the least significant 96 bits are used.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Morton3i32(pub u128);

const SIGN_BIT: u32 = 1 << 31;

/// Mask of the 96 bits that a [`Morton3i32`] may occupy.
pub const MORTON3_MASK: u128 = (1 << 96) - 1;

impl Morton3i32 {
    #[inline]
    pub fn encode(x: i32, y: i32, z: i32) -> Self {
        let x = spread_bits(x as u32 ^ SIGN_BIT);
        let y = spread_bits(y as u32 ^ SIGN_BIT);
        let z = spread_bits(z as u32 ^ SIGN_BIT);
        Self(x | (y << 1) | (z << 2))
    }

    #[inline]
    pub fn decode(self) -> [i32; 3] {
        [
            (compact_bits(self.0) ^ SIGN_BIT) as i32,
            (compact_bits(self.0 >> 1) ^ SIGN_BIT) as i32,
            (compact_bits(self.0 >> 2) ^ SIGN_BIT) as i32,
        ]
    }

    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(MORTON3_MASK);
}

impl From<[i32; 3]> for Morton3i32 {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::encode(x, y, z)
    }
}

impl From<Morton3i32> for [i32; 3] {
    fn from(m: Morton3i32) -> Self {
        m.decode()
    }
}

/// Moves bit `i` of `v` to bit `3 * i`.
#[inline]
fn spread_bits(v: u32) -> u128 {
    let mut result = 0u128;
    for i in 0..32 {
        result |= u128::from((v >> i) & 1) << (3 * i);
    }
    result
}

/// Inverse of [`spread_bits`]; ignores every bit not at a multiple of 3.
#[inline]
fn compact_bits(v: u128) -> u32 {
    let mut result = 0u32;
    for i in 0..32 {
        result |= (((v >> (3 * i)) & 1) as u32) << i;
    }
    result
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
    fn decode_inverts_encode_at_extremes() {
        for p in [
            [0, 0, 0],
            [-1, -1, -1],
            [i32::MIN, i32::MAX, 0],
            [12345, -6789, 1 << 30],
        ] {
            assert_eq!(Morton3i32::from(p).decode(), p);
        }
    }

    #[test]
    fn fits_in_96_bits() {
        assert_eq!(Morton3i32::encode(i32::MAX, i32::MAX, i32::MAX), Morton3i32::MAX);
        assert_eq!(Morton3i32::encode(i32::MIN, i32::MIN, i32::MIN), Morton3i32::MIN);
    }

    #[test]
    fn monotonic_along_each_axis() {
        for v in -4..4 {
            assert!(Morton3i32::encode(v, 0, 0) < Morton3i32::encode(v + 1, 0, 0));
            assert!(Morton3i32::encode(0, v, 0) < Morton3i32::encode(0, v + 1, 0));
            assert!(Morton3i32::encode(0, 0, v) < Morton3i32::encode(0, 0, v + 1));
        }
    }

    #[test]
    fn x_occupies_least_significant_bit() {
        let origin = Morton3i32::encode(0, 0, 0).0;
        assert_eq!(Morton3i32::encode(1, 0, 0).0 ^ origin, 0b001);
        assert_eq!(Morton3i32::encode(0, 1, 0).0 ^ origin, 0b010);
        assert_eq!(Morton3i32::encode(0, 0, 1).0 ^ origin, 0b100);
    }
}
