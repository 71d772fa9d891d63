//! Zigzag-encoded variable-length signed integers (LEB128 groups of 7 bits, least significant group first).

use std::io::{Error, ErrorKind, Read, Result, Write};

const MORE_BIT: u8 = 0b1000_0000;
const LO_7_BITS: u8 = 0b0111_1111;

/// The most bytes a zigzag-encoded `i64` can occupy.
pub const MAX_VAR_I64_LEN: usize = 10;

#[inline]
pub const fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub const fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

pub fn write_var_u64<W: Write>(write: &mut W, mut n: u64) -> Result<()> {
    let mut buf = [0; MAX_VAR_I64_LEN];
    let mut len = 0;
    loop {
        let curr_7_bits = (n & u64::from(LO_7_BITS)) as u8;
        n >>= 7;
        if n == 0 {
            buf[len] = curr_7_bits;
            len += 1;
            break;
        }
        buf[len] = MORE_BIT | curr_7_bits;
        len += 1;
    }
    write.write_all(&buf[..len])
}

pub fn read_var_u64<R: Read>(read: &mut R) -> Result<u64> {
    let mut n = 0u64;
    for i in 0..MAX_VAR_I64_LEN {
        let mut byte = [0];
        read.read_exact(&mut byte)?;
        let [curr_byte] = byte;
        let bits = u64::from(curr_byte & LO_7_BITS);
        if i == MAX_VAR_I64_LEN - 1 && bits > 1 {
            break;
        }
        n |= bits << (7 * i);
        if curr_byte & MORE_BIT == 0 {
            return Ok(n);
        }
    }
    Err(Error::new(
        ErrorKind::InvalidData,
        "malformed data: var len int overflows 64 bits",
    ))
}

pub fn write_var_i64<W: Write>(write: &mut W, n: i64) -> Result<()> {
    write_var_u64(write, zigzag_encode(n))
}

pub fn read_var_i64<R: Read>(read: &mut R) -> Result<i64> {
    read_var_u64(read).map(zigzag_decode)
}

pub fn write_var_i32<W: Write>(write: &mut W, n: i32) -> Result<()> {
    write_var_i64(write, i64::from(n))
}

pub fn read_var_i32<R: Read>(read: &mut R) -> Result<i32> {
    let n = read_var_i64(read)?;
    i32::try_from(n).map_err(|_| {
        Error::new(
            ErrorKind::InvalidData,
            format!("malformed data: var len int {} overflows 32 bits", n),
        )
    })
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
    fn zigzag_interleaves_signs() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);
        assert_eq!(zigzag_decode(u64::MAX), i64::MIN);
    }

    #[test]
    fn small_values_take_one_byte() {
        let mut buf = Vec::new();
        write_var_i64(&mut buf, -64).unwrap();
        assert_eq!(buf, [127]);
        buf.clear();
        write_var_i64(&mut buf, 64).unwrap();
        assert_eq!(buf, [0x80, 0x01]);
    }

    #[test]
    fn extremes_survive() {
        let mut buf = Vec::new();
        for n in [i64::MIN, i64::MAX, 0, -1, 300, -300] {
            buf.clear();
            write_var_i64(&mut buf, n).unwrap();
            assert!(buf.len() <= MAX_VAR_I64_LEN);
            assert_eq!(read_var_i64(&mut buf.as_slice()).unwrap(), n);
        }
    }

    #[test]
    fn rejects_overlong_input() {
        let bytes = [0xFF; 11];
        assert!(read_var_u64(&mut bytes.as_slice()).is_err());
    }

    #[test]
    fn rejects_i32_overflow() {
        let mut buf = Vec::new();
        write_var_i64(&mut buf, i64::from(i32::MAX) + 1).unwrap();
        assert!(read_var_i32(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn truncated_input_is_an_error() {
        let bytes = [0x80];
        assert!(read_var_i64(&mut bytes.as_slice()).is_err());
    }
}
