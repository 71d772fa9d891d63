//! LZ4 block compression of tile payloads.
//!
//! A compressed payload is self-describing: a 4-byte little-endian decompressed length followed by one LZ4 block. The length
//! lets decompression size its output exactly once.

use crate::{StoreError, StoreResult, TileBuf};

use lz4_flex::block::{compress_prepend_size, decompress_into};

const SIZE_PREFIX_LEN: usize = 4;

/// No LZ4 block decompresses to more than this many bytes per compressed byte.
const MAX_EXPANSION: usize = 255;

pub fn compress(bytes: &[u8]) -> TileBuf {
    TileBuf::from_vec(compress_prepend_size(bytes))
}

/// The decompressed length embedded in `compressed`.
///
/// A length that the block could not possibly expand to is rejected, so callers may allocate it up front.
pub fn decompressed_len(compressed: &[u8]) -> StoreResult<usize> {
    let prefix: [u8; SIZE_PREFIX_LEN] = compressed
        .get(..SIZE_PREFIX_LEN)
        .and_then(|p| p.try_into().ok())
        .ok_or(StoreError::CorruptPayload {
            expected: SIZE_PREFIX_LEN,
            actual: compressed.len(),
        })?;
    let claimed = u32::from_le_bytes(prefix) as usize;
    let limit = (compressed.len() - SIZE_PREFIX_LEN).saturating_mul(MAX_EXPANSION);
    if claimed > limit {
        return Err(StoreError::OversizedPayload { claimed, limit });
    }
    Ok(claimed)
}

/// Decompresses `compressed` into a new buffer of exactly the embedded length.
pub fn decompress(compressed: &[u8]) -> StoreResult<TileBuf> {
    let expected = decompressed_len(compressed)?;
    let mut out = TileBuf::zeroed(expected);
    match decompress_into(&compressed[SIZE_PREFIX_LEN..], out.as_mut_slice()) {
        Ok(actual) if actual == expected => Ok(out),
        Ok(actual) => {
            out.release();
            Err(StoreError::CorruptPayload { expected, actual })
        }
        Err(e) => {
            out.release();
            Err(e.into())
        }
    }
}

/// Like [`decompress`], but into a plain `Vec`. Used for transient reads that never outlive the caller.
pub fn decompress_to_vec(compressed: &[u8]) -> StoreResult<Vec<u8>> {
    let expected = decompressed_len(compressed)?;
    let mut out = vec![0; expected];
    let actual = decompress_into(&compressed[SIZE_PREFIX_LEN..], &mut out)?;
    if actual != expected {
        return Err(StoreError::CorruptPayload { expected, actual });
    }
    Ok(out)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
