use crate::{compression, SnapshotStats, StoreError, StoreResult, TileBuf};

use lodtile_core::var_len::{read_var_i32, read_var_i64, write_var_i32, write_var_i64};
use lodtile_core::{TilePos, Timestamp};

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// What a generator knows about a tile besides its content.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TileMetadata {
    pub timestamp: Timestamp,
}

impl TileMetadata {
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }
}

/// Converts tile content to and from the opaque payload bytes that are stored.
///
/// An implementation that encodes nothing marks the tile as empty.
pub trait TileCodec: Sized {
    type Error: fmt::Display;

    fn encode_tile(&self, out: &mut Vec<u8>);

    fn decode_tile(bytes: &[u8]) -> Result<Self, Self::Error>;
}

/// Raw bytes are their own encoding.
impl TileCodec for Vec<u8> {
    type Error = Infallible;

    fn encode_tile(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode_tile(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(bytes.to_vec())
    }
}

enum TileData {
    Uncompressed(TileBuf),
    Compressed { bytes: TileBuf, uncompressed_len: usize },
}

impl TileData {
    fn buffer(&self) -> &TileBuf {
        match self {
            Self::Uncompressed(bytes) | Self::Compressed { bytes, .. } => bytes,
        }
    }

    fn uncompressed_len(&self) -> usize {
        match self {
            Self::Uncompressed(bytes) => bytes.len(),
            Self::Compressed {
                uncompressed_len, ..
            } => *uncompressed_len,
        }
    }

    fn release(self) -> bool {
        match self {
            Self::Uncompressed(bytes) | Self::Compressed { bytes, .. } => bytes.release(),
        }
    }
}

struct SnapshotInner {
    pos: TilePos,
    timestamp: Timestamp,
    /// `None` if the tile is known to be empty.
    data: Option<TileData>,
}

impl Drop for SnapshotInner {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            data.release();
        }
    }
}

/// # Tile Snapshot
///
/// An immutable capture of one tile's payload at one timestamp.
///
/// A snapshot is reference counted: [`TileSnapshot::retain`] hands out another reference and [`TileSnapshot::release`] gives
/// one back. The payload buffer is freed exactly once, by whichever reference goes last. Dropping a reference counts as
/// releasing it.
///
/// The payload is held either uncompressed or LZ4-compressed. [`TileSnapshot::compressed`] and
/// [`TileSnapshot::uncompressed`] convert between the two by building a new snapshot, so readers of the source snapshot never
/// observe the change. A compressed payload is only decompressed when it is read.
#[derive(Clone)]
pub struct TileSnapshot {
    inner: Arc<SnapshotInner>,
}

impl TileSnapshot {
    fn from_parts(pos: TilePos, timestamp: Timestamp, data: Option<TileData>) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                pos,
                timestamp,
                data,
            }),
        }
    }

    /// A snapshot of a tile that is known to contain nothing.
    pub fn empty(pos: TilePos, timestamp: Timestamp) -> Self {
        Self::from_parts(pos, timestamp, None)
    }

    /// Copies `payload` into a new uncompressed snapshot. A zero-length payload shares the empty sentinel and allocates
    /// nothing.
    pub fn from_payload(pos: TilePos, timestamp: Timestamp, payload: Option<&[u8]>) -> Self {
        let data = payload.map(|bytes| TileData::Uncompressed(TileBuf::copy_from(bytes)));
        Self::from_parts(pos, timestamp, data)
    }

    /// Encodes `tile` into a new uncompressed snapshot.
    pub fn from_tile<T: TileCodec>(pos: TilePos, metadata: TileMetadata, tile: Option<&T>) -> Self {
        let data = tile.map(|tile| {
            let mut bytes = Vec::new();
            tile.encode_tile(&mut bytes);
            TileData::Uncompressed(TileBuf::from_vec(bytes))
        });
        Self::from_parts(pos, metadata.timestamp, data)
    }

    /// Wraps a payload exactly as it was read from the store: LZ4 block with a size prefix.
    pub(crate) fn from_stored(
        pos: TilePos,
        timestamp: Timestamp,
        compressed: Option<&[u8]>,
    ) -> StoreResult<Self> {
        let data = match compressed {
            Some(bytes) => Some(TileData::Compressed {
                uncompressed_len: compression::decompressed_len(bytes)?,
                bytes: TileBuf::copy_from(bytes),
            }),
            None => None,
        };
        Ok(Self::from_parts(pos, timestamp, data))
    }

    #[inline]
    pub fn pos(&self) -> TilePos {
        self.inner.pos
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.inner.timestamp
    }

    pub fn metadata(&self) -> TileMetadata {
        TileMetadata::new(self.timestamp())
    }

    /// `true` if there is no payload or the payload has zero length.
    pub fn is_empty(&self) -> bool {
        self.inner
            .data
            .as_ref()
            .map_or(true, |data| data.uncompressed_len() == 0)
    }

    pub fn has_payload(&self) -> bool {
        self.inner.data.is_some()
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.inner.data, Some(TileData::Compressed { .. }))
    }

    /// Another reference to the same snapshot.
    pub fn retain(&self) -> Self {
        self.clone()
    }

    /// Gives back this reference. Returns `true` if it was the last one and the payload was freed.
    pub fn release(self) -> bool {
        Arc::into_inner(self.inner).is_some()
    }

    /// `true` if both are references to the same snapshot.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// This snapshot with a compressed payload. Returns another reference to `self` if there is nothing to compress.
    pub fn compressed(&self) -> Self {
        match &self.inner.data {
            Some(TileData::Uncompressed(bytes)) if !bytes.is_empty() => {
                let data = TileData::Compressed {
                    bytes: compression::compress(bytes.as_slice()),
                    uncompressed_len: bytes.len(),
                };
                Self::from_parts(self.pos(), self.timestamp(), Some(data))
            }
            _ => self.retain(),
        }
    }

    /// This snapshot with an uncompressed payload. Returns another reference to `self` if it is not compressed.
    pub fn uncompressed(&self) -> StoreResult<Self> {
        match &self.inner.data {
            Some(TileData::Compressed { bytes, .. }) => {
                let data = TileData::Uncompressed(compression::decompress(bytes.as_slice())?);
                Ok(Self::from_parts(self.pos(), self.timestamp(), Some(data)))
            }
            _ => Ok(self.retain()),
        }
    }

    /// The decoded payload bytes, decompressing into a temporary buffer if necessary.
    pub fn uncompressed_bytes(&self) -> StoreResult<Option<Cow<'_, [u8]>>> {
        Ok(match &self.inner.data {
            None => None,
            Some(TileData::Uncompressed(bytes)) => Some(Cow::Borrowed(bytes.as_slice())),
            Some(TileData::Compressed { bytes, .. }) => Some(Cow::Owned(
                compression::decompress_to_vec(bytes.as_slice())?,
            )),
        })
    }

    /// Decodes the tile content. Returns `None` for an empty tile.
    pub fn load_tile<T: TileCodec>(&self) -> StoreResult<Option<T>> {
        if self.is_empty() {
            return Ok(None);
        }
        match self.uncompressed_bytes()? {
            Some(bytes) => T::decode_tile(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn stats(&self) -> SnapshotStats {
        match &self.inner.data {
            None => SnapshotStats {
                tiles: 1,
                ..Default::default()
            },
            Some(data) => SnapshotStats {
                tiles: 1,
                tiles_with_data: u64::from(data.uncompressed_len() != 0),
                allocated_bytes: data.buffer().len() as u64,
                uncompressed_bytes: data.uncompressed_len() as u64,
            },
        }
    }

    /// Writes `timestamp`, then the payload length (`-1` for no payload), then the decoded payload bytes.
    pub fn write_to<W: Write>(&self, write: &mut W) -> StoreResult<()> {
        write_var_i64(write, self.timestamp())?;
        match self.uncompressed_bytes()? {
            Some(bytes) => {
                let len = i32::try_from(bytes.len()).map_err(|_| {
                    StoreError::Wire(format!("payload of {} bytes is too long", bytes.len()))
                })?;
                write_var_i32(write, len)?;
                write.write_all(&bytes)?;
            }
            None => write_var_i32(write, -1)?,
        }
        Ok(())
    }

    /// Reads the format of [`TileSnapshot::write_to`] into a new uncompressed snapshot. Any negative length means "no
    /// payload".
    pub fn read_from<R: Read>(pos: TilePos, read: &mut R) -> StoreResult<Self> {
        let timestamp = read_var_i64(read).map_err(wire_error)?;
        let len = read_var_i32(read).map_err(wire_error)?;
        let data = if len < 0 {
            None
        } else {
            // The length is untrusted, so let the buffer grow with the bytes that actually arrive.
            let len = len as usize;
            let mut bytes = Vec::new();
            read.by_ref()
                .take(len as u64)
                .read_to_end(&mut bytes)
                .map_err(wire_error)?;
            if bytes.len() != len {
                return Err(StoreError::Wire(format!(
                    "payload claims {} bytes, but only {} follow",
                    len,
                    bytes.len()
                )));
            }
            Some(TileData::Uncompressed(TileBuf::from_vec(bytes)))
        };
        Ok(Self::from_parts(pos, timestamp, data))
    }

    pub fn to_wire_bytes(&self) -> StoreResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Like [`TileSnapshot::read_from`], but trailing bytes are an error.
    pub fn from_wire_bytes(pos: TilePos, mut bytes: &[u8]) -> StoreResult<Self> {
        let snapshot = Self::read_from(pos, &mut bytes)?;
        if !bytes.is_empty() {
            return Err(StoreError::Wire(format!(
                "{} trailing bytes after snapshot",
                bytes.len()
            )));
        }
        Ok(snapshot)
    }
}

fn wire_error(e: io::Error) -> StoreError {
    StoreError::Wire(e.to_string())
}

impl fmt::Debug for TileSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileSnapshot")
            .field("pos", &self.pos())
            .field("timestamp", &self.timestamp())
            .field("has_payload", &self.has_payload())
            .field("compressed", &self.is_compressed())
            .finish()
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

    const POS: TilePos = TilePos::new(2, -3, 4, 5);

    fn payload() -> Vec<u8> {
        (0..2048u32).map(|i| (i % 7) as u8).collect()
    }

    #[test]
    fn compress_then_uncompress_preserves_payload_and_timestamp() {
        let original = TileSnapshot::from_payload(POS, 42, Some(&payload()));
        let compressed = original.compressed();
        assert!(compressed.is_compressed());
        assert_eq!(compressed.timestamp(), 42);
        assert!(compressed.stats().allocated_bytes < original.stats().allocated_bytes);
        assert_eq!(compressed.stats().uncompressed_bytes, 2048);

        let restored = compressed.uncompressed().unwrap();
        assert!(!restored.is_compressed());
        assert_eq!(restored.timestamp(), 42);
        assert_eq!(
            restored.uncompressed_bytes().unwrap().unwrap(),
            original.uncompressed_bytes().unwrap().unwrap()
        );
        assert_eq!(
            compressed.load_tile::<Vec<u8>>().unwrap(),
            Some(payload())
        );

        // The source is untouched by the conversion.
        assert!(!original.is_compressed());
    }

    #[test]
    fn conversions_of_empty_snapshots_are_identity() {
        let empty = TileSnapshot::empty(POS, 1);
        assert!(empty.is_empty());
        assert!(TileSnapshot::ptr_eq(&empty, &empty.compressed()));
        assert!(TileSnapshot::ptr_eq(&empty, &empty.uncompressed().unwrap()));
        assert_eq!(empty.load_tile::<Vec<u8>>().unwrap(), None);

        let sentinel = TileSnapshot::from_payload(POS, 1, Some(&[]));
        assert!(sentinel.is_empty());
        assert!(sentinel.has_payload());
        assert_eq!(sentinel.stats().allocated_bytes, 0);
        assert!(TileSnapshot::ptr_eq(&sentinel, &sentinel.compressed()));
    }

    #[test]
    fn last_release_frees() {
        let a = TileSnapshot::from_payload(POS, 1, Some(b"abc"));
        let b = a.retain();
        assert!(!a.release());
        assert_eq!(b.uncompressed_bytes().unwrap().unwrap().as_ref(), b"abc");
        assert!(b.release());
    }

    #[test]
    fn wire_format_layout() {
        let snapshot = TileSnapshot::from_payload(POS, -1, Some(b"xy"));
        // zigzag(-1) = 1, zigzag(2) = 4
        assert_eq!(snapshot.to_wire_bytes().unwrap(), vec![1, 4, b'x', b'y']);

        let no_payload = TileSnapshot::empty(POS, 3);
        // zigzag(3) = 6, zigzag(-1) = 1
        assert_eq!(no_payload.to_wire_bytes().unwrap(), vec![6, 1]);
    }

    #[test]
    fn wire_bytes_of_compressed_snapshot_are_decoded_payload() {
        let compressed = TileSnapshot::from_payload(POS, 9, Some(&payload())).compressed();
        let bytes = compressed.to_wire_bytes().unwrap();

        let read = TileSnapshot::from_wire_bytes(POS, &bytes).unwrap();
        assert_eq!(read.timestamp(), 9);
        assert!(!read.is_compressed());
        assert_eq!(read.load_tile::<Vec<u8>>().unwrap(), Some(payload()));
    }

    #[test]
    fn malformed_wire_bytes_are_rejected() {
        // Claims 5 bytes of payload, has 1.
        assert!(matches!(
            TileSnapshot::from_wire_bytes(POS, &[2, 10, 0]),
            Err(StoreError::Wire(_))
        ));
        // Trailing garbage.
        assert!(matches!(
            TileSnapshot::from_wire_bytes(POS, &[2, 1, 0]),
            Err(StoreError::Wire(_))
        ));
        // Zero-length payload is present but empty.
        let empty = TileSnapshot::from_wire_bytes(POS, &[2, 0]).unwrap();
        assert!(empty.has_payload() && empty.is_empty());
    }

    #[test]
    fn any_negative_wire_length_means_no_payload() {
        // zigzag(3) = -2
        let snapshot = TileSnapshot::from_wire_bytes(POS, &[2, 3]).unwrap();
        assert_eq!(snapshot.timestamp(), 1);
        assert!(!snapshot.has_payload());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn huge_claimed_wire_length_fails_without_payload() {
        // zigzag(0xFFFF_FFFE) = i32::MAX bytes claimed, none sent.
        assert!(matches!(
            TileSnapshot::from_wire_bytes(POS, &[0, 0xFE, 0xFF, 0xFF, 0xFF, 0x0F]),
            Err(StoreError::Wire(_))
        ));
    }

    #[test]
    fn stored_payload_is_lazily_decompressed() {
        let stored = compression::compress(b"stored payload");
        let snapshot = TileSnapshot::from_stored(POS, 5, Some(stored.as_slice())).unwrap();
        stored.release();

        assert!(snapshot.is_compressed());
        assert_eq!(snapshot.stats().uncompressed_bytes, 14);
        assert_eq!(
            snapshot.load_tile::<Vec<u8>>().unwrap(),
            Some(b"stored payload".to_vec())
        );
    }

    #[test]
    fn codec_errors_surface_as_decode_errors() {
        struct Even(Vec<u8>);

        impl TileCodec for Even {
            type Error = String;

            fn encode_tile(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.0);
            }

            fn decode_tile(bytes: &[u8]) -> Result<Self, Self::Error> {
                if bytes.len() % 2 == 0 {
                    Ok(Even(bytes.to_vec()))
                } else {
                    Err(format!("odd length {}", bytes.len()))
                }
            }
        }

        let snapshot = TileSnapshot::from_tile(POS, TileMetadata::new(1), Some(&Even(vec![1, 2, 3])));
        assert!(matches!(
            snapshot.load_tile::<Even>(),
            Err(StoreError::Decode(_))
        ));
    }
}
