use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The zero-length sentinel shared by every empty [`TileBuf`]. Empty buffers never allocate.
static EMPTY_PAYLOAD: [u8; 0] = [];

static LIVE_BUFFERS: AtomicUsize = AtomicUsize::new(0);
static LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);
static LEAKED_BUFFERS: AtomicUsize = AtomicUsize::new(0);

/// Process-wide counters of tile payload buffers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TileBufferStats {
    pub live_buffers: usize,
    pub live_bytes: usize,
    /// Buffers that were freed by the drop safety net instead of an explicit [`TileBuf::release`].
    pub leaked_buffers: usize,
}

pub fn tile_buffer_stats() -> TileBufferStats {
    TileBufferStats {
        live_buffers: LIVE_BUFFERS.load(Ordering::Relaxed),
        live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
        leaked_buffers: LEAKED_BUFFERS.load(Ordering::Relaxed),
    }
}

/// An exclusively owned tile payload buffer.
///
/// The owner must free it with [`TileBuf::release`]. Dropping an unreleased, non-empty buffer still frees it, but logs a
/// warning and counts a leak, because it means some owner lost track of the buffer's lifetime.
pub struct TileBuf {
    slot: BufSlot,
}

enum BufSlot {
    Empty,
    Heap(Box<[u8]>),
    Released,
}

impl TileBuf {
    pub const fn empty() -> Self {
        Self {
            slot: BufSlot::Empty,
        }
    }

    pub fn copy_from(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self::from_boxed(bytes.into())
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self::from_boxed(bytes.into_boxed_slice())
        }
    }

    /// A buffer of `len` zeroes, to be filled in place.
    pub fn zeroed(len: usize) -> Self {
        if len == 0 {
            Self::empty()
        } else {
            Self::from_boxed(vec![0; len].into_boxed_slice())
        }
    }

    fn from_boxed(bytes: Box<[u8]>) -> Self {
        LIVE_BUFFERS.fetch_add(1, Ordering::Relaxed);
        LIVE_BYTES.fetch_add(bytes.len(), Ordering::Relaxed);
        Self {
            slot: BufSlot::Heap(bytes),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.slot {
            BufSlot::Heap(bytes) => &bytes[..],
            BufSlot::Empty | BufSlot::Released => &EMPTY_PAYLOAD,
        }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.slot {
            BufSlot::Heap(bytes) => &mut bytes[..],
            BufSlot::Empty | BufSlot::Released => &mut [],
        }
    }

    /// Frees the buffer. Returns `true` if any memory was freed.
    pub fn release(mut self) -> bool {
        self.free()
    }

    fn free(&mut self) -> bool {
        match mem::replace(&mut self.slot, BufSlot::Released) {
            BufSlot::Heap(bytes) => {
                LIVE_BUFFERS.fetch_sub(1, Ordering::Relaxed);
                LIVE_BYTES.fetch_sub(bytes.len(), Ordering::Relaxed);
                true
            }
            BufSlot::Empty | BufSlot::Released => false,
        }
    }
}

impl Drop for TileBuf {
    fn drop(&mut self) {
        if let BufSlot::Heap(bytes) = &self.slot {
            log::warn!(
                "tile buffer of {} bytes was dropped without being released; this is a lifetime bug",
                bytes.len()
            );
            LEAKED_BUFFERS.fetch_add(1, Ordering::Relaxed);
            self.free();
        }
    }
}

impl AsRef<[u8]> for TileBuf {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::fmt::Debug for TileBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileBuf").field("len", &self.len()).finish()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
