/// Magic bytes opening every wrapped asset.
pub const MAGIC: &[u8; 8] = b"BINZPACK";

/// Length of the magic prefix in bytes.
pub const MAGIC_SIZE: usize = 8;

/// Fixed size of the container header in bytes.
///   magic[8] + uncompressed_size:u64
///   = 8 + 8 = 16
pub const HEADER_SIZE: usize = 16;

/// Largest expansion a DEFLATE stream can achieve (258-byte matches encoded
/// in two bits each). A header claiming more than this relative to the
/// compressed region cannot be honest.
pub const MAX_DEFLATE_RATIO: u64 = 1032;

/// True when `buf` starts with [`MAGIC`]. Shorter buffers never match.
pub fn magic_matches(buf: &[u8]) -> bool {
    buf.len() >= MAGIC_SIZE && &buf[..MAGIC_SIZE] == MAGIC
}

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 16-byte container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Exact byte length of the payload once decompressed.
    pub uncompressed_size: u64,
}

impl ContainerHeader {
    pub fn new(uncompressed_size: u64) -> Self {
        Self { uncompressed_size }
    }

    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..MAGIC_SIZE].copy_from_slice(MAGIC);
        buf[MAGIC_SIZE..].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        buf
    }

    /// Parse the first `HEADER_SIZE` bytes of `buf`.
    ///
    /// Returns `None` when the buffer is too short or the magic does not
    /// match; both mean "raw payload" to the caller, not corruption.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || !magic_matches(buf) {
            return None;
        }
        let mut size = [0u8; 8];
        size.copy_from_slice(&buf[MAGIC_SIZE..HEADER_SIZE]);
        Some(Self {
            uncompressed_size: u64::from_le_bytes(size),
        })
    }

    /// Size on disk of a container holding `compressed_len` payload bytes.
    pub fn stored_len(compressed_len: u64) -> u64 {
        HEADER_SIZE as u64 + compressed_len
    }
}
