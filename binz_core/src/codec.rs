use crate::error::CodecError;

/// Whole-buffer compression abstraction used by the container.
///
/// Each `Codec` implementation:
/// - Works on complete in-memory buffers. Asset payloads are loaded whole
///   everywhere else in the pipeline, so there is no streaming mode.
/// - Never touches the filesystem; the orchestrator owns all I/O.
/// - Must decompress into exactly the length the header declared, or fail.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for logs and CLI display.
    fn name(&self) -> &'static str;

    /// Worst-case compressed size for `raw_len` input bytes.
    ///
    /// Must never under-estimate. Fails with [`crate::CodecFault::EmptyInput`]
    /// when `raw_len` is zero; callers reject empty files before this point.
    fn compress_bound(&self, raw_len: usize) -> Result<usize, CodecError>;

    /// Compress `raw` into a fresh buffer no larger than
    /// `compress_bound(raw.len())`.
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decompress `compressed` into a buffer of exactly `expected_len` bytes.
    ///
    /// A stream that yields fewer or more bytes is an error; the partially
    /// filled buffer is dropped, never returned.
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError>;
}
