use binz_core::{Codec, CodecError, CodecFault};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

const NAME: &str = "zlib";

/// zlib-wrapped DEFLATE codec.
///
/// Compresses at level 9 by default: assets are packed once and loaded many
/// times, so encode speed is not worth trading for size. The zlib wrapper's
/// adler32 trailer is the only integrity check the container carries.
///
/// Both directions work on a single pre-sized buffer, the same way zlib's
/// `compress2` / `uncompress` do, so a declared length that is wrong in
/// either direction surfaces as an error instead of a resized result.
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    /// Compression level (0 = store, 9 = smallest).
    pub level: u32,
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self {
            level: Compression::best().level(),
        }
    }
}

impl ZlibCodec {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

/// Zeroed buffer of exactly `len` bytes, or `OutOfMemory`.
fn zeroed(len: usize, input_len: usize) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| {
        CodecError::new(NAME, CodecFault::OutOfMemory).lengths(len as u64, 0, input_len as u64)
    })?;
    buf.resize(len, 0);
    Ok(buf)
}

impl Codec for ZlibCodec {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compress_bound(&self, raw_len: usize) -> Result<usize, CodecError> {
        if raw_len == 0 {
            return Err(CodecError::new(NAME, CodecFault::EmptyInput));
        }
        raw_len
            .checked_add(raw_len >> 12)
            .and_then(|n| n.checked_add(raw_len >> 14))
            .and_then(|n| n.checked_add(raw_len >> 25))
            .and_then(|n| n.checked_add(13))
            .ok_or_else(|| {
                CodecError::new(NAME, CodecFault::OutOfMemory)
                    .lengths(u64::MAX, 0, raw_len as u64)
                    .detail("compression bound overflows usize")
            })
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        let bound = self.compress_bound(raw.len())?;
        let mut out = zeroed(bound, raw.len())?;

        let mut z = Compress::new(Compression::new(self.level), true);
        let status = z
            .compress(raw, &mut out, FlushCompress::Finish)
            .map_err(|e| {
                CodecError::new(NAME, CodecFault::CorruptData)
                    .lengths(bound as u64, z.total_out(), raw.len() as u64)
                    .detail(e.to_string())
            })?;
        if status != Status::StreamEnd {
            return Err(CodecError::new(NAME, CodecFault::BufferTooSmall).lengths(
                bound as u64,
                z.total_out(),
                raw.len() as u64,
            ));
        }

        out.truncate(z.total_out() as usize);
        log::trace!("zlib: compressed {} -> {} bytes at level {}", raw.len(), out.len(), self.level);
        Ok(out)
    }

    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        // A header declaring zero bytes with nothing after it is a valid,
        // empty payload even though no zlib stream is present.
        if expected_len == 0 && compressed.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = zeroed(expected_len, compressed.len())?;
        let mut z = Decompress::new(true);
        let fail = |fault: CodecFault, produced: u64| {
            CodecError::new(NAME, fault).lengths(expected_len as u64, produced, compressed.len() as u64)
        };

        let status = z
            .decompress(compressed, &mut out, FlushDecompress::Finish)
            .map_err(|e| fail(CodecFault::CorruptData, z.total_out()).detail(e.to_string()))?;
        let produced = z.total_out();

        match status {
            Status::StreamEnd if produced == expected_len as u64 => Ok(out),
            Status::StreamEnd => Err(fail(CodecFault::LengthMismatch, produced)
                .detail("stream ended before the declared length")),
            _ if produced >= expected_len as u64 => Err(fail(CodecFault::BufferTooSmall, produced)
                .detail("stream continues past the declared length")),
            _ => Err(fail(CodecFault::CorruptData, produced).detail("stream is truncated")),
        }
    }
}
