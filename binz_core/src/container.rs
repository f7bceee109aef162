use std::fs::File;
use std::mem;
use std::path::Path;

use crate::backend::{self, Backend};
use crate::codec::Codec;
use crate::error::{CodecDiagnostics, CodecError, CodecFault, ContainerError, Result};
use crate::format::{magic_matches, ContainerHeader, HEADER_SIZE, MAGIC_SIZE, MAX_DEFLATE_RATIO};
use crate::reader::BinReader;
use crate::vfs::VirtualFs;

/// Limits applied while loading containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Largest resource the virtual backend may return. Defaults to
    /// `u32::MAX`, the size type the virtual loader reports in.
    pub max_resource_len: u64,
    /// Largest accepted `uncompressed_size / compressed_len` ratio before
    /// any buffer is allocated for a header's claimed size.
    pub max_expansion_ratio: u64,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            max_resource_len: u32::MAX as u64,
            max_expansion_ratio: MAX_DEFLATE_RATIO,
        }
    }
}

impl ContainerOptions {
    pub fn max_resource_len(mut self, len: u64) -> Self {
        self.max_resource_len = len;
        self
    }

    pub fn max_expansion_ratio(mut self, ratio: u64) -> Self {
        self.max_expansion_ratio = ratio;
        self
    }
}

/// Result of a successful [`Container::compress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    /// The file was rewritten as header + compressed payload.
    Written { uncompressed_len: u64, compressed_len: u64 },
    /// Compression did not make the payload strictly smaller; the file was
    /// left untouched.
    Skipped { uncompressed_len: u64, compressed_len: u64 },
}

impl CompressOutcome {
    pub fn was_written(&self) -> bool {
        matches!(self, CompressOutcome::Written { .. })
    }

    pub fn uncompressed_len(&self) -> u64 {
        match *self {
            CompressOutcome::Written { uncompressed_len, .. }
            | CompressOutcome::Skipped { uncompressed_len, .. } => uncompressed_len,
        }
    }

    /// Size of the file on disk after the call.
    pub fn stored_len(&self) -> u64 {
        match *self {
            CompressOutcome::Written { compressed_len, .. } => ContainerHeader::stored_len(compressed_len),
            CompressOutcome::Skipped { uncompressed_len, .. } => uncompressed_len,
        }
    }
}

/// Whether a loaded payload came out of a container or was stored raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Raw,
    Unwrapped,
}

/// Payload returned by [`Container::decompress`].
#[derive(Debug)]
pub struct LoadedPayload {
    pub kind: PayloadKind,
    pub reader: BinReader,
}

impl LoadedPayload {
    fn raw(reader: BinReader) -> Self {
        Self {
            kind: PayloadKind::Raw,
            reader,
        }
    }

    fn unwrapped(data: Vec<u8>) -> Self {
        Self {
            kind: PayloadKind::Unwrapped,
            reader: BinReader::open_from_memory(data),
        }
    }

    pub fn was_wrapped(&self) -> bool {
        self.kind == PayloadKind::Unwrapped
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.reader.into_inner()
    }
}

/// Header summary returned by [`Container::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspection {
    /// `None` for raw files.
    pub header: Option<ContainerHeader>,
    /// Bytes the file occupies in its backend.
    pub stored_len: u64,
}

/// Buffers and handle owned by one operation.
///
/// Lives on the caller's stack; `release` runs on every exit path through
/// `Drop` and may be called any number of times.
#[derive(Default)]
struct OpState {
    file: Option<File>,
    uncompressed: Vec<u8>,
    compressed: Vec<u8>,
}

impl OpState {
    fn close(&mut self) {
        self.file = None;
    }

    fn release(&mut self) {
        if self.file.is_some() || self.uncompressed.capacity() > 0 || self.compressed.capacity() > 0 {
            log::trace!(
                "releasing op state (file open: {}, buffers: {} + {} bytes)",
                self.file.is_some(),
                self.uncompressed.capacity(),
                self.compressed.capacity()
            );
        }
        self.close();
        self.uncompressed = Vec::new();
        self.compressed = Vec::new();
    }
}

impl Drop for OpState {
    fn drop(&mut self) {
        self.release();
    }
}

/// Read up to `out.len()` header bytes; an I/O error becomes a `ShortRead`
/// with nothing read.
fn read_header_field(file: &mut File, path: &Path, out: &mut [u8], what: &str) -> Result<usize> {
    let expected = out.len() as u64;
    backend::read_prefix(file, out).map_err(|e| {
        log::debug!("file {path:?}: cannot read {what}: {e}");
        ContainerError::ShortRead {
            path: path.to_path_buf(),
            expected,
            actual: 0,
        }
    })
}

/// Reads, writes, and probes compressed asset containers.
///
/// # Operations
/// - [`is_compressed`]: best-effort probe of the magic bytes.
/// - [`compress`]: in-place compression of a conventional file, skipped when
///   it would not shrink the file.
/// - [`decompress`]: load a payload from either backend, unwrapping it when
///   the magic matches and passing it through untouched otherwise.
///
/// No state survives between calls. Callers must not run two operations on
/// the same path at once: `compress` truncates and rewrites in place.
///
/// [`is_compressed`]: Container::is_compressed
/// [`compress`]: Container::compress
/// [`decompress`]: Container::decompress
pub struct Container {
    codec: Box<dyn Codec>,
    vfs: Option<Box<dyn VirtualFs>>,
    options: ContainerOptions,
}

impl Container {
    pub fn new(codec: Box<dyn Codec>) -> Self {
        Self {
            codec,
            vfs: None,
            options: ContainerOptions::default(),
        }
    }

    /// Route paths claimed by `vfs` through the virtual backend.
    pub fn with_vfs(mut self, vfs: Box<dyn VirtualFs>) -> Self {
        self.vfs = Some(vfs);
        self
    }

    pub fn with_options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    pub fn backend_for(&self, path: &Path) -> Backend<'_> {
        Backend::select(path, self.vfs.as_deref())
    }

    /// True when the conventional file at `path` starts with the container
    /// magic. Any failure to open or read eight bytes yields `false`.
    pub fn is_compressed(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut state = OpState::default();
        let file = match backend::open_read(path) {
            Ok(file) => state.file.insert(file),
            Err(e) => {
                log::debug!("is_compressed: {e}");
                return false;
            }
        };
        let mut magic = [0u8; MAGIC_SIZE];
        match backend::read_prefix(file, &mut magic) {
            Ok(n) if n == MAGIC_SIZE => magic_matches(&magic),
            Ok(n) => {
                log::debug!("is_compressed: file {path:?}: cannot read magic ({n} bytes)");
                false
            }
            Err(e) => {
                log::debug!("is_compressed: file {path:?}: cannot read magic: {e}");
                false
            }
        }
    }

    /// Compress the conventional file at `path` in place.
    ///
    /// Returns [`CompressOutcome::Skipped`] without touching the file when the
    /// compressed form is not strictly smaller than the original.
    pub fn compress(&self, path: impl AsRef<Path>) -> Result<CompressOutcome> {
        let path = path.as_ref();
        log::info!("Compressing file {path:?}...");
        let result = self.compress_inner(path);
        match &result {
            Ok(CompressOutcome::Written {
                uncompressed_len,
                compressed_len,
            }) => log::info!(
                "Compressing file {path:?}: done ({uncompressed_len} -> {} bytes)",
                ContainerHeader::stored_len(*compressed_len)
            ),
            Ok(CompressOutcome::Skipped {
                uncompressed_len,
                compressed_len,
            }) => log::info!(
                "Compressing file {path:?}: compressed data ({compressed_len} bytes) is not smaller than \
                 uncompressed ({uncompressed_len} bytes); skipping compression"
            ),
            Err(e) => log::error!("compress: file {path:?}: {e}"),
        }
        result
    }

    fn compress_inner(&self, path: &Path) -> Result<CompressOutcome> {
        if self.backend_for(path).is_virtual() {
            return Err(ContainerError::ReadOnly {
                path: path.to_path_buf(),
            });
        }

        let mut state = OpState::default();
        state.uncompressed = backend::read_whole_file(path)?;
        let uncompressed_len = state.uncompressed.len() as u64;

        let bound = self
            .codec
            .compress_bound(state.uncompressed.len())
            .map_err(|e| self.compress_failure(path, uncompressed_len, e))?;
        state.compressed = self
            .codec
            .compress(&state.uncompressed)
            .map_err(|e| self.compress_failure(path, uncompressed_len, e))?;
        let compressed_len = state.compressed.len() as u64;
        log::debug!(
            "compress: file {path:?}: {uncompressed_len} -> {compressed_len} bytes (bound {bound})"
        );

        if compressed_len >= uncompressed_len {
            return Ok(CompressOutcome::Skipped {
                uncompressed_len,
                compressed_len,
            });
        }

        let header = ContainerHeader::new(uncompressed_len).to_bytes();
        backend::write_whole_file(path, &header, &state.compressed)?;
        state.release();

        Ok(CompressOutcome::Written {
            uncompressed_len,
            compressed_len,
        })
    }

    /// Load the payload at `path` from whichever backend owns it.
    pub fn decompress(&self, path: impl AsRef<Path>) -> Result<LoadedPayload> {
        let path = path.as_ref();
        let backend = self.backend_for(path);
        log::debug!("decompress: file {path:?} via {} backend", backend.name());
        let result = match backend {
            Backend::Conventional => self.decompress_file(path),
            Backend::Virtual(_) => self.decompress_resource(backend, path),
        };
        match &result {
            Ok(payload) if payload.was_wrapped() => {
                log::info!("Decompressing file {path:?}: done ({} bytes)", payload.reader.len())
            }
            Ok(_) => {}
            // Codec failures already logged their diagnostics.
            Err(e) if matches!(e, ContainerError::CodecFailure { .. }) => log::debug!("decompress: file {path:?}: {e}"),
            Err(e) => log::error!("decompress: file {path:?}: {e}"),
        }
        result
    }

    fn decompress_file(&self, path: &Path) -> Result<LoadedPayload> {
        let mut state = OpState::default();
        let file = state.file.insert(backend::open_read(path)?);

        let mut magic = [0u8; MAGIC_SIZE];
        let got = read_header_field(file, path, &mut magic, "magic")?;
        if got < MAGIC_SIZE {
            return Err(ContainerError::ShortRead {
                path: path.to_path_buf(),
                expected: MAGIC_SIZE as u64,
                actual: got as u64,
            });
        }
        if !magic_matches(&magic) {
            state.release();
            log::debug!("decompress: file {path:?} is raw, passing through");
            return BinReader::open_from_path(path).map(LoadedPayload::raw);
        }
        log::info!("Decompressing file {path:?}...");

        let mut size = [0u8; 8];
        let got = read_header_field(file, path, &mut size, "uncompressed size")?;
        if got < size.len() {
            return Err(ContainerError::EmptyFile {
                path: path.to_path_buf(),
                len: (MAGIC_SIZE + got) as u64,
            });
        }
        let header = ContainerHeader::new(u64::from_le_bytes(size));

        let total = backend::seek_len(file, path)?;
        if total < HEADER_SIZE as u64 {
            return Err(ContainerError::EmptyFile {
                path: path.to_path_buf(),
                len: total,
            });
        }
        let compressed_len = total - HEADER_SIZE as u64;
        state.compressed = backend::alloc_buffer(path, compressed_len)?;
        backend::seek_to(file, path, HEADER_SIZE as u64)?;
        backend::read_exact_into(file, path, &mut state.compressed, compressed_len)?;
        state.close();

        state.uncompressed = self.unpack(path, &header, &state.compressed)?;
        Ok(LoadedPayload::unwrapped(mem::take(&mut state.uncompressed)))
    }

    fn decompress_resource(&self, backend: Backend<'_>, path: &Path) -> Result<LoadedPayload> {
        let mut state = OpState::default();
        state.compressed = backend.read_whole_file(path, self.options.max_resource_len)?;

        let len = state.compressed.len() as u64;
        if len < HEADER_SIZE as u64 {
            return Err(ContainerError::EmptyFile {
                path: path.to_path_buf(),
                len,
            });
        }

        let Some(header) = ContainerHeader::from_bytes(&state.compressed) else {
            log::debug!("decompress: resource {path:?} is raw, passing through");
            let data = mem::take(&mut state.compressed);
            return Ok(LoadedPayload::raw(BinReader::open_from_memory(data)));
        };
        log::info!("Decompressing file {path:?}...");

        state.uncompressed = self.unpack(path, &header, &state.compressed[HEADER_SIZE..])?;
        Ok(LoadedPayload::unwrapped(mem::take(&mut state.uncompressed)))
    }

    /// Decompress the region after the header into a buffer of exactly the
    /// declared size.
    fn unpack(&self, path: &Path, header: &ContainerHeader, compressed: &[u8]) -> Result<Vec<u8>> {
        let diag = CodecDiagnostics {
            rc: 0,
            uncompressed_len: header.uncompressed_size,
            compressed_len: compressed.len() as u64,
            header_len: HEADER_SIZE as u64,
        };

        let expected = usize::try_from(header.uncompressed_size).map_err(|_| ContainerError::SizeOverflow {
            path: path.to_path_buf(),
            len: header.uncompressed_size,
            limit: usize::MAX as u64,
        })?;

        let plausible = diag.compressed_len.saturating_mul(self.options.max_expansion_ratio);
        if header.uncompressed_size > plausible {
            let err = CodecError::new(self.codec.name(), CodecFault::CorruptData)
                .lengths(header.uncompressed_size, 0, diag.compressed_len)
                .detail("declared size exceeds the maximum expansion ratio");
            return Err(self.decompress_failure(path, diag, err));
        }

        match self.codec.decompress(compressed, expected) {
            Ok(out) => {
                log::debug!("decompress: file {path:?}: {diag}");
                Ok(out)
            }
            Err(e) if e.fault == CodecFault::OutOfMemory => Err(ContainerError::AllocationFailure {
                path: path.to_path_buf(),
                len: header.uncompressed_size,
            }),
            Err(e) => Err(self.decompress_failure(path, diag, e)),
        }
    }

    fn decompress_failure(&self, path: &Path, diag: CodecDiagnostics, source: CodecError) -> ContainerError {
        let diag = CodecDiagnostics { rc: source.rc, ..diag };
        log::error!("decompress: file {path:?}: cannot uncompress data: {diag}");
        ContainerError::CodecFailure {
            path: path.to_path_buf(),
            diag,
            source,
        }
    }

    fn compress_failure(&self, path: &Path, uncompressed_len: u64, source: CodecError) -> ContainerError {
        if source.fault == CodecFault::OutOfMemory {
            return ContainerError::AllocationFailure {
                path: path.to_path_buf(),
                len: source.expected,
            };
        }
        ContainerError::CodecFailure {
            path: path.to_path_buf(),
            diag: CodecDiagnostics {
                rc: source.rc,
                uncompressed_len,
                compressed_len: source.actual,
                header_len: HEADER_SIZE as u64,
            },
            source,
        }
    }

    /// Read just enough of `path` to report its header, if any.
    pub fn inspect(&self, path: impl AsRef<Path>) -> Result<Inspection> {
        let path = path.as_ref();
        match self.backend_for(path) {
            Backend::Conventional => {
                let mut state = OpState::default();
                let file = state.file.insert(backend::open_read(path)?);
                let mut prefix = [0u8; HEADER_SIZE];
                let got = read_header_field(file, path, &mut prefix, "header")?;
                let stored_len = backend::seek_len(file, path)?;
                Ok(Inspection {
                    header: ContainerHeader::from_bytes(&prefix[..got]),
                    stored_len,
                })
            }
            backend => {
                let data = backend.read_whole_file(path, self.options.max_resource_len)?;
                Ok(Inspection {
                    header: ContainerHeader::from_bytes(&data),
                    stored_len: data.len() as u64,
                })
            }
        }
    }
}
