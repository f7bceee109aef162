use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Why a codec refused a buffer.
///
/// Each kind maps onto the zlib return code a C caller would have seen, so
/// logs stay comparable with assets produced by other tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFault {
    /// `compress_bound` was asked about a zero-length input.
    EmptyInput,
    /// The output buffer filled before the stream ended.
    BufferTooSmall,
    /// The compressed stream is malformed or ends early.
    CorruptData,
    /// The stream ended cleanly but produced a different number of bytes
    /// than the header declared.
    LengthMismatch,
    /// The output buffer could not be allocated.
    OutOfMemory,
}

impl CodecFault {
    /// zlib-style return code (`Z_BUF_ERROR`, `Z_DATA_ERROR`, ...).
    pub fn code(self) -> i32 {
        match self {
            CodecFault::EmptyInput => -2,
            CodecFault::CorruptData | CodecFault::LengthMismatch => -3,
            CodecFault::OutOfMemory => -4,
            CodecFault::BufferTooSmall => -5,
        }
    }
}

impl fmt::Display for CodecFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CodecFault::EmptyInput => "empty input",
            CodecFault::BufferTooSmall => "output buffer too small",
            CodecFault::CorruptData => "corrupt or truncated stream",
            CodecFault::LengthMismatch => "length mismatch",
            CodecFault::OutOfMemory => "out of memory",
        };
        f.write_str(s)
    }
}

/// Failure reported by a [`crate::Codec`].
#[derive(Debug, Clone, Error)]
#[error("{codec}: {fault} (rc {rc}, expected {expected} bytes, got {actual}, input {input_len} bytes){}", detail_suffix(.detail))]
pub struct CodecError {
    pub codec: &'static str,
    pub fault: CodecFault,
    pub rc: i32,
    /// Bytes the caller asked for (decompress) or the bound (compress).
    pub expected: u64,
    /// Bytes actually produced before the codec stopped.
    pub actual: u64,
    pub input_len: u64,
    pub detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {d}"),
        None => String::new(),
    }
}

impl CodecError {
    pub fn new(codec: &'static str, fault: CodecFault) -> Self {
        Self {
            codec,
            fault,
            rc: fault.code(),
            expected: 0,
            actual: 0,
            input_len: 0,
            detail: None,
        }
    }

    pub fn lengths(mut self, expected: u64, actual: u64, input_len: u64) -> Self {
        self.expected = expected;
        self.actual = actual;
        self.input_len = input_len;
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// The four numbers printed when a decompression fails.
///
/// Captured before the compressed length is reduced by the header so the log
/// line and the error agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecDiagnostics {
    pub rc: i32,
    pub uncompressed_len: u64,
    pub compressed_len: u64,
    pub header_len: u64,
}

impl fmt::Display for CodecDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rc: {}, length uncompressed: {}, length compressed: {}, length header: {}",
            self.rc, self.uncompressed_len, self.compressed_len, self.header_len
        )
    }
}

/// Errors produced by the container orchestrator, its storage backends and
/// the binary reader.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("cannot open {path:?}: {source}")]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot retrieve length of {path:?}: {source}")]
    Seek {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Zero-length input, or too short to hold a container header.
    #[error("{path:?} is empty or truncated ({len} bytes)")]
    EmptyFile { path: PathBuf, len: u64 },

    #[error("cannot allocate {len} bytes for {path:?}")]
    AllocationFailure { path: PathBuf, len: u64 },

    #[error("short read on {path:?}: expected {expected} bytes, got {actual}")]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("short write on {path:?} while writing {what}")]
    ShortWrite { path: PathBuf, what: &'static str },

    #[error("cannot write {what} to {path:?}: {source}")]
    WriteFailure {
        path: PathBuf,
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot process {path:?} ({diag}): {source}")]
    CodecFailure {
        path: PathBuf,
        diag: CodecDiagnostics,
        #[source]
        source: CodecError,
    },

    /// A length does not fit the representation used downstream.
    #[error("{path:?} is too large: {len} bytes exceeds the limit of {limit}")]
    SizeOverflow { path: PathBuf, len: u64, limit: u64 },

    #[error("{path:?} lives on the virtual filesystem and cannot be rewritten")]
    ReadOnly { path: PathBuf },

    #[error("read beyond end of payload: offset {offset}, len {len}, size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },
}
