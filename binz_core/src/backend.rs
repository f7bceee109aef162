//! Storage backends: the conventional filesystem and a [`VirtualFs`].
//!
//! The orchestrator asks [`Backend::select`] once per operation which source
//! owns a path, then uses the whole-file helpers below. Every helper fails
//! with a distinct [`ContainerError`] variant so the caller can report the
//! exact step that went wrong.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{ContainerError, Result};
use crate::vfs::VirtualFs;

/// Which file source serves a path. Chosen once, before any I/O.
#[derive(Clone, Copy)]
pub enum Backend<'a> {
    Conventional,
    Virtual(&'a dyn VirtualFs),
}

impl<'a> Backend<'a> {
    /// Pick the backend for `path`. Without a virtual filesystem, or for
    /// paths that are not valid UTF-8, the conventional one is used.
    pub fn select(path: &Path, vfs: Option<&'a dyn VirtualFs>) -> Self {
        match (vfs, path.to_str()) {
            (Some(vfs), Some(p)) if vfs.is_virtual(p) => Backend::Virtual(vfs),
            _ => Backend::Conventional,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Backend::Virtual(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Conventional => "conventional",
            Backend::Virtual(_) => "virtual",
        }
    }

    /// Read the whole file behind `path` into a fresh buffer.
    ///
    /// `max_len` only applies to the virtual backend, whose loader reports
    /// lengths that must fit the 32-bit sizes used downstream.
    pub fn read_whole_file(&self, path: &Path, max_len: u64) -> Result<Vec<u8>> {
        match self {
            Backend::Conventional => read_whole_file(path),
            Backend::Virtual(vfs) => read_whole_resource(*vfs, path, max_len),
        }
    }
}

impl std::fmt::Debug for Backend<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shorthand for `Backend::select(path, vfs).is_virtual()`.
pub fn is_virtual_path(path: &Path, vfs: Option<&dyn VirtualFs>) -> bool {
    Backend::select(path, vfs).is_virtual()
}

// ── Conventional primitives ─────────────────────────────────────────────────

pub(crate) fn open_read(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| ContainerError::CannotOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Length of `file`, found by seeking to its end. Leaves the cursor there.
pub(crate) fn seek_len(file: &mut File, path: &Path) -> Result<u64> {
    file.seek(SeekFrom::End(0))
        .map_err(|source| ContainerError::Seek {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn seek_to(file: &mut File, path: &Path, pos: u64) -> Result<()> {
    file.seek(SeekFrom::Start(pos))
        .map(|_| ())
        .map_err(|source| ContainerError::Seek {
            path: path.to_path_buf(),
            source,
        })
}

/// Empty buffer with room for exactly `len` bytes.
///
/// Allocation failure is reported instead of aborting the process.
pub(crate) fn alloc_buffer(path: &Path, len: u64) -> Result<Vec<u8>> {
    let size = usize::try_from(len).map_err(|_| ContainerError::SizeOverflow {
        path: path.to_path_buf(),
        len,
        limit: usize::MAX as u64,
    })?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| ContainerError::AllocationFailure {
            path: path.to_path_buf(),
            len,
        })?;
    Ok(buf)
}

/// Append up to `len` bytes from `file` to `buf`; anything less is a
/// [`ContainerError::ShortRead`].
pub(crate) fn read_exact_into(file: &mut File, path: &Path, buf: &mut Vec<u8>, len: u64) -> Result<()> {
    let start = buf.len();
    let read = file.take(len).read_to_end(buf);
    let actual = (buf.len() - start) as u64;
    match read {
        Ok(_) if actual == len => Ok(()),
        Ok(_) => Err(ContainerError::ShortRead {
            path: path.to_path_buf(),
            expected: len,
            actual,
        }),
        Err(e) => {
            log::debug!("read error on {}: {e}", path.display());
            Err(ContainerError::ShortRead {
                path: path.to_path_buf(),
                expected: len,
                actual,
            })
        }
    }
}

/// Fill as much of `out` as the file allows and return the count.
pub(crate) fn read_prefix(file: &mut File, out: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < out.len() {
        match file.read(&mut out[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read a conventional file whole: open, seek to the end for its length,
/// reject empty files, allocate, rewind, read, close.
pub fn read_whole_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = open_read(path)?;
    let len = seek_len(&mut file, path)?;
    if len == 0 {
        return Err(ContainerError::EmptyFile {
            path: path.to_path_buf(),
            len,
        });
    }
    let mut buf = alloc_buffer(path, len)?;
    seek_to(&mut file, path, 0)?;
    read_exact_into(&mut file, path, &mut buf, len)?;
    Ok(buf)
}

/// Load a resource through `vfs` and enforce the size limit.
pub fn read_whole_resource(vfs: &dyn VirtualFs, path: &Path, max_len: u64) -> Result<Vec<u8>> {
    let uri = path.to_string_lossy();
    let buf = vfs
        .load_resource(&uri)
        .map_err(|source| ContainerError::CannotOpen {
            path: path.to_path_buf(),
            source,
        })?;
    let len = buf.len() as u64;
    if len > max_len {
        drop(buf);
        return Err(ContainerError::SizeOverflow {
            path: path.to_path_buf(),
            len,
            limit: max_len,
        });
    }
    Ok(buf)
}

/// Create or truncate `path` and write `header` followed by `payload`.
pub fn write_whole_file(path: &Path, header: &[u8], payload: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|source| ContainerError::CannotOpen {
        path: path.to_path_buf(),
        source,
    })?;
    write_part(&mut file, path, header, "header")?;
    write_part(&mut file, path, payload, "compressed data")?;
    file.flush().map_err(|source| ContainerError::WriteFailure {
        path: path.to_path_buf(),
        what: "compressed data",
        source,
    })
}

fn write_part(file: &mut impl Write, path: &Path, bytes: &[u8], what: &'static str) -> Result<()> {
    file.write_all(bytes).map_err(|source| {
        if source.kind() == io::ErrorKind::WriteZero {
            ContainerError::ShortWrite {
                path: path.to_path_buf(),
                what,
            }
        } else {
            ContainerError::WriteFailure {
                path: path.to_path_buf(),
                what,
                source,
            }
        }
    })
}
