use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ContainerError, Result};

/// Structured little-endian reads over a fully materialised payload.
///
/// The container never inspects payload structure itself; it hands the
/// decompressed (or raw) bytes to a `BinReader` and the asset loaders take it
/// from there.
///
/// # Access pattern
/// Sequential reads advance an internal cursor. [`read_range`] is random
/// access and leaves the cursor alone.
///
/// [`read_range`]: BinReader::read_range
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinReader {
    data: Vec<u8>,
    pos: usize,
}

impl BinReader {
    /// Wrap an owned buffer. No copy is made.
    pub fn open_from_memory(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Read a raw file whole. An empty file yields an empty reader.
    pub fn open_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|source| ContainerError::CannotOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let expected = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|e| {
            log::debug!("read error on {}: {e}", path.display());
            ContainerError::ShortRead {
                path: path.to_path_buf(),
                expected,
                actual: data.len() as u64,
            }
        })?;
        Ok(Self::open_from_memory(data))
    }

    /// Total payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Give the payload back, dropping the cursor.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Move the cursor to `pos`. Seeking to the very end is allowed.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(self.out_of_bounds(pos, 0));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&[u8]> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_array().map(i16::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Copy `len` bytes starting at `start`, clamped to the end of the
    /// payload. A `start` past the end is an error; an empty range is not.
    pub fn read_range(&self, start: usize, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        if start >= self.data.len() {
            return Err(self.out_of_bounds(start, len));
        }
        let end = start.saturating_add(len).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.out_of_bounds(self.pos, n))?;
        let start = self.pos;
        self.pos = end;
        Ok(&self.data[start..end])
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> ContainerError {
        ContainerError::OutOfBounds {
            offset: offset as u64,
            len: len as u64,
            size: self.data.len() as u64,
        }
    }
}
