//! Virtual filesystem collaborators.
//!
//! Assets shipped inside mods are addressed with `modfs://` URIs. Those never
//! go through `std::fs` directly: a [`VirtualFs`] decides which paths it owns
//! and hands back the whole resource as one owned buffer.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// URI scheme claimed by the bundled virtual filesystems.
pub const MODFS_SCHEME: &str = "modfs://";

/// A file source that returns whole resources instead of streamed reads.
pub trait VirtualFs: Send + Sync {
    /// Whether `path` should be resolved through this filesystem.
    fn is_virtual(&self, path: &str) -> bool;

    /// Load the entire resource at `uri`. The caller owns the buffer.
    fn load_resource(&self, uri: &str) -> io::Result<Vec<u8>>;
}

fn strip_scheme(uri: &str) -> io::Result<&str> {
    uri.strip_prefix(MODFS_SCHEME).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{uri:?} is not a {MODFS_SCHEME} uri"),
        )
    })
}

/// Serves `modfs://` URIs from a directory on disk, such as an unpacked mod
/// or a mounted content volume.
#[derive(Debug, Clone)]
pub struct MountedVfs {
    root: PathBuf,
}

impl MountedVfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a `modfs://` URI to a path under the mount root.
    ///
    /// Absolute paths and `..` components are refused so a resource name
    /// cannot escape the mount.
    pub fn resolve(&self, uri: &str) -> io::Result<PathBuf> {
        let rel = Path::new(strip_scheme(uri)?);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{uri:?} escapes the mount root"),
            ));
        }
        Ok(self.root.join(rel))
    }
}

impl VirtualFs for MountedVfs {
    fn is_virtual(&self, path: &str) -> bool {
        path.starts_with(MODFS_SCHEME)
    }

    fn load_resource(&self, uri: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(uri)?;
        log::debug!("modfs: loading {uri} from {}", path.display());
        std::fs::read(path)
    }
}

/// `modfs://` resources held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryVfs {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryVfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` under `name`, addressed as `modfs://{name}`.
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl VirtualFs for MemoryVfs {
    fn is_virtual(&self, path: &str) -> bool {
        path.starts_with(MODFS_SCHEME)
    }

    fn load_resource(&self, uri: &str) -> io::Result<Vec<u8>> {
        let name = strip_scheme(uri)?;
        self.files.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no resource {uri:?}"))
        })
    }
}
