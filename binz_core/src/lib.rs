pub mod backend;
pub mod codec;
pub mod container;
pub mod error;
pub mod format;
pub mod reader;
pub mod vfs;

pub use backend::{is_virtual_path, Backend};
pub use codec::Codec;
pub use container::{CompressOutcome, Container, ContainerOptions, Inspection, LoadedPayload, PayloadKind};
pub use error::{CodecDiagnostics, CodecError, CodecFault, ContainerError, Result};
pub use format::{ContainerHeader, HEADER_SIZE, MAGIC};
pub use reader::BinReader;
pub use vfs::{MemoryVfs, MountedVfs, VirtualFs, MODFS_SCHEME};
