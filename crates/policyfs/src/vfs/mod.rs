//! Virtual filesystem contract and backends.
//!
//! This module provides:
//! - [`Fs`] / [`File`] - The capability contract every backend satisfies
//! - [`MemoryFs`] - In-memory filesystem (scratch space, testing)
//! - [`OsFs`] - Host filesystem access under a root directory
//! - [`ReadOnlyFs`] - Wrapper rejecting all mutating verbs
//! - [`MappedFs`] - Routes path prefixes to mounted filesystems
//! - [`copy`] - Copies one filesystem's tree into another

mod copy;
mod error;
mod mapped;
mod memory;
mod ops;
mod os;
pub mod path;
mod read_only;
mod types;

pub use copy::copy;
pub use error::{FsError, FsResult};
pub use mapped::MappedFs;
pub use memory::{MemoryFile, MemoryFs};
pub use ops::{File, Fs};
pub use os::{OsFile, OsFs};
pub use read_only::{ReadOnlyFile, ReadOnlyFs};
pub use types::{DEFAULT_DIR_PERM, DEFAULT_FILE_PERM, FileInfo, OpenFlags};
