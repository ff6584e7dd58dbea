//! Core VFS value types.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Default permission bits for newly created files.
pub const DEFAULT_FILE_PERM: u32 = 0o644;

/// Default permission bits for newly created directories.
pub const DEFAULT_DIR_PERM: u32 = 0o755;

/// File/directory metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Base name of the entry (not the full path)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Unix permission bits (e.g. 0o644)
    pub mode: u32,
    /// Last modification time
    pub modified: SystemTime,
    /// Whether this is a directory
    pub is_dir: bool,
}

impl FileInfo {
    /// Metadata for a regular file.
    pub fn file(name: impl Into<String>, size: u64, mode: u32) -> Self {
        Self {
            name: name.into(),
            size,
            mode,
            modified: SystemTime::now(),
            is_dir: false,
        }
    }

    /// Metadata for a directory.
    pub fn directory(name: impl Into<String>, mode: u32) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mode,
            modified: SystemTime::now(),
            is_dir: true,
        }
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// Open file flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Append mode.
    pub append: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Exclusive create (fail if exists).
    pub exclusive: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Write access (also enables read).
    pub fn write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Append to the end of the file.
    pub fn append() -> Self {
        Self {
            read: true,
            write: true,
            append: true,
            ..Default::default()
        }
    }

    /// Create with write access.
    pub fn create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            ..Default::default()
        }
    }

    /// Create exclusively (fail if exists).
    pub fn create_exclusive() -> Self {
        Self {
            create: true,
            exclusive: true,
            ..Self::create()
        }
    }

    /// Create and truncate.
    pub fn create_truncate() -> Self {
        Self {
            truncate: true,
            ..Self::create()
        }
    }

    /// Returns true if these flags can modify the file.
    pub fn is_mutating(&self) -> bool {
        self.write || self.append || self.create || self.truncate
    }
}
