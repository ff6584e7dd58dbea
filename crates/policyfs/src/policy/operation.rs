//! Typed description of filesystem operations.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::vfs::OpenFlags;

/// A single filesystem request, as seen by a policy.
///
/// Every variant names exactly one canonical path, returned by
/// [`Operation::path`]. Policies that care about the verb match on the
/// variant; policies that only care about the path call `path()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Changing permission bits
    Chmod {
        /// Target path
        name: String,
        /// Requested mode
        mode: u32,
    },
    /// Changing owner and group
    Chown {
        /// Target path
        name: String,
        /// Requested user ID
        uid: u32,
        /// Requested group ID
        gid: u32,
    },
    /// Changing access and modification times
    SetTimes {
        /// Target path
        name: String,
        /// Requested access time
        atime: SystemTime,
        /// Requested modification time
        mtime: SystemTime,
    },
    /// Creating (or truncating) a file
    Create {
        /// Target path
        name: String,
    },
    /// Creating a directory
    Mkdir {
        /// Target path
        name: String,
        /// Requested permission bits
        perm: u32,
    },
    /// Creating a directory and its parents
    MkdirAll {
        /// Target path
        path: String,
        /// Requested permission bits
        perm: u32,
    },
    /// Opening for reading
    Open {
        /// Target path
        name: String,
    },
    /// Opening with explicit flags
    OpenFile {
        /// Target path
        name: String,
        /// Requested open flags
        flags: OpenFlags,
        /// Permission bits used if the file is created
        perm: u32,
    },
    /// Removing a file or empty directory
    Remove {
        /// Target path
        name: String,
    },
    /// Removing a path recursively
    RemoveAll {
        /// Target path
        path: String,
    },
    /// Renaming or moving; the canonical path is the source
    Rename {
        /// Source path
        old_name: String,
        /// Destination path
        new_name: String,
    },
    /// Getting metadata
    Stat {
        /// Target path
        name: String,
    },
    /// Listing directory entries
    ListDir {
        /// Directory path
        name: String,
        /// Maximum number of entries (None = all)
        count: Option<usize>,
    },
    /// Listing directory entry names
    ListDirNames {
        /// Directory path
        name: String,
        /// Maximum number of entries (None = all)
        count: Option<usize>,
    },
}

impl Operation {
    /// The single path this operation principally concerns.
    pub fn path(&self) -> &str {
        match self {
            Operation::Chmod { name, .. }
            | Operation::Chown { name, .. }
            | Operation::SetTimes { name, .. }
            | Operation::Create { name }
            | Operation::Mkdir { name, .. }
            | Operation::Open { name }
            | Operation::OpenFile { name, .. }
            | Operation::Remove { name }
            | Operation::Stat { name }
            | Operation::ListDir { name, .. }
            | Operation::ListDirNames { name, .. } => name,
            Operation::MkdirAll { path, .. } | Operation::RemoveAll { path } => path,
            Operation::Rename { old_name, .. } => old_name,
        }
    }

    /// The verb tag of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Chmod { .. } => OperationKind::Chmod,
            Operation::Chown { .. } => OperationKind::Chown,
            Operation::SetTimes { .. } => OperationKind::SetTimes,
            Operation::Create { .. } => OperationKind::Create,
            Operation::Mkdir { .. } => OperationKind::Mkdir,
            Operation::MkdirAll { .. } => OperationKind::MkdirAll,
            Operation::Open { .. } => OperationKind::Open,
            Operation::OpenFile { .. } => OperationKind::OpenFile,
            Operation::Remove { .. } => OperationKind::Remove,
            Operation::RemoveAll { .. } => OperationKind::RemoveAll,
            Operation::Rename { .. } => OperationKind::Rename,
            Operation::Stat { .. } => OperationKind::Stat,
            Operation::ListDir { .. } => OperationKind::ListDir,
            Operation::ListDirNames { .. } => OperationKind::ListDirNames,
        }
    }

    /// Returns true if this operation cannot modify the filesystem.
    ///
    /// `OpenFile` is classified by its flags.
    pub fn is_read_only(&self) -> bool {
        match self {
            Operation::OpenFile { flags, .. } => !flags.is_mutating(),
            other => other.kind().is_read_only(),
        }
    }
}

/// The verb of an [`Operation`], without its arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// See [`Operation::Chmod`]
    Chmod,
    /// See [`Operation::Chown`]
    Chown,
    /// See [`Operation::SetTimes`]
    SetTimes,
    /// See [`Operation::Create`]
    Create,
    /// See [`Operation::Mkdir`]
    Mkdir,
    /// See [`Operation::MkdirAll`]
    MkdirAll,
    /// See [`Operation::Open`]
    Open,
    /// See [`Operation::OpenFile`]
    OpenFile,
    /// See [`Operation::Remove`]
    Remove,
    /// See [`Operation::RemoveAll`]
    RemoveAll,
    /// See [`Operation::Rename`]
    Rename,
    /// See [`Operation::Stat`]
    Stat,
    /// See [`Operation::ListDir`]
    ListDir,
    /// See [`Operation::ListDirNames`]
    ListDirNames,
}

impl OperationKind {
    /// Kinds that only read.
    pub const READ: &'static [OperationKind] = &[
        OperationKind::Open,
        OperationKind::OpenFile,
        OperationKind::Stat,
        OperationKind::ListDir,
        OperationKind::ListDirNames,
    ];

    /// Kinds that create, modify, or remove.
    pub const WRITE: &'static [OperationKind] = &[
        OperationKind::Chmod,
        OperationKind::Chown,
        OperationKind::SetTimes,
        OperationKind::Create,
        OperationKind::Mkdir,
        OperationKind::MkdirAll,
        OperationKind::OpenFile,
        OperationKind::Remove,
        OperationKind::RemoveAll,
        OperationKind::Rename,
    ];

    /// Returns true if operations of this kind never modify the filesystem.
    ///
    /// `OpenFile` is not: its flags may request writes.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            OperationKind::Open
                | OperationKind::Stat
                | OperationKind::ListDir
                | OperationKind::ListDirNames
        )
    }

    /// Returns true if this is a write operation.
    pub fn is_write(&self) -> bool {
        !self.is_read_only()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_path_accessor() {
        let ops = [
            Operation::Chmod {
                name: "a".into(),
                mode: 0o644,
            },
            Operation::Create { name: "a".into() },
            Operation::MkdirAll {
                path: "a".into(),
                perm: 0o755,
            },
            Operation::RemoveAll { path: "a".into() },
            Operation::Rename {
                old_name: "a".into(),
                new_name: "b".into(),
            },
            Operation::ListDirNames {
                name: "a".into(),
                count: None,
            },
        ];
        for op in &ops {
            assert_eq!(op.path(), "a", "{:?}", op);
        }
    }

    #[test]
    fn test_kind_and_read_only() {
        let stat = Operation::Stat { name: "x".into() };
        assert_eq!(stat.kind(), OperationKind::Stat);
        assert!(stat.is_read_only());

        let remove = Operation::Remove { name: "x".into() };
        assert!(!remove.is_read_only());
        assert!(remove.kind().is_write());

        let open_read = Operation::OpenFile {
            name: "x".into(),
            flags: OpenFlags::read(),
            perm: 0,
        };
        assert!(open_read.is_read_only());
        assert!(!open_read.kind().is_read_only());

        let open_write = Operation::OpenFile {
            name: "x".into(),
            flags: OpenFlags::create(),
            perm: 0o644,
        };
        assert!(!open_write.is_read_only());
    }

    #[test]
    fn test_serializes_with_tag() {
        let op = Operation::Rename {
            old_name: "a.txt".into(),
            new_name: "b.txt".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "rename");
        assert_eq!(json["old_name"], "a.txt");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
