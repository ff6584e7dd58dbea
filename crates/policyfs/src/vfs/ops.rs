//! Filesystem capability traits.
//!
//! [`Fs`] is the contract every backing filesystem satisfies and that the
//! policy layer satisfies in turn, so layers stack. [`File`] is the contract
//! for the handles it hands out.

use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

use super::types::{DEFAULT_FILE_PERM, FileInfo, OpenFlags};
use super::{FsError, FsResult};

/// Core filesystem operations trait.
///
/// All operations are synchronous and path-based. Implementations decide how
/// paths are interpreted (the in-memory backend treats them as `/`-separated
/// keys, the OS backend resolves them under a root directory).
pub trait Fs: Send + Sync + fmt::Debug {
    /// Human-readable name of this filesystem.
    fn name(&self) -> String;

    /// Open a file or directory for reading.
    fn open(&self, name: &str) -> FsResult<Box<dyn File>>;

    /// Open a file with explicit flags and permission bits (used on create).
    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>>;

    /// Create or truncate a file, opened for reading and writing.
    fn create(&self, name: &str) -> FsResult<Box<dyn File>>;

    /// Get file attributes.
    fn stat(&self, name: &str) -> FsResult<FileInfo>;

    /// Change permission bits.
    fn chmod(&self, name: &str, mode: u32) -> FsResult<()>;

    /// Change owner and group.
    fn chown(&self, name: &str, uid: u32, gid: u32) -> FsResult<()>;

    /// Change access and modification times.
    fn set_times(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()>;

    /// Remove a file or an empty directory.
    fn remove(&self, name: &str) -> FsResult<()>;

    /// Remove a path and everything below it. Missing paths are not an error.
    fn remove_all(&self, path: &str) -> FsResult<()>;

    /// Rename a file or directory.
    fn rename(&self, old_name: &str, new_name: &str) -> FsResult<()>;

    /// Create a single directory. The parent must exist.
    fn mkdir(&self, name: &str, perm: u32) -> FsResult<()>;

    /// Create a directory and any missing parents.
    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Returns true if `name` exists and is a directory.
    fn is_dir(&self, name: &str) -> FsResult<bool> {
        Ok(self.stat(name)?.is_dir())
    }

    /// Check if a path exists.
    fn exists(&self, name: &str) -> bool {
        self.stat(name).is_ok()
    }

    /// Read entire file contents.
    fn read_to_vec(&self, name: &str) -> FsResult<Vec<u8>> {
        let mut file = self.open(name)?;
        let out = file.read_to_end()?;
        file.close()?;
        Ok(out)
    }

    /// Write entire file contents, creating or truncating the file.
    fn write_all(&self, name: &str, data: &[u8]) -> FsResult<()> {
        let mut file = self.open_file(name, OpenFlags::create_truncate(), DEFAULT_FILE_PERM)?;
        let mut written = 0;
        while written < data.len() {
            let n = file.write(&data[written..])?;
            if n == 0 {
                return Err(FsError::other(format!("short write to {}", name)));
            }
            written += n;
        }
        file.close()
    }
}

/// An open file or directory handle.
pub trait File: Send + fmt::Debug {
    /// The name the handle was opened with.
    fn name(&self) -> &str;

    /// Read from the current position. Returns 0 at end of file.
    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize>;

    /// Read from the current position to end of file.
    fn read_to_end(&mut self) -> FsResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Read at an absolute offset without moving the cursor.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize>;

    /// Move the cursor.
    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64>;

    /// Write at the current position (or the end, in append mode).
    fn write(&mut self, buf: &[u8]) -> FsResult<usize>;

    /// Write at an absolute offset without moving the cursor.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> FsResult<usize>;

    /// Write a string at the current position.
    fn write_str(&mut self, s: &str) -> FsResult<usize> {
        self.write(s.as_bytes())
    }

    /// Truncate or extend the file to `size` bytes.
    fn truncate(&mut self, size: u64) -> FsResult<()>;

    /// Flush buffered state to the backing store.
    fn sync(&mut self) -> FsResult<()>;

    /// Attributes of the open file.
    fn stat(&self) -> FsResult<FileInfo>;

    /// List directory entries.
    ///
    /// `None` returns all remaining entries; `Some(n)` returns at most `n`,
    /// continuing where the previous call stopped. An exhausted listing
    /// returns an empty vector.
    fn read_dir(&mut self, count: Option<usize>) -> FsResult<Vec<FileInfo>>;

    /// List directory entry names, with the same cursor rules as `read_dir`.
    fn read_dir_names(&mut self, count: Option<usize>) -> FsResult<Vec<String>>;

    /// Close the handle.
    fn close(self: Box<Self>) -> FsResult<()>;
}

impl<T: Fs + ?Sized> Fs for Arc<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn open(&self, name: &str) -> FsResult<Box<dyn File>> {
        (**self).open(name)
    }

    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        (**self).open_file(name, flags, perm)
    }

    fn create(&self, name: &str) -> FsResult<Box<dyn File>> {
        (**self).create(name)
    }

    fn stat(&self, name: &str) -> FsResult<FileInfo> {
        (**self).stat(name)
    }

    fn chmod(&self, name: &str, mode: u32) -> FsResult<()> {
        (**self).chmod(name, mode)
    }

    fn chown(&self, name: &str, uid: u32, gid: u32) -> FsResult<()> {
        (**self).chown(name, uid, gid)
    }

    fn set_times(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        (**self).set_times(name, atime, mtime)
    }

    fn remove(&self, name: &str) -> FsResult<()> {
        (**self).remove(name)
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        (**self).remove_all(path)
    }

    fn rename(&self, old_name: &str, new_name: &str) -> FsResult<()> {
        (**self).rename(old_name, new_name)
    }

    fn mkdir(&self, name: &str, perm: u32) -> FsResult<()> {
        (**self).mkdir(name, perm)
    }

    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()> {
        (**self).mkdir_all(path, perm)
    }
}
