//! Read-only filesystem wrapper.

use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

use super::ops::{File, Fs};
use super::types::{FileInfo, OpenFlags};
use super::{FsError, FsResult};

/// Wraps a filesystem and rejects every mutating verb with
/// [`FsError::ReadOnly`].
///
/// Handles opened through the wrapper reject writes as well, even when the
/// inner filesystem would hand out a writable handle.
#[derive(Debug)]
pub struct ReadOnlyFs<F: Fs + ?Sized> {
    inner: Arc<F>,
}

impl<F: Fs + ?Sized> Clone for ReadOnlyFs<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Fs + ?Sized> ReadOnlyFs<F> {
    /// Wrap `inner`.
    pub fn new(inner: Arc<F>) -> Self {
        Self { inner }
    }

    /// Get a reference to the inner filesystem.
    pub fn inner(&self) -> &Arc<F> {
        &self.inner
    }
}

impl<F: Fs + ?Sized + 'static> Fs for ReadOnlyFs<F> {
    fn name(&self) -> String {
        format!("ReadOnly: {}", self.inner.name())
    }

    fn open(&self, name: &str) -> FsResult<Box<dyn File>> {
        let file = self.inner.open(name)?;
        Ok(Box::new(ReadOnlyFile { inner: file }))
    }

    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        if flags.is_mutating() {
            return Err(FsError::ReadOnly);
        }
        let file = self.inner.open_file(name, flags, perm)?;
        Ok(Box::new(ReadOnlyFile { inner: file }))
    }

    fn create(&self, _name: &str) -> FsResult<Box<dyn File>> {
        Err(FsError::ReadOnly)
    }

    fn stat(&self, name: &str) -> FsResult<FileInfo> {
        self.inner.stat(name)
    }

    fn chmod(&self, _name: &str, _mode: u32) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn chown(&self, _name: &str, _uid: u32, _gid: u32) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn set_times(&self, _name: &str, _atime: SystemTime, _mtime: SystemTime) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn remove(&self, _name: &str) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn remove_all(&self, _path: &str) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn rename(&self, _old_name: &str, _new_name: &str) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn mkdir(&self, _name: &str, _perm: u32) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn mkdir_all(&self, _path: &str, _perm: u32) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }
}

/// A handle that only allows reading.
#[derive(Debug)]
pub struct ReadOnlyFile {
    inner: Box<dyn File>,
}

impl File for ReadOnlyFile {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.inner.read(buf)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        self.inner.read_at(buf, offset)
    }

    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        self.inner.seek(pos)
    }

    fn write(&mut self, _buf: &[u8]) -> FsResult<usize> {
        Err(FsError::ReadOnly)
    }

    fn write_at(&mut self, _buf: &[u8], _offset: u64) -> FsResult<usize> {
        Err(FsError::ReadOnly)
    }

    fn write_str(&mut self, _s: &str) -> FsResult<usize> {
        Err(FsError::ReadOnly)
    }

    fn truncate(&mut self, _size: u64) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn sync(&mut self) -> FsResult<()> {
        self.inner.sync()
    }

    fn stat(&self) -> FsResult<FileInfo> {
        self.inner.stat()
    }

    fn read_dir(&mut self, count: Option<usize>) -> FsResult<Vec<FileInfo>> {
        self.inner.read_dir(count)
    }

    fn read_dir_names(&mut self, count: Option<usize>) -> FsResult<Vec<String>> {
        self.inner.read_dir_names(count)
    }

    fn close(self: Box<Self>) -> FsResult<()> {
        self.inner.close()
    }
}
