//! Prefix-routed composite filesystem.

use std::collections::{BTreeMap, BTreeSet};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

use super::ops::{File, Fs};
use super::path;
use super::types::{DEFAULT_DIR_PERM, FileInfo, OpenFlags};
use super::{FsError, FsResult};

/// Routes each path to the filesystem mounted at its longest matching prefix.
///
/// A path under prefix `p` reaches the mounted filesystem with `p` stripped,
/// so with `data` mounted, `data/logs/a.txt` becomes `logs/a.txt` there. An
/// empty prefix mounts a filesystem at the root and catches every path no
/// longer prefix claims.
///
/// Paths that no mount covers but that lead to a mount point (such as the
/// root, or `mnt` when only `mnt/project` is mounted) behave as read-only
/// directories listing the next component of each mount below them.
/// Anything else is not found.
///
/// Handles keep the caller's path as their name, so wrappers that derive
/// child paths from a handle (like a policy layer) see full paths.
///
/// Renames must stay within one mounted filesystem.
#[derive(Clone, Debug, Default)]
pub struct MappedFs {
    mounts: BTreeMap<String, Arc<dyn Fs>>,
}

impl MappedFs {
    /// Create a filesystem with no mounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(prefix, filesystem)` pairs.
    pub fn from_mounts<I, S>(mounts: I) -> FsResult<Self>
    where
        I: IntoIterator<Item = (S, Arc<dyn Fs>)>,
        S: AsRef<str>,
    {
        let mut mapped = Self::new();
        for (prefix, fs) in mounts {
            mapped.mount(prefix.as_ref(), fs)?;
        }
        Ok(mapped)
    }

    /// Mount `fs` at `prefix`, replacing any filesystem already there.
    pub fn mount(&mut self, prefix: &str, fs: Arc<dyn Fs>) -> FsResult<()> {
        let key = path::normalize(prefix)?;
        if let Some(previous) = self.mounts.insert(key.clone(), fs) {
            tracing::debug!(prefix = %key, previous = %previous.name(), "replaced mount");
        }
        Ok(())
    }

    /// Builder form of [`MappedFs::mount`].
    pub fn with_mount(mut self, prefix: &str, fs: Arc<dyn Fs>) -> FsResult<Self> {
        self.mount(prefix, fs)?;
        Ok(self)
    }

    /// Remove the mount at `prefix`, returning it if there was one.
    pub fn unmount(&mut self, prefix: &str) -> Option<Arc<dyn Fs>> {
        let key = path::normalize(prefix).ok()?;
        self.mounts.remove(&key)
    }

    /// Normalized mount prefixes, in sorted order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.mounts.keys().map(String::as_str)
    }

    /// Find the mount for a normalized key and the path relative to it.
    fn route(&self, key: &str) -> Option<(&Arc<dyn Fs>, String)> {
        self.mounts
            .iter()
            .filter_map(|(prefix, fs)| {
                let rest = if prefix.is_empty() {
                    key
                } else if key == prefix {
                    ""
                } else {
                    key.strip_prefix(prefix.as_str())?.strip_prefix('/')?
                };
                Some((prefix.len(), fs, rest))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, fs, rest)| (fs, rest.to_string()))
    }

    fn resolve(&self, name: &str) -> FsResult<(&Arc<dyn Fs>, String)> {
        let key = path::normalize(name)?;
        self.route(&key).ok_or_else(|| FsError::not_found(name))
    }

    /// Entries of the synthetic directory at `key`, if mounts lie below it.
    fn virtual_entries(&self, key: &str) -> Option<Vec<FileInfo>> {
        let names: BTreeSet<&str> = self
            .mounts
            .keys()
            .filter_map(|prefix| {
                let rest = if key.is_empty() {
                    prefix.as_str()
                } else {
                    prefix.strip_prefix(key)?.strip_prefix('/')?
                };
                rest.split('/').next().filter(|first| !first.is_empty())
            })
            .collect();
        if names.is_empty() {
            return None;
        }
        Some(
            names
                .into_iter()
                .map(|name| FileInfo::directory(name, DEFAULT_DIR_PERM))
                .collect(),
        )
    }

    fn open_with(
        &self,
        name: &str,
        open: impl FnOnce(&Arc<dyn Fs>, &str) -> FsResult<Box<dyn File>>,
        mutating: bool,
    ) -> FsResult<Box<dyn File>> {
        let key = path::normalize(name)?;
        if let Some((fs, rest)) = self.route(&key) {
            let inner = open(fs, &rest)?;
            return Ok(Box::new(MappedFile {
                name: name.to_string(),
                inner,
            }));
        }
        let entries = self
            .virtual_entries(&key)
            .ok_or_else(|| FsError::not_found(name))?;
        if mutating {
            return Err(FsError::is_a_directory(name));
        }
        Ok(Box::new(MountDir {
            name: name.to_string(),
            info: FileInfo::directory(path::base_name(&key), DEFAULT_DIR_PERM),
            entries,
            cursor: 0,
        }))
    }
}

impl Fs for MappedFs {
    fn name(&self) -> String {
        "Mapped".to_string()
    }

    fn open(&self, name: &str) -> FsResult<Box<dyn File>> {
        self.open_with(name, |fs, rest| fs.open(rest), false)
    }

    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        self.open_with(
            name,
            |fs, rest| fs.open_file(rest, flags, perm),
            flags.is_mutating(),
        )
    }

    fn create(&self, name: &str) -> FsResult<Box<dyn File>> {
        self.open_with(name, |fs, rest| fs.create(rest), true)
    }

    fn stat(&self, name: &str) -> FsResult<FileInfo> {
        let key = path::normalize(name)?;
        if let Some((fs, rest)) = self.route(&key) {
            return fs.stat(&rest);
        }
        match self.virtual_entries(&key) {
            Some(_) => Ok(FileInfo::directory(path::base_name(&key), DEFAULT_DIR_PERM)),
            None => Err(FsError::not_found(name)),
        }
    }

    fn chmod(&self, name: &str, mode: u32) -> FsResult<()> {
        let (fs, rest) = self.resolve(name)?;
        fs.chmod(&rest, mode)
    }

    fn chown(&self, name: &str, uid: u32, gid: u32) -> FsResult<()> {
        let (fs, rest) = self.resolve(name)?;
        fs.chown(&rest, uid, gid)
    }

    fn set_times(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let (fs, rest) = self.resolve(name)?;
        fs.set_times(&rest, atime, mtime)
    }

    fn remove(&self, name: &str) -> FsResult<()> {
        let (fs, rest) = self.resolve(name)?;
        fs.remove(&rest)
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        let (fs, rest) = self.resolve(path)?;
        fs.remove_all(&rest)
    }

    fn rename(&self, old_name: &str, new_name: &str) -> FsResult<()> {
        let (from, old_rest) = self.resolve(old_name)?;
        let (to, new_rest) = self.resolve(new_name)?;
        if !Arc::ptr_eq(from, to) {
            return Err(FsError::unsupported(format!(
                "rename across mounts: {} -> {}",
                old_name, new_name
            )));
        }
        from.rename(&old_rest, &new_rest)
    }

    fn mkdir(&self, name: &str, perm: u32) -> FsResult<()> {
        let key = path::normalize(name)?;
        match self.route(&key) {
            Some((fs, rest)) => fs.mkdir(&rest, perm),
            None if self.virtual_entries(&key).is_some() => Err(FsError::already_exists(name)),
            None => Err(FsError::not_found(name)),
        }
    }

    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()> {
        let key = path::normalize(path)?;
        match self.route(&key) {
            Some((fs, rest)) => fs.mkdir_all(&rest, perm),
            None if self.virtual_entries(&key).is_some() => Ok(()),
            None => Err(FsError::not_found(path)),
        }
    }
}

/// A handle from a mounted filesystem, renamed to the caller's path.
#[derive(Debug)]
struct MappedFile {
    name: String,
    inner: Box<dyn File>,
}

impl File for MappedFile {
    fn name(&self) -> &str {
        &self.name
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

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.inner.write(buf)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> FsResult<usize> {
        self.inner.write_at(buf, offset)
    }

    fn write_str(&mut self, s: &str) -> FsResult<usize> {
        self.inner.write_str(s)
    }

    fn truncate(&mut self, size: u64) -> FsResult<()> {
        self.inner.truncate(size)
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

/// Synthetic directory leading to mount points.
#[derive(Debug)]
struct MountDir {
    name: String,
    info: FileInfo,
    entries: Vec<FileInfo>,
    cursor: usize,
}

impl File for MountDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, _buf: &mut [u8]) -> FsResult<usize> {
        Err(FsError::is_a_directory(&self.name))
    }

    fn read_at(&mut self, _buf: &mut [u8], _offset: u64) -> FsResult<usize> {
        Err(FsError::is_a_directory(&self.name))
    }

    fn seek(&mut self, _pos: SeekFrom) -> FsResult<u64> {
        Err(FsError::is_a_directory(&self.name))
    }

    fn write(&mut self, _buf: &[u8]) -> FsResult<usize> {
        Err(FsError::is_a_directory(&self.name))
    }

    fn write_at(&mut self, _buf: &[u8], _offset: u64) -> FsResult<usize> {
        Err(FsError::is_a_directory(&self.name))
    }

    fn truncate(&mut self, _size: u64) -> FsResult<()> {
        Err(FsError::is_a_directory(&self.name))
    }

    fn sync(&mut self) -> FsResult<()> {
        Ok(())
    }

    fn stat(&self) -> FsResult<FileInfo> {
        Ok(self.info.clone())
    }

    fn read_dir(&mut self, count: Option<usize>) -> FsResult<Vec<FileInfo>> {
        let remaining = &self.entries[self.cursor.min(self.entries.len())..];
        let n = count.map_or(remaining.len(), |count| count.min(remaining.len()));
        let page = remaining[..n].to_vec();
        self.cursor += n;
        Ok(page)
    }

    fn read_dir_names(&mut self, count: Option<usize>) -> FsResult<Vec<String>> {
        Ok(self.read_dir(count)?.into_iter().map(|info| info.name).collect())
    }

    fn close(self: Box<Self>) -> FsResult<()> {
        Ok(())
    }
}
