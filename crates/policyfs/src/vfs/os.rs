//! Host filesystem backend.
//!
//! Provides access to real filesystem paths under a root directory.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::ops::{File, Fs};
use super::path;
use super::types::{FileInfo, OpenFlags};
use super::{FsError, FsResult};

/// Host filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then `open("src/main.rs")` opens
/// `/home/amy/project/src/main.rs`.
///
/// Lexical escapes via `..` are rejected. Symlinks inside the root are
/// followed as the host would follow them.
#[derive(Debug, Clone)]
pub struct OsFs {
    root: PathBuf,
}

impl OsFs {
    /// Create a filesystem rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> FsResult<PathBuf> {
        let key = path::normalize(name)?;
        if key.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(key))
        }
    }
}

fn info_from_metadata(name: &str, meta: &fs::Metadata) -> FileInfo {
    FileInfo {
        name: name.to_string(),
        size: if meta.is_dir() { 0 } else { meta.len() },
        mode: mode_of(meta),
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        is_dir: meta.is_dir(),
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() { 0o444 } else { 0o644 }
}

impl Fs for OsFs {
    fn name(&self) -> String {
        "OsFs".to_string()
    }

    fn open(&self, name: &str) -> FsResult<Box<dyn File>> {
        self.open_file(name, OpenFlags::read(), 0)
    }

    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        let full = self.resolve(name)?;
        let meta = fs::metadata(&full);
        if let Ok(meta) = &meta
            && meta.is_dir()
        {
            if flags.is_mutating() {
                return Err(FsError::is_a_directory(name));
            }
            return Ok(Box::new(OsFile {
                name: name.to_string(),
                path: full,
                file: None,
                dir_cursor: 0,
            }));
        }

        let mut options = fs::OpenOptions::new();
        options
            .read(flags.read || !flags.is_mutating())
            .write(flags.write)
            .append(flags.append)
            .truncate(flags.truncate && flags.write)
            .create(flags.create && !flags.exclusive)
            .create_new(flags.create && flags.exclusive);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            if perm != 0 {
                options.mode(perm);
            }
        }
        #[cfg(not(unix))]
        let _ = perm;

        let file = options
            .open(&full)
            .map_err(|e| FsError::from_io(e, name))?;
        Ok(Box::new(OsFile {
            name: name.to_string(),
            path: full,
            file: Some(file),
            dir_cursor: 0,
        }))
    }

    fn create(&self, name: &str) -> FsResult<Box<dyn File>> {
        self.open_file(name, OpenFlags::create_truncate(), 0o666)
    }

    fn stat(&self, name: &str) -> FsResult<FileInfo> {
        let full = self.resolve(name)?;
        let meta = fs::metadata(&full).map_err(|e| FsError::from_io(e, name))?;
        let base = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path::base_name("").to_string());
        Ok(info_from_metadata(&base, &meta))
    }

    #[cfg(unix)]
    fn chmod(&self, name: &str, mode: u32) -> FsResult<()> {
        use std::os::unix::fs::PermissionsExt;
        let full = self.resolve(name)?;
        fs::set_permissions(&full, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| FsError::from_io(e, name))
    }

    #[cfg(not(unix))]
    fn chmod(&self, name: &str, mode: u32) -> FsResult<()> {
        let full = self.resolve(name)?;
        let mut perms = fs::metadata(&full)
            .map_err(|e| FsError::from_io(e, name))?
            .permissions();
        perms.set_readonly(mode & 0o222 == 0);
        fs::set_permissions(&full, perms).map_err(|e| FsError::from_io(e, name))
    }

    #[cfg(unix)]
    fn chown(&self, name: &str, uid: u32, gid: u32) -> FsResult<()> {
        let full = self.resolve(name)?;
        std::os::unix::fs::chown(&full, Some(uid), Some(gid))
            .map_err(|e| FsError::from_io(e, name))
    }

    #[cfg(not(unix))]
    fn chown(&self, _name: &str, _uid: u32, _gid: u32) -> FsResult<()> {
        Err(FsError::unsupported("chown"))
    }

    fn set_times(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let full = self.resolve(name)?;
        let file = fs::File::options()
            .write(true)
            .open(&full)
            .or_else(|_| fs::File::open(&full))
            .map_err(|e| FsError::from_io(e, name))?;
        let times = fs::FileTimes::new().set_accessed(atime).set_modified(mtime);
        file.set_times(times).map_err(|e| FsError::from_io(e, name))
    }

    fn remove(&self, name: &str) -> FsResult<()> {
        let full = self.resolve(name)?;
        let meta = fs::symlink_metadata(&full).map_err(|e| FsError::from_io(e, name))?;
        let result = if meta.is_dir() {
            fs::remove_dir(&full)
        } else {
            fs::remove_file(&full)
        };
        result.map_err(|e| FsError::from_io(e, name))
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        let full = self.resolve(path)?;
        let meta = match fs::symlink_metadata(&full) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(FsError::from_io(e, path)),
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(&full)
        } else {
            fs::remove_file(&full)
        };
        result.map_err(|e| FsError::from_io(e, path))
    }

    fn rename(&self, old_name: &str, new_name: &str) -> FsResult<()> {
        let from = self.resolve(old_name)?;
        let to = self.resolve(new_name)?;
        fs::rename(&from, &to).map_err(|e| FsError::from_io(e, old_name))
    }

    fn mkdir(&self, name: &str, perm: u32) -> FsResult<()> {
        let full = self.resolve(name)?;
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(perm);
        }
        #[cfg(not(unix))]
        let _ = perm;
        builder.create(&full).map_err(|e| FsError::from_io(e, name))
    }

    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()> {
        let full = self.resolve(path)?;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(perm);
        }
        #[cfg(not(unix))]
        let _ = perm;
        builder.create(&full).map_err(|e| FsError::from_io(e, path))
    }
}

/// An open handle from an [`OsFs`].
///
/// Directories have no host file handle; listings read the directory
/// afresh on every call.
#[derive(Debug)]
pub struct OsFile {
    name: String,
    path: PathBuf,
    file: Option<fs::File>,
    dir_cursor: usize,
}

impl OsFile {
    fn file(&mut self) -> FsResult<&mut fs::File> {
        self.file
            .as_mut()
            .ok_or_else(|| FsError::is_a_directory(&self.name))
    }

    fn io<T>(&self, result: std::io::Result<T>) -> FsResult<T> {
        result.map_err(|e| FsError::from_io(e, &self.name))
    }

    fn entries(&mut self, count: Option<usize>) -> FsResult<Vec<FileInfo>> {
        if self.file.is_some() {
            return Err(FsError::not_a_directory(&self.name));
        }
        let read_dir = fs::read_dir(&self.path).map_err(|e| FsError::from_io(e, &self.name))?;
        let mut all = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| FsError::from_io(e, &self.name))?;
            let meta = entry
                .metadata()
                .map_err(|e| FsError::from_io(e, &self.name))?;
            all.push(info_from_metadata(
                &entry.file_name().to_string_lossy(),
                &meta,
            ));
        }
        all.sort_by(|a, b| a.name.cmp(&b.name));

        let out: Vec<FileInfo> = all
            .into_iter()
            .skip(self.dir_cursor)
            .take(count.unwrap_or(usize::MAX))
            .collect();
        self.dir_cursor += out.len();
        Ok(out)
    }
}

impl File for OsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let result = self.file()?.read(buf);
        self.io(result)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        let file = self.file()?;
        let result = (|| -> std::io::Result<usize> {
            let saved = file.stream_position()?;
            file.seek(SeekFrom::Start(offset))?;
            let n = file.read(buf)?;
            file.seek(SeekFrom::Start(saved))?;
            Ok(n)
        })();
        self.io(result)
    }

    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        let result = self.file()?.seek(pos);
        self.io(result)
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        let result = self.file()?.write(buf);
        self.io(result)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> FsResult<usize> {
        let file = self.file()?;
        let result = (|| -> std::io::Result<usize> {
            let saved = file.stream_position()?;
            file.seek(SeekFrom::Start(offset))?;
            let n = file.write(buf)?;
            file.seek(SeekFrom::Start(saved))?;
            Ok(n)
        })();
        self.io(result)
    }

    fn truncate(&mut self, size: u64) -> FsResult<()> {
        let result = self.file()?.set_len(size);
        self.io(result)
    }

    fn sync(&mut self) -> FsResult<()> {
        match self.file.as_mut() {
            Some(file) => {
                let result = file.sync_all();
                self.io(result)
            }
            None => Ok(()),
        }
    }

    fn stat(&self) -> FsResult<FileInfo> {
        let meta = match &self.file {
            Some(file) => file.metadata(),
            None => fs::metadata(&self.path),
        };
        let meta = self.io(meta)?;
        Ok(info_from_metadata(path::base_name(&self.name), &meta))
    }

    fn read_dir(&mut self, count: Option<usize>) -> FsResult<Vec<FileInfo>> {
        self.entries(count)
    }

    fn read_dir_names(&mut self, count: Option<usize>) -> FsResult<Vec<String>> {
        Ok(self.entries(count)?.into_iter().map(|info| info.name).collect())
    }

    fn close(self: Box<Self>) -> FsResult<()> {
        Ok(())
    }
}
