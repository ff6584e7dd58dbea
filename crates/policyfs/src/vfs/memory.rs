//! In-memory filesystem backend.
//!
//! Useful as scratch storage and as the backing store in tests. Paths are
//! `/`-separated and normalized with [`path::normalize`], so `"/a.txt"`,
//! `"a.txt"` and `"./a.txt"` all name the same entry.

use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use super::ops::{File, Fs};
use super::path;
use super::types::{DEFAULT_DIR_PERM, DEFAULT_FILE_PERM, FileInfo, OpenFlags};
use super::{FsError, FsResult};

#[derive(Debug)]
struct Node {
    is_dir: bool,
    mode: u32,
    uid: u32,
    gid: u32,
    accessed: SystemTime,
    modified: SystemTime,
    data: Vec<u8>,
}

impl Node {
    fn file(mode: u32) -> Self {
        Self::new(false, mode)
    }

    fn directory(mode: u32) -> Self {
        Self::new(true, mode)
    }

    fn new(is_dir: bool, mode: u32) -> Self {
        let now = SystemTime::now();
        Self {
            is_dir,
            mode: mode & 0o7777,
            uid: 0,
            gid: 0,
            accessed: now,
            modified: now,
            data: Vec::new(),
        }
    }

    fn info(&self, path: &str) -> FileInfo {
        FileInfo {
            name: path::base_name(path).to_string(),
            size: if self.is_dir { 0 } else { self.data.len() as u64 },
            mode: self.mode,
            modified: self.modified,
            is_dir: self.is_dir,
        }
    }
}

type NodeRef = Arc<RwLock<Node>>;
type Tree = BTreeMap<String, NodeRef>;

fn poisoned() -> FsError {
    FsError::other("memory filesystem lock poisoned")
}

fn read_node(node: &NodeRef) -> FsResult<RwLockReadGuard<'_, Node>> {
    node.read().map_err(|_| poisoned())
}

fn write_node(node: &NodeRef) -> FsResult<RwLockWriteGuard<'_, Node>> {
    node.write().map_err(|_| poisoned())
}

/// Normalized paths of the direct children of `dir`, in name order.
fn children<'a>(tree: &'a Tree, dir: &str) -> impl Iterator<Item = (&'a String, &'a NodeRef)> + use<'a> {
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    };
    let start = prefix.clone();
    tree.range(start..)
        .take_while({
            let prefix = prefix.clone();
            move |(key, _)| key.starts_with(&prefix)
        })
        .filter(move |(key, _)| {
            let rest = &key[prefix.len()..];
            !rest.is_empty() && !rest.contains('/')
        })
}

/// An in-memory filesystem.
///
/// Cloning is cheap and yields a handle to the same tree.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    tree: Arc<RwLock<Tree>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem containing only the root directory.
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.insert(
            String::new(),
            Arc::new(RwLock::new(Node::directory(DEFAULT_DIR_PERM))),
        );
        Self {
            tree: Arc::new(RwLock::new(tree)),
        }
    }

    fn read_tree(&self) -> FsResult<RwLockReadGuard<'_, Tree>> {
        self.tree.read().map_err(|_| poisoned())
    }

    fn write_tree(&self) -> FsResult<RwLockWriteGuard<'_, Tree>> {
        self.tree.write().map_err(|_| poisoned())
    }

    fn lookup(&self, name: &str) -> FsResult<(String, NodeRef)> {
        let key = path::normalize(name)?;
        let tree = self.read_tree()?;
        let node = tree
            .get(&key)
            .cloned()
            .ok_or_else(|| FsError::not_found(name))?;
        Ok((key, node))
    }

    /// Ensure the parent of `key` exists and is a directory.
    fn check_parent(tree: &Tree, key: &str, name: &str) -> FsResult<()> {
        match tree.get(path::parent(key)) {
            Some(parent) if read_node(parent)?.is_dir => Ok(()),
            Some(_) => Err(FsError::not_a_directory(name)),
            None => Err(FsError::not_found(name)),
        }
    }

    fn handle(&self, name: &str, key: String, node: NodeRef, flags: OpenFlags) -> MemoryFile {
        MemoryFile {
            name: name.to_string(),
            key,
            node,
            tree: Arc::clone(&self.tree),
            pos: 0,
            readable: flags.read || !flags.write,
            writable: flags.write || flags.append,
            append: flags.append,
            dir_cursor: 0,
        }
    }

    fn update<T>(&self, name: &str, f: impl FnOnce(&mut Node) -> T) -> FsResult<T> {
        let (_, node) = self.lookup(name)?;
        let mut node = write_node(&node)?;
        Ok(f(&mut node))
    }
}

impl Fs for MemoryFs {
    fn name(&self) -> String {
        "MemoryFs".to_string()
    }

    fn open(&self, name: &str) -> FsResult<Box<dyn File>> {
        let (key, node) = self.lookup(name)?;
        Ok(Box::new(self.handle(name, key, node, OpenFlags::read())))
    }

    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        let key = path::normalize(name)?;
        let mut tree = self.write_tree()?;

        let node = match tree.get(&key).cloned() {
            Some(node) => {
                if flags.create && flags.exclusive {
                    return Err(FsError::already_exists(name));
                }
                {
                    let mut guard = write_node(&node)?;
                    if guard.is_dir && (flags.write || flags.append) {
                        return Err(FsError::is_a_directory(name));
                    }
                    if flags.truncate && flags.write {
                        guard.data.clear();
                        guard.modified = SystemTime::now();
                    }
                }
                node
            }
            None => {
                if !flags.create {
                    return Err(FsError::not_found(name));
                }
                Self::check_parent(&tree, &key, name)?;
                let node = Arc::new(RwLock::new(Node::file(perm)));
                tree.insert(key.clone(), Arc::clone(&node));
                node
            }
        };
        drop(tree);

        Ok(Box::new(self.handle(name, key, node, flags)))
    }

    fn create(&self, name: &str) -> FsResult<Box<dyn File>> {
        self.open_file(name, OpenFlags::create_truncate(), DEFAULT_FILE_PERM)
    }

    fn stat(&self, name: &str) -> FsResult<FileInfo> {
        let (key, node) = self.lookup(name)?;
        let node = read_node(&node)?;
        Ok(node.info(&key))
    }

    fn chmod(&self, name: &str, mode: u32) -> FsResult<()> {
        self.update(name, |node| node.mode = mode & 0o7777)
    }

    fn chown(&self, name: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.update(name, |node| {
            node.uid = uid;
            node.gid = gid;
        })
    }

    fn set_times(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.update(name, |node| {
            node.accessed = atime;
            node.modified = mtime;
        })
    }

    fn remove(&self, name: &str) -> FsResult<()> {
        let key = path::normalize(name)?;
        if key.is_empty() {
            return Err(FsError::InvalidPath(name.to_string()));
        }
        let mut tree = self.write_tree()?;
        let node = tree.get(&key).ok_or_else(|| FsError::not_found(name))?;
        if read_node(node)?.is_dir && children(&tree, &key).next().is_some() {
            return Err(FsError::DirectoryNotEmpty(name.to_string()));
        }
        tree.remove(&key);
        Ok(())
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        let key = path::normalize(path)?;
        let prefix = format!("{}/", key);
        let mut tree = self.write_tree()?;
        tree.retain(|k, _| {
            if key.is_empty() {
                k.is_empty()
            } else {
                k != &key && !k.starts_with(&prefix)
            }
        });
        Ok(())
    }

    fn rename(&self, old_name: &str, new_name: &str) -> FsResult<()> {
        let old_key = path::normalize(old_name)?;
        let new_key = path::normalize(new_name)?;
        if old_key.is_empty() || new_key.is_empty() {
            return Err(FsError::InvalidPath(format!("{} -> {}", old_name, new_name)));
        }
        if old_key == new_key {
            return Ok(());
        }
        if new_key.starts_with(&format!("{}/", old_key)) {
            return Err(FsError::InvalidPath(format!(
                "cannot move {} into itself",
                old_name
            )));
        }

        let mut tree = self.write_tree()?;
        let old_is_dir = match tree.get(&old_key) {
            Some(node) => read_node(node)?.is_dir,
            None => return Err(FsError::not_found(old_name)),
        };
        Self::check_parent(&tree, &new_key, new_name)?;

        if let Some(existing) = tree.get(&new_key) {
            let new_is_dir = read_node(existing)?.is_dir;
            match (old_is_dir, new_is_dir) {
                (false, true) => return Err(FsError::is_a_directory(new_name)),
                (true, false) => return Err(FsError::not_a_directory(new_name)),
                (true, true) if children(&tree, &new_key).next().is_some() => {
                    return Err(FsError::DirectoryNotEmpty(new_name.to_string()));
                }
                _ => {}
            }
            tree.remove(&new_key);
        }

        let old_prefix = format!("{}/", old_key);
        let moved: Vec<String> = tree
            .keys()
            .filter(|k| **k == old_key || k.starts_with(&old_prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = tree.remove(&key) {
                let renamed = format!("{}{}", new_key, &key[old_key.len()..]);
                tree.insert(renamed, node);
            }
        }
        Ok(())
    }

    fn mkdir(&self, name: &str, perm: u32) -> FsResult<()> {
        let key = path::normalize(name)?;
        let mut tree = self.write_tree()?;
        if tree.contains_key(&key) {
            return Err(FsError::already_exists(name));
        }
        Self::check_parent(&tree, &key, name)?;
        tree.insert(key, Arc::new(RwLock::new(Node::directory(perm))));
        Ok(())
    }

    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()> {
        let key = path::normalize(path)?;
        let mut tree = self.write_tree()?;
        let mut current = String::new();
        for part in key.split('/').filter(|p| !p.is_empty()) {
            current = path::join(&current, part);
            match tree.get(&current) {
                Some(node) if read_node(node)?.is_dir => {}
                Some(_) => return Err(FsError::not_a_directory(current)),
                None => {
                    tree.insert(
                        current.clone(),
                        Arc::new(RwLock::new(Node::directory(perm))),
                    );
                }
            }
        }
        Ok(())
    }
}

/// An open handle into a [`MemoryFs`].
pub struct MemoryFile {
    name: String,
    key: String,
    node: NodeRef,
    tree: Arc<RwLock<Tree>>,
    pos: u64,
    readable: bool,
    writable: bool,
    append: bool,
    dir_cursor: usize,
}

impl std::fmt::Debug for MemoryFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFile")
            .field("name", &self.name)
            .field("pos", &self.pos)
            .field("readable", &self.readable)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}

impl MemoryFile {
    fn check_readable(&self, node: &Node) -> FsResult<()> {
        if node.is_dir {
            return Err(FsError::is_a_directory(&self.name));
        }
        if !self.readable {
            return Err(FsError::permission_denied(format!(
                "{}: not opened for reading",
                self.name
            )));
        }
        Ok(())
    }

    fn check_writable(&self, node: &Node) -> FsResult<()> {
        if node.is_dir {
            return Err(FsError::is_a_directory(&self.name));
        }
        if !self.writable {
            return Err(FsError::permission_denied(format!(
                "{}: not opened for writing",
                self.name
            )));
        }
        Ok(())
    }

    fn entries(&mut self, count: Option<usize>) -> FsResult<Vec<FileInfo>> {
        if !read_node(&self.node)?.is_dir {
            return Err(FsError::not_a_directory(&self.name));
        }
        let tree = self.tree.read().map_err(|_| poisoned())?;
        let remaining = children(&tree, &self.key).skip(self.dir_cursor);
        let mut out = Vec::new();
        for (key, node) in remaining.take(count.unwrap_or(usize::MAX)) {
            out.push(read_node(node)?.info(key));
        }
        self.dir_cursor += out.len();
        Ok(out)
    }
}

fn copy_at(data: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

/// Zero-extend `data` to `len` bytes, failing instead of aborting when the
/// allocation cannot be made.
fn grow(data: &mut Vec<u8>, len: usize) -> FsResult<()> {
    if let Some(extra) = len.checked_sub(data.len()) {
        data.try_reserve(extra).map_err(|err| {
            FsError::other(format!("cannot grow file to {} bytes: {}", len, err))
        })?;
    }
    data.resize(len, 0);
    Ok(())
}

fn write_into(data: &mut Vec<u8>, buf: &[u8], offset: u64) -> FsResult<()> {
    let end = usize::try_from(offset)
        .ok()
        .and_then(|start| start.checked_add(buf.len()).map(|end| (start, end)));
    let Some((start, end)) = end else {
        return Err(FsError::other(format!("offset {} out of range", offset)));
    };
    if data.len() < end {
        grow(data, end)?;
    }
    data[start..end].copy_from_slice(buf);
    Ok(())
}

impl File for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let n = {
            let node = read_node(&self.node)?;
            self.check_readable(&node)?;
            copy_at(&node.data, buf, self.pos)
        };
        self.pos += n as u64;
        Ok(n)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        let node = read_node(&self.node)?;
        self.check_readable(&node)?;
        Ok(copy_at(&node.data, buf, offset))
    }

    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        let len = read_node(&self.node)?.data.len() as u64;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            FsError::from(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            ))
        })?;
        self.pos = target;
        Ok(target)
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        let mut node = write_node(&self.node)?;
        self.check_writable(&node)?;
        if self.append {
            self.pos = node.data.len() as u64;
        }
        write_into(&mut node.data, buf, self.pos)?;
        node.modified = SystemTime::now();
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> FsResult<usize> {
        let mut node = write_node(&self.node)?;
        self.check_writable(&node)?;
        write_into(&mut node.data, buf, offset)?;
        node.modified = SystemTime::now();
        Ok(buf.len())
    }

    fn truncate(&mut self, size: u64) -> FsResult<()> {
        let mut node = write_node(&self.node)?;
        self.check_writable(&node)?;
        let size = usize::try_from(size)
            .map_err(|_| FsError::other(format!("size {} out of range", size)))?;
        grow(&mut node.data, size)?;
        node.modified = SystemTime::now();
        Ok(())
    }

    fn sync(&mut self) -> FsResult<()> {
        Ok(())
    }

    fn stat(&self) -> FsResult<FileInfo> {
        Ok(read_node(&self.node)?.info(&self.key))
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
