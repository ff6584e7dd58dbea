//! Policy-enforcing file handle wrapper.

use std::io::SeekFrom;
use std::sync::Arc;

use super::handler::Filter;
use super::operation::Operation;
use crate::vfs::{File, FileInfo, FsResult, path};

/// A file handle that keeps applying policy to directory listings.
///
/// Reads, writes and seeks go straight to the wrapped handle: the decision
/// to open it has already been made. Listing a directory discloses the
/// names of its children, so each entry is checked as an
/// [`Operation::Open`] of `<handle name>/<entry name>` and dropped if the
/// filter rejects it.
pub struct PolicyFile {
    inner: Box<dyn File>,
    filter: Option<Arc<dyn Filter>>,
}

impl std::fmt::Debug for PolicyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyFile")
            .field("inner", &self.inner)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl PolicyFile {
    /// Wrap `inner`, checking listings against `filter`.
    pub fn new(inner: Box<dyn File>, filter: Option<Arc<dyn Filter>>) -> Self {
        Self { inner, filter }
    }

    fn allows_entry(&self, entry: &str) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        let operation = Operation::Open {
            name: path::join(self.inner.name(), entry),
        };
        match filter.check(&operation) {
            Ok(()) => true,
            Err(err) => {
                tracing::trace!(
                    path = %operation.path(),
                    reason = %err,
                    "hiding directory entry"
                );
                false
            }
        }
    }
}

impl File for PolicyFile {
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
        // A page whose entries are all hidden must not read as end-of-listing,
        // so keep paging until something survives or the backend runs dry.
        loop {
            let entries = self.inner.read_dir(count)?;
            let exhausted = entries.is_empty();
            let kept: Vec<FileInfo> = entries
                .into_iter()
                .filter(|entry| entry.is_dir() || self.allows_entry(&entry.name))
                .collect();
            if !kept.is_empty() || exhausted || count.is_none() {
                return Ok(kept);
            }
        }
    }

    fn read_dir_names(&mut self, count: Option<usize>) -> FsResult<Vec<String>> {
        // Names carry no type information, so there is no directory bypass here.
        loop {
            let names = self.inner.read_dir_names(count)?;
            let exhausted = names.is_empty();
            let kept: Vec<String> = names
                .into_iter()
                .filter(|name| self.allows_entry(name))
                .collect();
            if !kept.is_empty() || exhausted || count.is_none() {
                return Ok(kept);
            }
        }
    }

    fn close(self: Box<Self>) -> FsResult<()> {
        self.inner.close()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::policy::{PathPredicate, PredicateFilter, path_predicate};
    use crate::vfs::{DEFAULT_DIR_PERM, Fs, FsError, MemoryFs, OpenFlags};

    fn txt_only() -> Option<Arc<dyn Filter>> {
        let filter: PredicateFilter<PathPredicate<_>> =
            PredicateFilter::new(path_predicate(|p: &str| p.ends_with(".txt")));
        Some(Arc::new(filter))
    }

    fn setup() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.mkdir("dir", DEFAULT_DIR_PERM).unwrap();
        fs.write_all("dir/file1.txt", b"one").unwrap();
        fs.write_all("dir/file2.go", b"two").unwrap();
        fs.mkdir("dir/subdir", DEFAULT_DIR_PERM).unwrap();
        fs
    }

    #[test]
    fn test_read_dir_filters_files_keeps_dirs() {
        let fs = setup();
        let mut file = PolicyFile::new(fs.open("dir").unwrap(), txt_only());
        let names: Vec<String> = file
            .read_dir(None)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["file1.txt", "subdir"]);
    }

    #[test]
    fn test_read_dir_names_has_no_dir_bypass() {
        let fs = setup();
        let mut file = PolicyFile::new(fs.open("dir").unwrap(), txt_only());
        assert_eq!(file.read_dir_names(None).unwrap(), vec!["file1.txt"]);
    }

    #[test]
    fn test_without_filter_lists_everything() {
        let fs = setup();
        let mut file = PolicyFile::new(fs.open("dir").unwrap(), None);
        assert_eq!(
            file.read_dir_names(None).unwrap(),
            vec!["file1.txt", "file2.go", "subdir"]
        );
    }

    #[test]
    fn test_paging_skips_fully_hidden_pages() {
        let fs = MemoryFs::new();
        fs.mkdir("dir", DEFAULT_DIR_PERM).unwrap();
        for name in ["a.go", "b.go", "c.txt", "d.go", "e.go", "f.go", "g.txt"] {
            fs.write_all(&format!("dir/{}", name), b"").unwrap();
        }

        let mut file = PolicyFile::new(fs.open("dir").unwrap(), txt_only());
        let mut pages = Vec::new();
        loop {
            let page = file.read_dir_names(Some(2)).unwrap();
            if page.is_empty() {
                break;
            }
            pages.push(page);
        }
        assert_eq!(pages, vec![vec!["c.txt"], vec!["g.txt"]]);

        let mut file = PolicyFile::new(fs.open("dir").unwrap(), txt_only());
        let first: Vec<String> = file
            .read_dir(Some(2))
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(first, vec!["c.txt"]);
    }

    #[test]
    fn test_fully_hidden_listing_ends_empty() {
        let fs = MemoryFs::new();
        fs.mkdir("dir", DEFAULT_DIR_PERM).unwrap();
        fs.write_all("dir/a.go", b"").unwrap();
        fs.write_all("dir/b.go", b"").unwrap();
        fs.write_all("dir/c.go", b"").unwrap();

        let mut file = PolicyFile::new(fs.open("dir").unwrap(), txt_only());
        assert!(file.read_dir_names(Some(1)).unwrap().is_empty());
        assert!(file.read_dir(Some(1)).unwrap().is_empty());
    }

    #[test]
    fn test_listing_error_propagates() {
        let fs = setup();
        let mut file = PolicyFile::new(fs.open("dir/file1.txt").unwrap(), txt_only());
        assert!(matches!(
            file.read_dir(None).unwrap_err(),
            FsError::NotADirectory(_)
        ));
        assert!(matches!(
            file.read_dir_names(None).unwrap_err(),
            FsError::NotADirectory(_)
        ));
    }

    #[test]
    fn test_io_passes_through() {
        let fs = setup();
        let inner = fs
            .open_file("dir/file1.txt", OpenFlags::write(), 0)
            .unwrap();
        let mut file = PolicyFile::new(inner, txt_only());

        assert_eq!(file.name(), "dir/file1.txt");
        assert_eq!(file.write_str("ONE!").unwrap(), 4);
        assert_eq!(file.seek(SeekFrom::Start(0)).unwrap(), 0);

        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ONE!");

        file.write_at(b"o", 0).unwrap();
        file.truncate(3).unwrap();
        file.sync().unwrap();
        assert_eq!(file.stat().unwrap().size, 3);
        Box::new(file).close().unwrap();

        assert_eq!(fs.read_to_vec("dir/file1.txt").unwrap(), b"oNE");
    }
}
