//! Policy-enforcing filesystem wrapper.

use std::sync::Arc;
use std::time::SystemTime;

use super::file::PolicyFile;
use super::handler::{Filter, Predicate, PredicateFilter};
use super::operation::Operation;
use crate::vfs::{File, FileInfo, Fs, FsError, FsResult, OpenFlags};

/// A filesystem wrapper that enforces a [`Filter`] on every operation.
///
/// This wraps any [`Fs`] implementation, builds an [`Operation`] for each
/// call and asks the filter about it before delegating.
///
/// ## Directory bypass
///
/// Directories are structural: leaf verbs (stat, open, open_file, chmod,
/// chown, set_times, remove, remove_all, rename) on a path that the backing
/// filesystem reports as a directory skip the filter entirely, and
/// mkdir/mkdir_all are never filtered. Listings through a handle are still
/// filtered entry by entry, see [`PolicyFile`].
///
/// ## Errors
///
/// A denial returns exactly the filter's error. Errors from the backing
/// filesystem, including a failed directory check, are returned unchanged.
///
/// ## Layering
///
/// `PolicyFs` is itself an [`Fs`], so policies stack by wrapping one
/// `PolicyFs` in another. Each layer evaluates independently.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use policyfs::policy::{Operation, PolicyFs};
/// use policyfs::vfs::{Fs, FsError, MemoryFs};
///
/// let base = Arc::new(MemoryFs::new());
/// base.write_all("notes.txt", b"hello").unwrap();
/// base.write_all("secret.key", b"hunter2").unwrap();
///
/// let fs = PolicyFs::from_predicate(base, |op: &Operation| !op.path().ends_with(".key"));
///
/// assert_eq!(fs.read_to_vec("notes.txt").unwrap(), b"hello");
/// assert!(matches!(fs.stat("secret.key"), Err(FsError::NotFound(_))));
/// ```
pub struct PolicyFs<F: Fs + ?Sized> {
    inner: Arc<F>,
    filter: Option<Arc<dyn Filter>>,
}

impl<F: Fs + ?Sized> PolicyFs<F> {
    /// Create a new policy filesystem wrapper.
    pub fn new(inner: Arc<F>, filter: impl Filter + 'static) -> Self {
        Self {
            inner,
            filter: Some(Arc::new(filter)),
        }
    }

    /// Create a wrapper that shares an existing filter.
    pub fn with_shared_filter(inner: Arc<F>, filter: Arc<dyn Filter>) -> Self {
        Self {
            inner,
            filter: Some(filter),
        }
    }

    /// Create a wrapper with no filter: every operation is allowed.
    pub fn allow_all(inner: Arc<F>) -> Self {
        Self {
            inner,
            filter: None,
        }
    }

    /// Create a wrapper that denies with a not-found error whenever
    /// `predicate` returns false.
    pub fn from_predicate(inner: Arc<F>, predicate: impl Predicate + 'static) -> Self {
        Self::new(inner, PredicateFilter::new(predicate))
    }

    /// Create a wrapper that denies with `error` whenever `predicate`
    /// returns false.
    pub fn from_predicate_with_error(
        inner: Arc<F>,
        predicate: impl Predicate + 'static,
        error: FsError,
    ) -> Self {
        Self::new(inner, PredicateFilter::with_error(predicate, error))
    }

    /// Get a reference to the inner filesystem.
    pub fn inner(&self) -> &Arc<F> {
        &self.inner
    }

    /// Get a reference to the filter, if any.
    pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.filter.as_ref()
    }

    /// Check if an operation is allowed by the filter.
    fn check(&self, operation: &Operation) -> FsResult<()> {
        let Some(filter) = &self.filter else {
            return Ok(());
        };
        filter.check(operation).inspect_err(|reason| {
            tracing::debug!(
                path = %operation.path(),
                operation = ?operation.kind(),
                reason = %reason,
                "policy denied access"
            );
        })
    }

    /// Whether `path` is a directory on the backing filesystem.
    ///
    /// A missing path is not a directory; any other stat failure is returned.
    fn is_backing_dir(&self, path: &str) -> FsResult<bool> {
        match self.inner.stat(path) {
            Ok(info) => Ok(info.is_dir()),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Check `operation` unless its path is a directory.
    fn check_unless_dir(&self, operation: &Operation) -> FsResult<()> {
        if self.is_backing_dir(operation.path())? {
            tracing::trace!(
                path = %operation.path(),
                operation = ?operation.kind(),
                "directory bypasses policy"
            );
            return Ok(());
        }
        self.check(operation)
    }

    fn wrap(&self, file: Box<dyn File>) -> Box<dyn File> {
        Box::new(PolicyFile::new(file, self.filter.clone()))
    }
}

impl<F: Fs + ?Sized> Clone for PolicyFs<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            filter: self.filter.clone(),
        }
    }
}

impl<F: Fs + ?Sized> std::fmt::Debug for PolicyFs<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyFs")
            .field("inner", &self.inner)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl<F: Fs + ?Sized> Fs for PolicyFs<F> {
    fn name(&self) -> String {
        format!("Filter: {}", self.inner.name())
    }

    fn open(&self, name: &str) -> FsResult<Box<dyn File>> {
        self.check_unless_dir(&Operation::Open {
            name: name.to_string(),
        })?;
        let file = self.inner.open(name)?;
        Ok(self.wrap(file))
    }

    fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        self.check_unless_dir(&Operation::OpenFile {
            name: name.to_string(),
            flags,
            perm,
        })?;
        let file = self.inner.open_file(name, flags, perm)?;
        Ok(self.wrap(file))
    }

    fn create(&self, name: &str) -> FsResult<Box<dyn File>> {
        self.check(&Operation::Create {
            name: name.to_string(),
        })?;
        self.inner.create(name)
    }

    fn stat(&self, name: &str) -> FsResult<FileInfo> {
        self.check_unless_dir(&Operation::Stat {
            name: name.to_string(),
        })?;
        self.inner.stat(name)
    }

    fn chmod(&self, name: &str, mode: u32) -> FsResult<()> {
        self.check_unless_dir(&Operation::Chmod {
            name: name.to_string(),
            mode,
        })?;
        self.inner.chmod(name, mode)
    }

    fn chown(&self, name: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.check_unless_dir(&Operation::Chown {
            name: name.to_string(),
            uid,
            gid,
        })?;
        self.inner.chown(name, uid, gid)
    }

    fn set_times(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.check_unless_dir(&Operation::SetTimes {
            name: name.to_string(),
            atime,
            mtime,
        })?;
        self.inner.set_times(name, atime, mtime)
    }

    fn remove(&self, name: &str) -> FsResult<()> {
        self.check_unless_dir(&Operation::Remove {
            name: name.to_string(),
        })?;
        self.inner.remove(name)
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        self.check_unless_dir(&Operation::RemoveAll {
            path: path.to_string(),
        })?;
        self.inner.remove_all(path)
    }

    fn rename(&self, old_name: &str, new_name: &str) -> FsResult<()> {
        if !self.is_backing_dir(old_name)? {
            self.check(&Operation::Rename {
                old_name: old_name.to_string(),
                new_name: new_name.to_string(),
            })?;
            // The destination is checked as if it were being created.
            self.check(&Operation::Create {
                name: new_name.to_string(),
            })?;
        }
        self.inner.rename(old_name, new_name)
    }

    fn mkdir(&self, name: &str, perm: u32) -> FsResult<()> {
        self.inner.mkdir(name, perm)
    }

    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()> {
        self.inner.mkdir_all(path, perm)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::policy::{DenyAll, path_predicate};
    use crate::vfs::{DEFAULT_DIR_PERM, MemoryFs};

    fn setup() -> Arc<MemoryFs> {
        let base = Arc::new(MemoryFs::new());
        base.write_all("test.txt", b"testing").unwrap();
        base.mkdir("dir", DEFAULT_DIR_PERM).unwrap();
        base
    }

    #[test]
    fn test_name_includes_inner() {
        let fs = PolicyFs::allow_all(setup());
        assert_eq!(fs.name(), "Filter: MemoryFs");

        let layered = PolicyFs::allow_all(Arc::new(fs));
        assert_eq!(layered.name(), "Filter: Filter: MemoryFs");
    }

    #[test]
    fn test_shared_filter() {
        let filter: Arc<dyn Filter> =
            Arc::new(PredicateFilter::new(path_predicate(|p: &str| p != "test.txt")));
        let a = PolicyFs::with_shared_filter(setup(), Arc::clone(&filter));
        let b = PolicyFs::with_shared_filter(setup(), Arc::clone(&filter));

        assert!(a.stat("test.txt").is_err());
        assert!(b.stat("test.txt").is_err());
        assert!(Arc::ptr_eq(a.filter().unwrap(), b.filter().unwrap()));
        assert!(PolicyFs::allow_all(setup()).filter().is_none());
    }

    #[test]
    fn test_no_filter_allows_everything() {
        let fs = PolicyFs::allow_all(setup());
        assert!(fs.stat("test.txt").is_ok());
        fs.remove("test.txt").unwrap();
        assert!(!fs.exists("test.txt"));
    }

    #[test]
    fn test_denied_leaf_returns_not_found() {
        let fs = PolicyFs::from_predicate(setup(), DenyAll);
        assert!(matches!(
            fs.stat("test.txt").unwrap_err(),
            FsError::NotFound(_)
        ));
        assert!(matches!(
            fs.remove_all("test.txt").unwrap_err(),
            FsError::NotFound(_)
        ));
        assert!(fs.inner().exists("test.txt"));
    }

    #[test]
    fn test_custom_denial_error_returned_verbatim() {
        let fs = PolicyFs::from_predicate_with_error(
            setup(),
            DenyAll,
            FsError::permission_denied("blocked by policy"),
        );
        match fs.chmod("test.txt", 0o600).unwrap_err() {
            FsError::PermissionDenied(msg) => assert_eq!(msg, "blocked by policy"),
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_directories_bypass() {
        let base = setup();
        let fs = PolicyFs::from_predicate(Arc::clone(&base), DenyAll);
        assert!(fs.stat("dir").unwrap().is_dir());
        assert!(fs.open("dir").is_ok());
        fs.chmod("dir", 0o700).unwrap();
        fs.mkdir("dir/sub", DEFAULT_DIR_PERM).unwrap();
        fs.mkdir_all("a/b/c", DEFAULT_DIR_PERM).unwrap();
        fs.rename("a", "z").unwrap();
        assert!(base.is_dir("z/b/c").unwrap());
        fs.remove_all("z").unwrap();
        assert!(!base.exists("z"));
    }

    #[test]
    fn test_missing_path_is_filtered_then_delegated() {
        let fs = PolicyFs::from_predicate(setup(), path_predicate(|p: &str| p == "missing.txt"));
        // Allowed, so the backend's own not-found comes back.
        assert!(matches!(
            fs.stat("missing.txt").unwrap_err(),
            FsError::NotFound(_)
        ));
        // Missing and allowed: open_file may create it.
        fs.open_file("missing.txt", OpenFlags::create(), 0o644)
            .unwrap()
            .close()
            .unwrap();
        assert!(fs.inner().exists("missing.txt"));
    }

    #[test]
    fn test_directory_check_error_short_circuits() {
        let fs = PolicyFs::from_predicate(setup(), |_: &Operation| -> bool {
            panic!("filter must not run when the directory check fails")
        });
        // `..` above the root is rejected by the backend's stat.
        assert!(matches!(
            fs.stat("../escape").unwrap_err(),
            FsError::InvalidPath(_)
        ));
    }

    #[test]
    fn test_rename_checks_source_then_destination() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = {
            let seen = Arc::clone(&seen);
            move |op: &Operation| -> FsResult<()> {
                seen.lock().unwrap().push(op.clone());
                Ok(())
            }
        };
        let fs = PolicyFs::new(setup(), recorder);
        fs.rename("test.txt", "moved.txt").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                Operation::Rename {
                    old_name: "test.txt".into(),
                    new_name: "moved.txt".into(),
                },
                Operation::Create {
                    name: "moved.txt".into(),
                },
            ]
        );
    }

    #[test]
    fn test_open_wraps_handle() {
        let base = setup();
        base.write_all("dir/a.txt", b"").unwrap();
        base.write_all("dir/b.go", b"").unwrap();
        let fs = PolicyFs::from_predicate(base, path_predicate(|p: &str| p.ends_with(".txt")));

        let mut dir = fs.open("dir").unwrap();
        assert_eq!(dir.read_dir_names(None).unwrap(), vec!["a.txt"]);

        let mut dir = fs.open_file("dir", OpenFlags::read(), 0).unwrap();
        assert_eq!(dir.read_dir_names(None).unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn test_layered_policies_both_apply() {
        let base = setup();
        base.write_all("a.txt", b"").unwrap();
        base.write_all("b.txt", b"").unwrap();

        let inner = PolicyFs::from_predicate(base, path_predicate(|p: &str| p != "a.txt"));
        let outer = PolicyFs::from_predicate_with_error(
            Arc::new(inner),
            path_predicate(|p: &str| p != "b.txt"),
            FsError::permission_denied("outer"),
        );

        // Denied by the inner layer: the outer layer sees not-found from its
        // directory check, evaluates, allows, and the inner denial wins.
        assert!(matches!(
            outer.stat("a.txt").unwrap_err(),
            FsError::NotFound(_)
        ));
        assert!(matches!(
            outer.stat("b.txt").unwrap_err(),
            FsError::PermissionDenied(_)
        ));
        assert!(outer.stat("test.txt").is_ok());
    }
}
