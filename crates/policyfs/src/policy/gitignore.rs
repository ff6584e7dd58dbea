//! Gitignore-driven predicates.
//!
//! An [`IgnorePredicate`] hides every path its matcher reports as ignored.
//! Paths are matched as given by the caller, relative to the filesystem
//! root, so `*.txt` hides `notes.txt` and `dir/notes.txt` alike.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::fs::PolicyFs;
use super::handler::{Predicate, PredicateFilter};
use super::operation::Operation;
use crate::vfs::{File, Fs, FsError, path};

/// Name of the ignore file read by [`IgnorePredicate::open_default`].
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";

/// Errors building an ignore predicate.
#[derive(Debug, thiserror::Error)]
pub enum IgnoreError {
    /// Reading the ignore lines failed.
    #[error("scanning ignore lines: {0}")]
    Scan(#[source] io::Error),

    /// Opening the ignore file failed.
    #[error("opening ignore file: {0}")]
    Open(#[source] FsError),

    /// A line is not a valid gitignore pattern.
    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),
}

/// Anything that can say whether a path is ignored.
pub trait IgnoreMatcher: Send + Sync {
    /// Returns true if `path` is ignored.
    fn matches_path(&self, path: &str) -> bool;
}

impl<F> IgnoreMatcher for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches_path(&self, path: &str) -> bool {
        self(path)
    }
}

impl IgnoreMatcher for Gitignore {
    fn matches_path(&self, path: &str) -> bool {
        // Fall back to the raw path when it cannot be normalized (e.g. `..`
        // above the root); the matcher then decides on what it was given.
        let key = path::normalize(path)
            .unwrap_or_else(|_| path.trim_start_matches('/').to_string());
        if key.is_empty() {
            return false;
        }
        self.matched_path_or_any_parents(&key, false).is_ignore()
    }
}

/// A [`Predicate`] that denies exactly the paths its matcher ignores.
#[derive(Clone, Debug)]
pub struct IgnorePredicate<M> {
    matcher: M,
}

impl<M: IgnoreMatcher> IgnorePredicate<M> {
    /// Wrap an existing matcher.
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }

    /// Get a reference to the matcher.
    pub fn matcher(&self) -> &M {
        &self.matcher
    }
}

impl IgnorePredicate<Gitignore> {
    /// Compile gitignore lines. Blank lines and `#` comments are skipped.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, IgnoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new("/");
        for line in lines {
            builder.add_line(None, line.as_ref())?;
        }
        Ok(Self::new(builder.build()?))
    }

    /// Read gitignore lines from `reader`.
    pub fn from_reader(reader: impl Read) -> Result<Self, IgnoreError> {
        let lines = BufReader::new(reader)
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .map_err(IgnoreError::Scan)?;
        Self::from_lines(lines)
    }

    /// Read gitignore lines from `path` on `fs`.
    ///
    /// Failing to open the file is an [`IgnoreError::Open`]; failing to read
    /// or close it is an [`IgnoreError::Scan`].
    pub fn from_file<F: Fs + ?Sized>(fs: &F, path: &str) -> Result<Self, IgnoreError> {
        let file = fs.open(path).map_err(IgnoreError::Open)?;
        let data = read_and_close(file)?;
        tracing::debug!(path, bytes = data.len(), "loaded ignore file");
        Self::from_reader(data.as_slice())
    }

    /// Read [`DEFAULT_IGNORE_FILE`] from the root of `fs`.
    pub fn open_default<F: Fs + ?Sized>(fs: &F) -> Result<Self, IgnoreError> {
        Self::from_file(fs, DEFAULT_IGNORE_FILE)
    }
}

fn read_and_close(mut file: Box<dyn File>) -> Result<Vec<u8>, IgnoreError> {
    let data = file.read_to_end();
    let closed = file.close();
    data.and_then(|data| closed.map(|()| data))
        .map_err(|err| IgnoreError::Scan(err.into()))
}

impl<M: IgnoreMatcher> Predicate for IgnorePredicate<M> {
    fn allows(&self, operation: &Operation) -> bool {
        !self.matcher.matches_path(operation.path())
    }
}

impl<F: Fs + ?Sized> PolicyFs<F> {
    /// Hide every path `matcher` reports as ignored.
    pub fn ignore_matcher(inner: Arc<F>, matcher: impl IgnoreMatcher + 'static) -> Self {
        Self::new(inner, PredicateFilter::new(IgnorePredicate::new(matcher)))
    }

    /// Hide every path matched by the given gitignore lines.
    pub fn ignore_lines<I, S>(inner: Arc<F>, lines: I) -> Result<Self, IgnoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let predicate = IgnorePredicate::from_lines(lines)?;
        Ok(Self::from_predicate(inner, predicate))
    }

    /// Hide every path matched by gitignore lines read from `reader`.
    pub fn ignore_reader(inner: Arc<F>, reader: impl Read) -> Result<Self, IgnoreError> {
        let predicate = IgnorePredicate::from_reader(reader)?;
        Ok(Self::from_predicate(inner, predicate))
    }

    /// Hide every path matched by the ignore file at `path` on `inner`.
    pub fn ignore_file(inner: Arc<F>, path: &str) -> Result<Self, IgnoreError> {
        let predicate = IgnorePredicate::from_file(inner.as_ref(), path)?;
        Ok(Self::from_predicate(inner, predicate))
    }

    /// Hide every path matched by `.gitignore` at the root of `inner`.
    pub fn ignore_default(inner: Arc<F>) -> Result<Self, IgnoreError> {
        Self::ignore_file(inner, DEFAULT_IGNORE_FILE)
    }
}
