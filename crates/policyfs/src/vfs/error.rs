//! Filesystem error types.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during filesystem operations.
///
/// The type is `Clone` so a policy can hand out the same configured denial
/// error on every rejected call.
#[derive(Debug, Clone, Error)]
pub enum FsError {
    /// File or directory not found
    #[error("file not found: {0}")]
    NotFound(String),
    /// Path already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// Permission denied for the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Filesystem is read-only
    #[error("read-only filesystem")]
    ReadOnly,
    /// Path is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),
    /// Path is a directory where a file was expected
    #[error("is a directory: {0}")]
    IsADirectory(String),
    /// Directory not empty
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    /// Invalid path format
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// The backend does not implement this verb
    #[error("operation not supported: {0}")]
    Unsupported(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(Arc<io::Error>),
    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns true if this error reports a missing path.
    pub fn is_not_found(&self) -> bool {
        self.kind() == io::ErrorKind::NotFound
    }

    /// The closest `std::io::ErrorKind` for this error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::PermissionDenied(_) | FsError::ReadOnly => io::ErrorKind::PermissionDenied,
            FsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            FsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FsError::InvalidPath(_) => io::ErrorKind::InvalidInput,
            FsError::Unsupported(_) => io::ErrorKind::Unsupported,
            FsError::Io(e) => e.kind(),
            FsError::Other(_) => io::ErrorKind::Other,
        }
    }

    /// Convert an I/O error raised while operating on `path`.
    ///
    /// Well-known kinds map onto the matching variant so callers can match on
    /// them regardless of which backend produced the error.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            io::ErrorKind::NotADirectory => Self::NotADirectory(path.to_string()),
            io::ErrorKind::IsADirectory => Self::IsADirectory(path.to_string()),
            io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty(path.to_string()),
            io::ErrorKind::ReadOnlyFilesystem => Self::ReadOnly,
            _ => Self::Io(Arc::new(err)),
        }
    }
}

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Io(inner) => match Arc::try_unwrap(inner) {
                Ok(err) => err,
                Err(shared) => io::Error::new(shared.kind(), shared.to_string()),
            },
            other => io::Error::new(other.kind(), other),
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;
