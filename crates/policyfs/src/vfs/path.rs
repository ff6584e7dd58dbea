//! Helpers for `/`-separated virtual paths.

use super::{FsError, FsResult};

/// Normalize a path to the canonical form used as a key by in-memory backends.
///
/// Leading and repeated slashes and `.` segments are dropped; the root is the
/// empty string. `..` is not allowed to climb above the root.
pub fn normalize(path: &str) -> FsResult<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(FsError::InvalidPath(path.to_string()));
                }
            }
            part => parts.push(part),
        }
    }
    Ok(parts.join("/"))
}

/// Join a directory path and an entry name.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "." {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// The parent of a normalized path (`""` for top-level entries and the root).
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// The last segment of a normalized path (`"/"` for the root).
pub fn base_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, name)) => name,
        None if path.is_empty() => "/",
        None => path,
    }
}
