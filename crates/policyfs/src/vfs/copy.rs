//! Whole-tree copy between filesystems.

use super::ops::Fs;
use super::path;
use super::types::OpenFlags;
use super::{FsError, FsResult};

/// Copy every directory and file `src` lists into `dest`.
///
/// The walk starts at the root of `src` and only sees what `src` lists, so
/// copying out of a policy wrapper copies the visible tree. Directories are
/// created with `mkdir_all` and existing files in `dest` are truncated.
/// Permission bits are carried over; ownership and times are not.
///
/// The first error stops the copy and leaves `dest` partially written.
pub fn copy<S, D>(src: &S, dest: &D) -> FsResult<()>
where
    S: Fs + ?Sized,
    D: Fs + ?Sized,
{
    copy_dir(src, dest, "")
}

fn copy_dir<S, D>(src: &S, dest: &D, dir: &str) -> FsResult<()>
where
    S: Fs + ?Sized,
    D: Fs + ?Sized,
{
    let mut handle = src.open(dir)?;
    let entries = handle.read_dir(None)?;
    handle.close()?;

    for entry in entries {
        let name = path::join(dir, &entry.name);
        if entry.is_dir() {
            dest.mkdir_all(&name, entry.mode)?;
            copy_dir(src, dest, &name)?;
        } else {
            copy_file(src, dest, &name, entry.mode)?;
        }
    }
    Ok(())
}

fn copy_file<S, D>(src: &S, dest: &D, name: &str, mode: u32) -> FsResult<()>
where
    S: Fs + ?Sized,
    D: Fs + ?Sized,
{
    let mut from = src.open(name)?;
    let mut to = dest.open_file(name, OpenFlags::create_truncate(), mode)?;
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = from.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let mut written = 0;
        while written < n {
            let m = to.write(&buf[written..n])?;
            if m == 0 {
                return Err(FsError::other(format!("short write to {}", name)));
            }
            written += m;
        }
        total += n as u64;
    }
    from.close()?;
    to.close()?;
    tracing::trace!(path = %name, bytes = total, "copied file");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::policy::{PolicyFs, path_predicate};
    use crate::vfs::{DEFAULT_DIR_PERM, MemoryFs, OsFs};

    fn source() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.mkdir_all("src/bin", DEFAULT_DIR_PERM).unwrap();
        fs.mkdir("empty", 0o700).unwrap();
        fs.write_all("Cargo.toml", b"[package]").unwrap();
        fs.write_all("src/lib.rs", b"pub fn lib() {}").unwrap();
        fs.write_all("src/bin/main.rs", b"fn main() {}").unwrap();
        fs.write_all("src/.env", b"SECRET=1").unwrap();
        fs.chmod("src/bin/main.rs", 0o755).unwrap();
        fs
    }

    #[test]
    fn test_copy_tree() {
        let src = source();
        let dest = MemoryFs::new();
        copy(&src, &dest).unwrap();

        assert_eq!(dest.read_to_vec("Cargo.toml").unwrap(), b"[package]");
        assert_eq!(dest.read_to_vec("src/lib.rs").unwrap(), b"pub fn lib() {}");
        assert_eq!(dest.read_to_vec("src/bin/main.rs").unwrap(), b"fn main() {}");
        assert_eq!(dest.stat("src/bin/main.rs").unwrap().mode, 0o755);
        assert!(dest.is_dir("empty").unwrap());
    }

    #[test]
    fn test_copy_truncates_existing_files() {
        let src = source();
        let dest = MemoryFs::new();
        dest.write_all("Cargo.toml", b"a much longer manifest than the source")
            .unwrap();
        copy(&src, &dest).unwrap();
        assert_eq!(dest.read_to_vec("Cargo.toml").unwrap(), b"[package]");
    }

    #[test]
    fn test_copy_through_policy_skips_hidden_files() {
        let src = PolicyFs::from_predicate(
            Arc::new(source()),
            path_predicate(|name: &str| !path::base_name(name).starts_with('.')),
        );
        let dest = MemoryFs::new();
        copy(&src, &dest).unwrap();

        assert!(dest.exists("src/lib.rs"));
        assert!(!dest.exists("src/.env"));
    }

    #[test]
    fn test_copy_to_host_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = OsFs::new(dir.path());
        copy(&source(), &dest).unwrap();

        let main = std::fs::read(dir.path().join("src/bin/main.rs")).unwrap();
        assert_eq!(main, b"fn main() {}");
        assert!(dir.path().join("empty").is_dir());
    }

    #[test]
    fn test_large_file_spans_buffers() {
        let src = MemoryFs::new();
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        src.write_all("blob.bin", &data).unwrap();
        let dest = MemoryFs::new();
        copy(&src, &dest).unwrap();
        assert_eq!(dest.read_to_vec("blob.bin").unwrap(), data);
    }
}
