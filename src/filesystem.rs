//! # Filesystem Helpers
//!
//! Thin wrappers around `std::fs` that the snapshot engine relies on:
//! exclusive directory creation (the one primitive that is atomic even under
//! NFS-like semantics), mode-preserving file copies, symlink recreation, and
//! atomic small-file writes.
//!
//! The module also centralizes error classification. Copy accounting treats
//! permission failures differently from everything else, so the classifiers
//! here are the single place where `io::ErrorKind` is interpreted.

use std::fs;
use std::io;
use std::path::Path;

/// True when the error means the path does not exist.
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// True when the error means the path already exists.
pub fn is_already_exists(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::AlreadyExists
}

/// True when the error is a permission failure.
pub fn is_permission(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Creates `path` exclusively: fails with `AlreadyExists` when the directory
/// (or anything else) is already present. The parent must exist.
///
/// On Unix the directory mode is then forced to `mode & 0o777`.
pub fn create_dir_exclusive(path: &Path, mode: u32) -> io::Result<()> {
    fs::create_dir(path)?;
    set_mode(path, mode)
}

/// Creates `path` and all missing parents. Existing directories are fine.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Forces the Unix permission bits of `path` to `mode & 0o777`.
/// A no-op on non-Unix platforms.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Returns the Unix permission bits of a metadata value (0 elsewhere).
#[cfg(unix)]
pub fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
pub fn mode_of(_meta: &fs::Metadata) -> u32 {
    0
}

/// Byte-copies `src` to `dst`, then forces the destination mode to
/// `mode & 0o777` when a non-zero mode is given.
pub fn copy_file(src: &Path, dst: &Path, mode: u32) -> io::Result<()> {
    fs::copy(src, dst)?;
    if mode != 0 {
        set_mode(dst, mode)?;
    }
    Ok(())
}

/// Creates a symlink at `path` pointing to `target`, replacing any existing
/// entry at `path` first.
pub fn replace_symlink(target: &Path, path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(err) if is_not_found(&err) => {}
        Err(err) => return Err(err),
    }
    symlink(target, path)
}

#[cfg(unix)]
fn symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(windows)]
fn symlink(target: &Path, path: &Path) -> io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, path)
    } else {
        std::os::windows::fs::symlink_file(target, path)
    }
}

/// Writes `data` to `path` atomically: the content lands in `<path>.tmp`
/// first and is then renamed over the destination.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}

/// Removes `dir` when it exists and is empty; leaves it alone otherwise.
pub fn remove_dir_if_empty(dir: &Path) -> io::Result<()> {
    match fs::read_dir(dir) {
        Ok(mut entries) => {
            if entries.next().is_none() {
                fs::remove_dir_all(dir)?;
            }
            Ok(())
        }
        Err(err) if is_not_found(&err) => Ok(()),
        Err(err) => Err(err),
    }
}

/// True when anything exists at `path` (without following a final symlink).
pub fn lexists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_dir_exclusive_fails_on_existing() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("d");
        create_dir_exclusive(&dir, 0o755).unwrap();
        let err = create_dir_exclusive(&dir, 0o755).unwrap_err();
        assert!(is_already_exists(&err));
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("stamp");
        atomic_write(&path, b"1").unwrap();
        atomic_write(&path, b"2").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"2");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_remove_dir_if_empty() {
        let tmp = tempdir().unwrap();
        let empty = tmp.path().join("empty");
        let full = tmp.path().join("full");
        fs::create_dir(&empty).unwrap();
        fs::create_dir(&full).unwrap();
        fs::write(full.join("f"), b"x").unwrap();

        remove_dir_if_empty(&empty).unwrap();
        remove_dir_if_empty(&full).unwrap();
        remove_dir_if_empty(&tmp.path().join("missing")).unwrap();

        assert!(!empty.exists());
        assert!(full.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_file_preserves_mode() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::write(&src, b"hello").unwrap();
        set_mode(&src, 0o751).unwrap();

        copy_file(&src, &dst, 0o751).unwrap();

        let mode = mode_of(&fs::metadata(&dst).unwrap()) & 0o777;
        assert_eq!(mode, 0o751);
        assert_eq!(fs::read(&dst).unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_symlink_overwrites() {
        let tmp = tempdir().unwrap();
        let link = tmp.path().join("link");
        fs::write(&link, b"regular").unwrap();

        replace_symlink(Path::new("target-a"), &link).unwrap();
        replace_symlink(Path::new("target-b"), &link).unwrap();

        assert_eq!(fs::read_link(&link).unwrap(), Path::new("target-b"));
    }
}
