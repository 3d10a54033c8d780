//! Path helpers shared by the walker and the deletion planner.
//!
//! Scan roots are canonicalized once, up front, so every discovered path is
//! absolute and symlink-free in its directory part. Containment checks are
//! component-wise (`/data/ab` is not inside `/data/a`).
//!
//! # Example
//!
//! ```
//! use dupe_detective::scanner::path_utils::{has_parent_component, is_within};
//! use std::path::Path;
//!
//! assert!(is_within(Path::new("/data/a/x.txt"), Path::new("/data/a")));
//! assert!(!is_within(Path::new("/data/ab/x.txt"), Path::new("/data/a")));
//! assert!(has_parent_component(Path::new("/data/a/../b")));
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::ScanError;

/// Resolve `root` to a canonical absolute directory that can be listed.
///
/// # Errors
///
/// Returns [`ScanError::InvalidRoot`] if the path does not exist, is not
/// a directory, or its entries cannot be read.
pub fn canonical_root(root: &Path) -> Result<PathBuf, ScanError> {
    let canonical = fs::canonicalize(root).map_err(|e| ScanError::invalid_root(root, e))?;

    let metadata = fs::metadata(&canonical).map_err(|e| ScanError::invalid_root(root, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::invalid_root(
            root,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }

    fs::read_dir(&canonical).map_err(|e| ScanError::invalid_root(root, e))?;

    log::debug!("Resolved scan root {} -> {}", root.display(), canonical.display());
    Ok(canonical)
}

/// Whether `path` contains a `..` component.
#[must_use]
pub fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Whether `path` lies strictly inside `root`.
///
/// The root itself is not considered inside.
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    path != root && path.starts_with(root)
}

/// Whether `path` lies inside any of `roots`.
#[must_use]
pub fn is_within_any(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| is_within(path, root))
}
