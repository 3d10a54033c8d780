//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! [`Walker`] enumerates the regular files below a root in a deterministic
//! order: directory children are sorted by file name and visited depth
//! first. That order is the "discovery order" every duplicate set keeps.
//!
//! # Filtering
//!
//! - Symlinks are never followed and never reported, not even as errors
//! - Devices, sockets, FIFOs and directories are skipped
//! - Entries that cannot be stat'ed, and directories that cannot be read,
//!   are yielded as [`EntryError::Unreadable`] and the walk continues
//! - Optional hidden, size, empty-file and gitignore-style pattern filters
//!
//! # Example
//!
//! ```no_run
//! use dupe_detective::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let root = Walker::canonical_root(Path::new("/home/user/Downloads")).unwrap();
//! let walker = Walker::new(&root, WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::{Parallelism, WalkDir};

use super::{path_utils, EntryError, FileRecord, ScanError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for cancellation
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given root.
    ///
    /// The root should already be canonical (see [`Walker::canonical_root`])
    /// so that yielded paths are canonical too.
    #[must_use]
    pub fn new(root: &Path, config: WalkerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Resolve and validate a scan root.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidRoot`] if the root does not exist, is not
    /// a directory, or is not readable.
    pub fn canonical_root(root: &Path) -> Result<PathBuf, ScanError> {
        path_utils::canonical_root(root)
    }

    /// Stop yielding entries once `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root this walker enumerates.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the ignore matcher from configured patterns.
    ///
    /// `.gitignore` files inside the tree are not consulted: identical
    /// content must be found wherever it lives.
    fn build_ignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    fn passes_size_filter(&self, size: u64) -> bool {
        if self.config.skip_empty && size == 0 {
            return false;
        }
        if self.config.min_size.is_some_and(|min| size < min) {
            return false;
        }
        if self.config.max_size.is_some_and(|max| size > max) {
            return false;
        }
        true
    }

    /// Walk the directory tree, yielding file records.
    ///
    /// Errors are yielded as [`EntryError`] values rather than stopping
    /// iteration. The sequence is lazy; nothing is read until it is polled.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, EntryError>> + '_ {
        let ignore = self.build_ignore();
        let root = self.root.clone();

        // Hash workers own the parallelism; the walk itself stays serial so
        // it never competes with them for the global rayon pool.
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(self.config.skip_hidden)
            .parallelism(Parallelism::Serial)
            .process_read_dir(move |_depth, _path, _state, children| {
                if let Some(ref gi) = ignore {
                    children.retain(|child| match child {
                        Ok(entry) => {
                            let path = entry.path();
                            let ignored = is_ignored(gi, &root, &path, entry.file_type().is_dir());
                            if ignored {
                                log::trace!("Ignoring: {}", path.display());
                            }
                            !ignored
                        }
                        Err(_) => true,
                    });
                }
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| {
                let stop = self.is_shutdown_requested();
                if stop {
                    log::debug!("Walker: cancellation requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(mut entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        // A failed read_dir is attached to the directory's own entry.
                        return entry
                            .read_children_error
                            .take()
                            .map(|e| Err(self.handle_jwalk_error(e)));
                    }
                    if entry.depth == 0 {
                        return None;
                    }
                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", entry.path().display());
                        return None;
                    }
                    self.process_file(entry.path())
                }
                Err(e) => Some(Err(self.handle_jwalk_error(e))),
            })
    }

    /// Stat a candidate and turn it into a record if it passes the filters.
    fn process_file(&self, path: PathBuf) -> Option<Result<FileRecord, EntryError>> {
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("File vanished during walk: {}", path.display());
                return None;
            }
            Err(e) => {
                log::warn!("Cannot stat {}: {}", path.display(), e);
                return Some(Err(EntryError::unreadable(&path, e)));
            }
        };

        // Re-checked here: the entry may have been replaced since readdir.
        if metadata.file_type().is_symlink() {
            log::trace!("Skipping symlink: {}", path.display());
            return None;
        }
        if !metadata.is_file() {
            log::trace!("Skipping non-regular file: {}", path.display());
            return None;
        }

        let size = metadata.len();
        if !self.passes_size_filter(size) {
            log::trace!("Skipping file due to size filter ({}): {}", size, path.display());
            return None;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Some(Ok(FileRecord::new(path, size, modified)))
    }

    fn handle_jwalk_error(&self, error: jwalk::Error) -> EntryError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        let kind = error
            .io_error()
            .map_or(io::ErrorKind::Other, io::Error::kind);
        log::warn!("Walker error for {}: {}", path.display(), error);
        EntryError::unreadable(&path, io::Error::new(kind, error.to_string()))
    }
}

fn is_ignored(gi: &Gitignore, root: &Path, path: &Path, is_dir: bool) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    gi.matched(relative, is_dir).is_ignore()
}
