//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Deterministic directory walking using jwalk
//! - Streamed content hashing with BLAKE3
//! - Path checks shared with the deletion planner
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Size key and chunked BLAKE3 content hash
//! - [`path_utils`]: Root resolution and containment checks
//!
//! # Example
//!
//! ```no_run
//! use dupe_detective::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: Some(1024),
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let root = Walker::canonical_root(Path::new(".")).unwrap();
//! let walker = Walker::new(&root, config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher, DEFAULT_CHUNK_SIZE};
pub use walker::Walker;

/// A regular file discovered by the walker.
///
/// The content hash is attached once, by the scan coordinator, and only
/// for files whose size collides with at least one other file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Canonical absolute path
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// BLAKE3 digest of the full content, when computed
    pub content_hash: Option<Hash>,
}

impl FileRecord {
    /// Create a new record without a content hash.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            content_hash: None,
        }
    }

    /// Attach the content hash.
    #[must_use]
    pub fn with_hash(mut self, hash: Hash) -> Self {
        self.content_hash = Some(hash);
        self
    }
}

/// Configuration for directory walking.
///
/// Symlinks are never followed.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Skip zero-length files. Off by default: empty files group together
    /// like any other size.
    pub skip_empty: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,
}

impl WalkerConfig {
    /// Create a new configuration from CLI arguments.
    #[must_use]
    pub fn new(
        skip_hidden: bool,
        min_size: Option<u64>,
        max_size: Option<u64>,
        ignore_patterns: Vec<String>,
    ) -> Self {
        Self {
            skip_hidden,
            skip_empty: false,
            min_size,
            max_size,
            ignore_patterns,
        }
    }

    /// Enable or disable skipping of zero-length files.
    #[must_use]
    pub fn with_skip_empty(mut self, skip: bool) -> Self {
        self.skip_empty = skip;
        self
    }
}

/// A non-fatal problem with a single entry.
///
/// Entry errors are collected into the scan result; the scan carries on.
#[derive(thiserror::Error, Debug, Clone)]
pub enum EntryError {
    /// The entry could not be stat'ed or its directory could not be read.
    #[error("Unreadable entry {path}: {source}")]
    Unreadable {
        /// Path of the entry
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<io::Error>,
    },

    /// The file was enumerated but hashing it failed.
    #[error("Failed to hash {path}: {source}")]
    HashFailed {
        /// Path of the file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<io::Error>,
    },
}

impl EntryError {
    pub(crate) fn unreadable(path: &Path, source: io::Error) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn hash_failed(path: &Path, source: io::Error) -> Self {
        Self::HashFailed {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Unreadable { path, .. } | Self::HashFailed { path, .. } => path,
        }
    }

    /// Kind of the underlying I/O error.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Unreadable { source, .. } | Self::HashFailed { source, .. } => source.kind(),
        }
    }

    /// Whether this error was caused by cancellation rather than the filesystem.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.kind() == io::ErrorKind::Interrupted
    }
}

impl Serialize for EntryError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let kind = match self {
            Self::Unreadable { .. } => "unreadable",
            Self::HashFailed { .. } => "hash_failed",
        };
        let mut state = serializer.serialize_struct("EntryError", 3)?;
        state.serialize_field("kind", kind)?;
        state.serialize_field("path", &self.path().to_string_lossy())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Fatal errors that abort a scan.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScanError {
    /// The root does not exist, is not a directory, or cannot be listed.
    #[error("Invalid scan root {path}: {source}")]
    InvalidRoot {
        /// The root as given by the caller
        path: PathBuf,
        /// Why it was rejected
        #[source]
        source: Arc<io::Error>,
    },

    /// The scan was cancelled before it completed.
    #[error("Scan cancelled")]
    Cancelled,

    /// The hash worker pool could not be started.
    #[error("Failed to start hash workers: {0}")]
    WorkerPool(String),
}

impl ScanError {
    pub(crate) fn invalid_root(path: &Path, source: io::Error) -> Self {
        Self::InvalidRoot {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }
}
