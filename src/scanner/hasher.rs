//! File fingerprinting: a cheap size key and a streamed BLAKE3 content hash.
//!
//! Files are read in fixed-size chunks so that memory stays bounded no
//! matter how large the file is, and so that a cancellation request is
//! observed between chunks rather than after the whole file.
//!
//! # Example
//!
//! ```no_run
//! use dupe_detective::scanner::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hash = hasher.hash(Path::new("Cargo.toml")).unwrap();
//! println!("{}", hash_to_hex(&hash));
//! ```

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::EntryError;

/// BLAKE3 digest (256 bits).
pub type Hash = [u8; 32];

/// Default read chunk size (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const MIN_CHUNK_SIZE: usize = 4 * 1024;
const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Computes fingerprints for files.
///
/// Cloning is cheap; clones share the cancellation flag.
#[derive(Debug, Clone)]
pub struct Hasher {
    chunk_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default chunk size and no cancellation flag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            shutdown_flag: None,
        }
    }

    /// Set the read chunk size, clamped to 4 KiB..=1 MiB.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        self
    }

    /// Abort in-flight reads when `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Configured chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn check_cancelled(&self) -> io::Result<()> {
        if self.is_shutdown_requested() {
            Err(io::Error::new(io::ErrorKind::Interrupted, "scan cancelled"))
        } else {
            Ok(())
        }
    }

    /// Size key: the length reported by `lstat`, without reading content.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::Unreadable`] if the file cannot be stat'ed.
    pub fn size(&self, path: &Path) -> Result<u64, EntryError> {
        fs::symlink_metadata(path)
            .map(|m| m.len())
            .map_err(|e| EntryError::unreadable(path, e))
    }

    /// Strong key: BLAKE3 over the entire content, streamed in chunks.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::HashFailed`] if the file vanished, became
    /// unreadable, failed mid-read, or the scan was cancelled (in which
    /// case the error kind is [`io::ErrorKind::Interrupted`]).
    pub fn hash(&self, path: &Path) -> Result<Hash, EntryError> {
        self.hash_inner(path)
            .map_err(|e| EntryError::hash_failed(path, e))
    }

    fn hash_inner(&self, path: &Path) -> io::Result<Hash> {
        self.check_cancelled()?;
        let mut file = File::open(path)?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            self.check_cancelled()?;
            let n = read_chunk(&mut file, &mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(*hasher.finalize().as_bytes())
    }

    /// Byte-for-byte comparison of two files.
    ///
    /// Used to confirm hash matches when content verification is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::HashFailed`] naming whichever file failed to read.
    pub fn same_content(&self, a: &Path, b: &Path) -> Result<bool, EntryError> {
        self.check_cancelled()
            .map_err(|e| EntryError::hash_failed(a, e))?;
        let mut file_a = File::open(a).map_err(|e| EntryError::hash_failed(a, e))?;
        let mut file_b = File::open(b).map_err(|e| EntryError::hash_failed(b, e))?;
        let mut buf_a = vec![0u8; self.chunk_size];
        let mut buf_b = vec![0u8; self.chunk_size];

        loop {
            self.check_cancelled()
                .map_err(|e| EntryError::hash_failed(a, e))?;
            let n_a = fill(&mut file_a, &mut buf_a).map_err(|e| EntryError::hash_failed(a, e))?;
            let n_b = fill(&mut file_b, &mut buf_b).map_err(|e| EntryError::hash_failed(b, e))?;
            if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
                return Ok(false);
            }
            if n_a == 0 {
                return Ok(true);
            }
        }
    }
}

/// Single read, retrying on EINTR so that only the cancel flag produces
/// `Interrupted`.
fn read_chunk(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buffer) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Read until `buffer` is full or EOF. Returns the number of bytes read.
fn fill(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buffer.len() {
        let n = read_chunk(reader, &mut buffer[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Lowercase hexadecimal rendering of a hash.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    use std::fmt::Write;

    hash.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Parse a 64-character hex string back into a hash.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    let mut hash = [0u8; 32];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(hash)
}
