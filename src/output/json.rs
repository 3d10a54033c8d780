//! JSON report for scripting.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "root": "/data",
//!   "duplicates": [
//!     {
//!       "hash": "ea8f163d...",
//!       "size": 5,
//!       "wasted_space": 5,
//!       "files": ["/data/a/x.txt", "/data/b/y.txt"]
//!     }
//!   ],
//!   "errors": [
//!     { "kind": "unreadable", "path": "/data/secret", "message": "..." }
//!   ],
//!   "summary": {
//!     "files_scanned": 3,
//!     "bytes_scanned": 15,
//!     "files_hashed": 2,
//!     "bytes_hashed": 10,
//!     "duplicate_sets": 1,
//!     "duplicate_files": 1,
//!     "reclaimable_space": 5,
//!     "scan_duration_ms": 4,
//!     "verified": false,
//!     "error_count": 1,
//!     "exit_code": 3,
//!     "exit_code_name": "DD003"
//!   },
//!   "deletion": null
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::actions::{DeletionOutcome, DeletionReport};
use crate::duplicates::{DuplicateSet, ScanResult};
use crate::error::ExitCode;
use crate::scanner::EntryError;

/// One duplicate set.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateSet {
    /// BLAKE3 hash as 64 hex characters
    pub hash: String,
    /// Size of each member in bytes
    pub size: u64,
    /// Bytes held by redundant copies
    pub wasted_space: u64,
    /// Member paths, first-discovered first
    pub files: Vec<String>,
}

impl From<&DuplicateSet> for JsonDuplicateSet {
    fn from(set: &DuplicateSet) -> Self {
        Self {
            hash: set.hash_hex(),
            size: set.size,
            wasted_space: set.wasted_space(),
            files: set
                .members
                .iter()
                .map(|m| m.path.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Scan statistics.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    pub files_scanned: u64,
    pub bytes_scanned: u64,
    pub files_hashed: u64,
    pub bytes_hashed: u64,
    pub duplicate_sets: usize,
    pub duplicate_files: usize,
    pub reclaimable_space: u64,
    pub scan_duration_ms: u64,
    pub verified: bool,
    pub error_count: usize,
    pub exit_code: i32,
    pub exit_code_name: String,
}

impl JsonSummary {
    fn new(result: &ScanResult, exit_code: ExitCode) -> Self {
        Self {
            files_scanned: result.files_scanned,
            bytes_scanned: result.bytes_scanned,
            files_hashed: result.files_hashed,
            bytes_hashed: result.bytes_hashed,
            duplicate_sets: result.sets.len(),
            duplicate_files: result.duplicate_files(),
            reclaimable_space: result.reclaimable_space(),
            scan_duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            verified: result.verified,
            error_count: result.errors.len(),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Result for one requested deletion.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDeletionOutcome {
    pub path: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DeletionOutcome> for JsonDeletionOutcome {
    fn from(outcome: &DeletionOutcome) -> Self {
        Self {
            path: outcome.path.to_string_lossy().into_owned(),
            succeeded: outcome.succeeded,
            error_kind: outcome.cause.as_ref().map(|c| c.kind()),
            error: outcome.cause.as_ref().map(ToString::to_string),
        }
    }
}

/// Deletion results.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDeletion {
    pub permanent: bool,
    pub deleted: usize,
    pub failed: usize,
    pub bytes_freed: u64,
    pub outcomes: Vec<JsonDeletionOutcome>,
}

impl From<&DeletionReport> for JsonDeletion {
    fn from(report: &DeletionReport) -> Self {
        Self {
            permanent: report.permanent,
            deleted: report.success_count(),
            failed: report.failure_count(),
            bytes_freed: report.bytes_freed,
            outcomes: report.outcomes.iter().map(Into::into).collect(),
        }
    }
}

/// Complete scan report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    pub root: String,
    pub duplicates: Vec<JsonDuplicateSet>,
    pub errors: &'a [EntryError],
    pub summary: JsonSummary,
    pub deletion: Option<JsonDeletion>,
}

impl<'a> JsonReport<'a> {
    /// Build a report for a finished scan.
    #[must_use]
    pub fn new(result: &'a ScanResult, exit_code: ExitCode) -> Self {
        Self {
            root: result.root.to_string_lossy().into_owned(),
            duplicates: result.sets.iter().map(Into::into).collect(),
            errors: &result.errors,
            summary: JsonSummary::new(result, exit_code),
            deletion: None,
        }
    }

    /// Attach the results of deleting duplicates after the scan.
    #[must_use]
    pub fn with_deletion(mut self, report: &DeletionReport) -> Self {
        self.deletion = Some(report.into());
        self
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        write_json(writer, self)
    }
}

/// Write any report value as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<(), JsonOutputError> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON output: {0}")]
    Io(#[from] std::io::Error),
}
