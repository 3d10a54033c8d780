//! Duplicate detection.
//!
//! - [`groups`]: the size/hash index and duplicate set types
//! - [`finder`]: the scan coordinator that drives walking and hashing

pub mod finder;
pub mod groups;

pub use finder::{
    default_workers, start_scan, DuplicateFinder, FinderConfig, ScanHandle, ScanResult,
};
pub use groups::{group_by_size, verify_set, DuplicateIndex, DuplicateSet, FileId, GroupingStats};
