//! Duplicate grouping: size buckets first, content hashes second.
//!
//! # Overview
//!
//! [`DuplicateIndex`] accumulates files one at a time in discovery order.
//!
//! 1. **Size buckets**: every file lands in the bucket for its exact size.
//!    A file alone in its bucket can never be a duplicate and is never
//!    hashed. When a bucket reaches two members both need hashing; every
//!    later member needs hashing as soon as it arrives.
//! 2. **Hash groups**: once hashes are recorded, [`DuplicateIndex::finalize`]
//!    splits each bucket by hash, drops singletons, and emits
//!    [`DuplicateSet`]s whose members are in discovery order regardless of
//!    the order hashes completed in.
//!
//! # Example
//!
//! ```
//! use dupe_detective::duplicates::DuplicateIndex;
//! use dupe_detective::scanner::FileRecord;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let mut index = DuplicateIndex::new();
//! let a = FileRecord::new(PathBuf::from("/a"), 5, SystemTime::now());
//! let b = FileRecord::new(PathBuf::from("/b"), 5, SystemTime::now());
//!
//! assert!(index.record_file(a).is_empty());
//! let to_hash = index.record_file(b);
//! assert_eq!(to_hash, vec![0, 1]);
//!
//! index.record_hash(1, [9; 32]);
//! index.record_hash(0, [9; 32]);
//! let sets = index.finalize();
//! assert_eq!(sets.len(), 1);
//! assert_eq!(sets[0].original().unwrap().path, PathBuf::from("/a"));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::scanner::{hash_to_hex, EntryError, FileRecord, Hash, Hasher};

/// Position of a file in discovery order.
pub type FileId = usize;

/// Files with identical size and content hash.
///
/// Sets handed to callers always have at least two members, ordered by
/// discovery. The first member is the "original" that
/// [`DuplicateSet::duplicates`] leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSet {
    /// BLAKE3 hash shared by every member
    pub hash: Hash,
    /// File size in bytes shared by every member
    pub size: u64,
    /// Members in discovery order
    pub members: Vec<FileRecord>,
}

impl DuplicateSet {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for sets produced by the index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// First-discovered member, `None` only for a hand-built empty set.
    #[must_use]
    pub fn original(&self) -> Option<&FileRecord> {
        self.members.first()
    }

    /// Every member except the first-discovered one.
    #[must_use]
    pub fn duplicates(&self) -> &[FileRecord] {
        self.members.get(1..).unwrap_or(&[])
    }

    /// Bytes that removing all but one copy would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicates().len() as u64
    }

    /// Hash as hexadecimal string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }

    /// Member paths in discovery order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.path.clone()).collect()
    }

    /// Whether `path` is a member of this set.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.members.iter().any(|m| m.path == path)
    }
}

/// Statistics from the size bucketing level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of files recorded
    pub total_files: usize,
    /// Total size of all recorded files in bytes
    pub total_size: u64,
    /// Number of distinct file sizes
    pub unique_sizes: usize,
    /// Files sharing their size with at least one other file
    pub potential_duplicates: usize,
    /// Files alone in their size bucket (never hashed)
    pub eliminated_unique: usize,
    /// Number of zero-length files
    pub empty_files: usize,
    /// Number of size buckets with 2+ files
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated by size alone.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashState {
    NotNeeded,
    Pending,
    Done(Hash),
    Failed,
}

#[derive(Debug)]
struct Slot {
    record: FileRecord,
    state: HashState,
}

/// Two-level size → hash index over discovered files.
///
/// Single writer: the scan coordinator owns the index and is the only code
/// that mutates it. Workers hand results back over a channel.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    slots: Vec<Slot>,
    by_size: HashMap<u64, Vec<FileId>>,
    pending: usize,
}

impl DuplicateIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly discovered file.
    ///
    /// Returns the ids that now need a content hash: none when the file is
    /// the first of its size, both members when the bucket reaches two, and
    /// only the new file afterwards.
    pub fn record_file(&mut self, record: FileRecord) -> Vec<FileId> {
        let id = self.slots.len();
        let bucket = self.by_size.entry(record.size).or_default();
        bucket.push(id);

        let mut needs_hash = Vec::new();
        if bucket.len() == 2 {
            needs_hash.push(bucket[0]);
        }
        if bucket.len() >= 2 {
            needs_hash.push(id);
        }

        self.slots.push(Slot {
            record,
            state: HashState::NotNeeded,
        });
        needs_hash.retain(|&pending| {
            let slot = &mut self.slots[pending];
            if slot.state == HashState::NotNeeded {
                slot.state = HashState::Pending;
                true
            } else {
                false
            }
        });
        self.pending += needs_hash.len();
        needs_hash
    }

    /// Record the content hash of a pending file.
    pub fn record_hash(&mut self, id: FileId, hash: Hash) {
        self.resolve(id, HashState::Done(hash));
    }

    /// Drop a pending file from grouping because it could not be hashed.
    pub fn record_failure(&mut self, id: FileId) {
        self.resolve(id, HashState::Failed);
    }

    fn resolve(&mut self, id: FileId, state: HashState) {
        if let Some(slot) = self.slots.get_mut(id) {
            if slot.state == HashState::Pending {
                self.pending -= 1;
            }
            if let HashState::Done(hash) = state {
                slot.record.content_hash = Some(hash);
            }
            slot.state = state;
        }
    }

    /// Record for a given id.
    #[must_use]
    pub fn record(&self, id: FileId) -> Option<&FileRecord> {
        self.slots.get(id).map(|s| &s.record)
    }

    /// Number of files recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no file has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of files still waiting for a hash result.
    #[must_use]
    pub fn pending_hashes(&self) -> usize {
        self.pending
    }

    /// Size bucketing statistics for the files recorded so far.
    #[must_use]
    pub fn stats(&self) -> GroupingStats {
        let mut stats = GroupingStats {
            total_files: self.slots.len(),
            unique_sizes: self.by_size.len(),
            ..Default::default()
        };
        for slot in &self.slots {
            stats.total_size += slot.record.size;
            if slot.record.size == 0 {
                stats.empty_files += 1;
            }
        }
        for bucket in self.by_size.values() {
            if bucket.len() > 1 {
                stats.duplicate_groups += 1;
                stats.potential_duplicates += bucket.len();
            } else {
                stats.eliminated_unique += 1;
            }
        }
        stats
    }

    /// Build the final duplicate sets.
    ///
    /// Members are ordered by discovery, singletons are pruned, and sets are
    /// ordered by the discovery position of their first member.
    #[must_use]
    pub fn finalize(self) -> Vec<DuplicateSet> {
        let mut slots: Vec<Option<Slot>> = self.slots.into_iter().map(Some).collect();
        let mut ordered: Vec<(FileId, DuplicateSet)> = Vec::new();

        for bucket in self.by_size.into_values() {
            if bucket.len() < 2 {
                continue;
            }

            let mut by_hash: HashMap<Hash, Vec<FileId>> = HashMap::new();
            let mut hash_order: Vec<Hash> = Vec::new();
            for &id in &bucket {
                if let Some(Slot {
                    state: HashState::Done(hash),
                    ..
                }) = slots[id]
                {
                    let ids = by_hash.entry(hash).or_default();
                    if ids.is_empty() {
                        hash_order.push(hash);
                    }
                    ids.push(id);
                }
            }

            for hash in hash_order {
                let Some(mut ids) = by_hash.remove(&hash) else {
                    continue;
                };
                if ids.len() < 2 {
                    continue;
                }
                ids.sort_unstable();
                let first = ids[0];
                let members: Vec<FileRecord> = ids
                    .iter()
                    .filter_map(|&id| slots[id].take().map(|s| s.record))
                    .collect();
                let size = members[0].size;
                log::debug!(
                    "Duplicate set {}: {} files, {} bytes each",
                    hash_to_hex(&hash),
                    members.len(),
                    size
                );
                ordered.push((first, DuplicateSet { hash, size, members }));
            }
        }

        ordered.sort_by_key(|(first, _)| *first);
        ordered.into_iter().map(|(_, set)| set).collect()
    }
}

/// Group files by size without hashing anything.
///
/// Returns only buckets with two or more files, each in input order, plus
/// statistics over all input files.
///
/// # Example
///
/// ```
/// use dupe_detective::scanner::FileRecord;
/// use dupe_detective::duplicates::group_by_size;
/// use std::path::PathBuf;
/// use std::time::SystemTime;
///
/// let files = vec![
///     FileRecord::new(PathBuf::from("/file1.txt"), 1024, SystemTime::now()),
///     FileRecord::new(PathBuf::from("/file2.txt"), 1024, SystemTime::now()),
///     FileRecord::new(PathBuf::from("/file3.txt"), 2048, SystemTime::now()),
/// ];
///
/// let (groups, stats) = group_by_size(files);
/// assert_eq!(stats.total_files, 3);
/// assert_eq!(stats.potential_duplicates, 2);
/// assert_eq!(groups.len(), 1);
/// ```
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileRecord>,
) -> (HashMap<u64, Vec<FileRecord>>, GroupingStats) {
    let mut index = DuplicateIndex::new();
    for file in files {
        index.record_file(file);
    }
    let stats = index.stats();

    let mut slots: Vec<Option<FileRecord>> =
        index.slots.into_iter().map(|s| Some(s.record)).collect();
    let groups = index
        .by_size
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(size, ids)| {
            let files = ids.into_iter().filter_map(|id| slots[id].take()).collect();
            (size, files)
        })
        .collect();

    log::info!(
        "Size grouping: {} files → {} potential duplicates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (groups, stats)
}

/// Confirm a set byte-for-byte.
///
/// Members are partitioned into classes of identical content, compared
/// against the first member of each class. Classes with fewer than two
/// members are dropped; unreadable members are dropped and reported.
/// Discovery order is preserved within each resulting set.
#[must_use]
pub fn verify_set(set: DuplicateSet, hasher: &Hasher) -> (Vec<DuplicateSet>, Vec<EntryError>) {
    let mut classes: Vec<Vec<FileRecord>> = Vec::new();
    let mut errors = Vec::new();

    'members: for member in set.members {
        for class in classes.iter_mut() {
            match hasher.same_content(&class[0].path, &member.path) {
                Ok(true) => {
                    class.push(member);
                    continue 'members;
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Verification failed for {}: {}", member.path.display(), e);
                    errors.push(e);
                    continue 'members;
                }
            }
        }
        classes.push(vec![member]);
    }

    if classes.len() > 1 {
        log::warn!(
            "Hash collision: set {} split into {} content classes",
            hash_to_hex(&set.hash),
            classes.len()
        );
    }

    let sets = classes
        .into_iter()
        .filter(|members| members.len() > 1)
        .map(|members| DuplicateSet {
            hash: set.hash,
            size: set.size,
            members,
        })
        .collect();
    (sets, errors)
}
