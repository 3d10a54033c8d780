//! Scan coordinator: walk, hash and group concurrently.
//!
//! # Overview
//!
//! A scan runs on its own thread (the coordinator) and proceeds as:
//!
//! 1. **Enumerate**: the coordinator pulls records from the [`Walker`] and
//!    feeds them into the [`DuplicateIndex`]. As soon as a size bucket has
//!    two members, their paths go onto a bounded job queue.
//! 2. **Hash**: a dedicated rayon pool runs `workers` long-lived hash
//!    workers that read jobs from the queue and send `(id, result)` back
//!    on a result channel. Hashing overlaps enumeration.
//! 3. **Group**: only the coordinator touches the index. Once the walk is
//!    done and every outstanding hash has come back, the index is
//!    finalized into discovery-ordered [`DuplicateSet`]s.
//! 4. **Verify** (optional): sets are confirmed byte-for-byte and split if
//!    any member differs.
//!
//! Cancellation flips a shared flag: the walker stops, the hasher aborts
//! between chunks, and the scan resolves to [`ScanError::Cancelled`]. A
//! cancelled scan never publishes a partial result.
//!
//! # Example
//!
//! ```no_run
//! use dupe_detective::duplicates::{start_scan, FinderConfig};
//! use std::path::Path;
//!
//! let handle = start_scan(Path::new("/some/path"), FinderConfig::default()).unwrap();
//! // handle.cancel() from another thread stops the scan
//! let result = handle.result().unwrap();
//! println!("Found {} duplicate sets", result.sets.len());
//! ```

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rayon::prelude::*;

use super::groups::{verify_set, DuplicateIndex, DuplicateSet, FileId};
use crate::progress::{emit, ScanPhase, ScanProgress};
use crate::scanner::{
    EntryError, Hash, Hasher, ScanError, Walker, WalkerConfig, DEFAULT_CHUNK_SIZE,
};

/// Files larger than this are logged when hashed.
const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Job queue slots per worker when no capacity is configured.
const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// Number of logical CPUs, falling back to 4.
#[must_use]
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(4, NonZeroUsize::get)
}

/// Configuration for a scan.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of concurrent hash workers.
    pub workers: usize,
    /// Capacity of the hash job queue. `0` means `workers * 4`.
    pub queue_capacity: usize,
    /// Read chunk size for hashing.
    pub chunk_size: usize,
    /// Confirm hash matches byte-for-byte before reporting them.
    pub verify_content: bool,
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Optional external cancellation flag (e.g. wired to Ctrl+C).
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress event sink.
    pub progress: Option<Sender<ScanProgress>>,
}

impl fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderConfig")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("chunk_size", &self.chunk_size)
            .field("verify_content", &self.verify_content)
            .field("walker_config", &self.walker_config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress", &self.progress.as_ref().map(|_| "<channel>"))
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_content: false,
            walker_config: WalkerConfig::default(),
            shutdown_flag: None,
            progress: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of hash workers (at least one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the job queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the hashing chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Enable byte-for-byte verification of hash matches.
    #[must_use]
    pub fn with_verify_content(mut self, enabled: bool) -> Self {
        self.verify_content = enabled;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Share an external cancellation flag with the scan.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Deliver progress events to `sender`.
    #[must_use]
    pub fn with_progress(mut self, sender: Sender<ScanProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    fn effective_queue_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            self.workers.max(1) * QUEUE_SLOTS_PER_WORKER
        } else {
            self.queue_capacity
        }
    }
}

/// Immutable outcome of a completed scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Canonical root that was scanned
    pub root: PathBuf,
    /// Duplicate sets, ordered by discovery of their first member
    pub sets: Vec<DuplicateSet>,
    /// Regular files enumerated
    pub files_scanned: u64,
    /// Total size of enumerated files
    pub bytes_scanned: u64,
    /// Files whose content was hashed
    pub files_hashed: u64,
    /// Bytes read by the hasher
    pub bytes_hashed: u64,
    /// Non-fatal per-entry errors
    pub errors: Vec<EntryError>,
    /// Wall-clock duration of the scan
    pub duration: Duration,
    /// Whether sets were confirmed byte-for-byte
    pub verified: bool,
}

impl ScanResult {
    /// Whether any duplicate set was found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.sets.is_empty()
    }

    /// Number of redundant copies across all sets.
    #[must_use]
    pub fn duplicate_files(&self) -> usize {
        self.sets.iter().map(|s| s.duplicates().len()).sum()
    }

    /// Bytes freed by keeping one copy of every set.
    #[must_use]
    pub fn reclaimable_space(&self) -> u64 {
        self.sets.iter().map(DuplicateSet::wasted_space).sum()
    }

    /// Every member except the first-discovered one of each set.
    ///
    /// This is the default "keep the original" selection; it is only a
    /// suggestion and callers may pick any members they like.
    #[must_use]
    pub fn select_all_but_first(&self) -> Vec<PathBuf> {
        self.sets
            .iter()
            .flat_map(|s| s.duplicates().iter().map(|m| m.path.clone()))
            .collect()
    }

    /// Set that contains `path`, if any.
    #[must_use]
    pub fn set_containing(&self, path: &Path) -> Option<&DuplicateSet> {
        self.sets.iter().find(|s| s.contains(path))
    }
}

/// Handle to a running scan.
#[derive(Debug)]
pub struct ScanHandle {
    root: PathBuf,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<Result<ScanResult, ScanError>>,
}

impl ScanHandle {
    /// Request cancellation. Idempotent, and harmless once the scan is done.
    pub fn cancel(&self) {
        if !self.cancel.swap(true, Ordering::SeqCst) {
            log::info!("Cancellation requested for scan of {}", self.root.display());
        }
    }

    /// Whether the scan thread has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Canonical root being scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Block until the scan completes.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Cancelled`] if the scan was cancelled, or
    /// [`ScanError::WorkerPool`] if workers could not start.
    pub fn result(self) -> Result<ScanResult, ScanError> {
        self.thread
            .join()
            .unwrap_or_else(|_| Err(ScanError::WorkerPool("scan thread panicked".to_string())))
    }
}

/// Start scanning `root` in the background.
///
/// The root is validated synchronously so that an invalid root fails
/// before any work is started.
///
/// # Errors
///
/// Returns [`ScanError::InvalidRoot`] if the root does not exist, is not a
/// directory, or cannot be read.
pub fn start_scan(root: &Path, config: FinderConfig) -> Result<ScanHandle, ScanError> {
    let root = Walker::canonical_root(root)?;
    let cancel = config
        .shutdown_flag
        .clone()
        .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

    let thread = {
        let root = root.clone();
        let cancel = Arc::clone(&cancel);
        thread::Builder::new()
            .name("dd-scan".to_string())
            .spawn(move || run_scan(root, config, cancel))
            .map_err(|e| ScanError::WorkerPool(e.to_string()))?
    };

    Ok(ScanHandle {
        root,
        cancel,
        thread,
    })
}

/// Hash job: discovery id and path.
type Job = (FileId, PathBuf);
/// Hash result for a job.
type JobResult = (FileId, Result<Hash, EntryError>);

/// Coordinator-side scan state. Owned by a single thread.
struct Coordinator {
    index: DuplicateIndex,
    errors: Vec<EntryError>,
    files_scanned: u64,
    bytes_scanned: u64,
    files_hashed: u64,
    bytes_hashed: u64,
    progress: Option<Sender<ScanProgress>>,
}

impl Coordinator {
    fn new(progress: Option<Sender<ScanProgress>>) -> Self {
        Self {
            index: DuplicateIndex::new(),
            errors: Vec::new(),
            files_scanned: 0,
            bytes_scanned: 0,
            files_hashed: 0,
            bytes_hashed: 0,
            progress,
        }
    }

    fn report(&mut self, phase: ScanPhase) {
        if let Some(ref sender) = self.progress {
            let event = ScanProgress {
                files_scanned: self.files_scanned,
                bytes_scanned: self.bytes_scanned,
                files_hashed: self.files_hashed,
                phase,
            };
            if !emit(sender, event) {
                log::debug!("Progress receiver dropped, no further events");
                self.progress = None;
            }
        }
    }

    fn apply(&mut self, (id, result): JobResult) {
        match result {
            Ok(hash) => {
                self.files_hashed += 1;
                self.bytes_hashed += self.index.record(id).map_or(0, |r| r.size);
                self.index.record_hash(id, hash);
            }
            Err(e) if e.is_interrupted() => {
                self.index.record_failure(id);
            }
            Err(e) => {
                log::warn!("{}", e);
                self.index.record_failure(id);
                self.errors.push(e);
            }
        }
    }

    fn drain(&mut self, results: &Receiver<JobResult>) {
        while let Ok(result) = results.try_recv() {
            self.apply(result);
        }
    }
}

fn is_cancelled(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}

fn run_scan(
    root: PathBuf,
    config: FinderConfig,
    cancel: Arc<AtomicBool>,
) -> Result<ScanResult, ScanError> {
    let start_time = Instant::now();
    let workers = config.workers.max(1);

    log::info!(
        "Starting duplicate scan of {} with {} hash workers",
        root.display(),
        workers
    );

    if is_cancelled(&cancel) {
        return Err(ScanError::Cancelled);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("dd-hash-{i}"))
        .build()
        .map_err(|e| ScanError::WorkerPool(e.to_string()))?;

    let hasher = Hasher::new()
        .with_chunk_size(config.chunk_size)
        .with_shutdown_flag(Arc::clone(&cancel));

    let (job_tx, job_rx) = bounded::<Job>(config.effective_queue_capacity());
    let (result_tx, result_rx) = unbounded::<JobResult>();

    for _ in 0..workers {
        let jobs = job_rx.clone();
        let results = result_tx.clone();
        let hasher = hasher.clone();
        pool.spawn(move || hash_worker(&jobs, &results, &hasher));
    }
    drop(job_rx);
    drop(result_tx);

    let mut state = Coordinator::new(config.progress.clone());
    let walker = Walker::new(&root, config.walker_config.clone())
        .with_shutdown_flag(Arc::clone(&cancel));

    state.report(ScanPhase::Enumerating);
    for entry in walker.walk() {
        match entry {
            Ok(record) => {
                state.files_scanned += 1;
                state.bytes_scanned += record.size;
                for id in state.index.record_file(record) {
                    let Some(path) = state.index.record(id).map(|r| r.path.clone()) else {
                        continue;
                    };
                    // Workers never block on the unbounded result channel,
                    // so a full queue always drains.
                    if job_tx.send((id, path)).is_err() {
                        return Err(ScanError::WorkerPool("hash workers exited".to_string()));
                    }
                }
            }
            Err(e) => state.errors.push(e),
        }
        state.drain(&result_rx);
        state.report(ScanPhase::Enumerating);
    }
    drop(job_tx);

    if is_cancelled(&cancel) {
        log::info!("Scan of {} cancelled during enumeration", root.display());
        return Err(ScanError::Cancelled);
    }

    let stats = state.index.stats();
    log::info!(
        "Enumeration complete: {} files → {} potential duplicates ({:.1}% eliminated by size)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    state.report(ScanPhase::Hashing);
    for result in result_rx.iter() {
        state.apply(result);
        state.report(ScanPhase::Hashing);
    }

    if is_cancelled(&cancel) {
        log::info!("Scan of {} cancelled while hashing", root.display());
        return Err(ScanError::Cancelled);
    }
    debug_assert_eq!(state.index.pending_hashes(), 0);

    let Coordinator {
        index,
        mut errors,
        files_scanned,
        bytes_scanned,
        files_hashed,
        bytes_hashed,
        progress,
    } = state;
    let mut sets = index.finalize();

    if config.verify_content && !sets.is_empty() {
        if let Some(ref sender) = progress {
            emit(
                sender,
                ScanProgress {
                    files_scanned,
                    bytes_scanned,
                    files_hashed,
                    phase: ScanPhase::Verifying,
                },
            );
        }
        log::info!("Verifying {} duplicate sets byte-for-byte", sets.len());

        let verified: Vec<(Vec<DuplicateSet>, Vec<EntryError>)> = pool.install(|| {
            sets.into_par_iter()
                .map(|set| verify_set(set, &hasher))
                .collect()
        });

        if is_cancelled(&cancel) {
            return Err(ScanError::Cancelled);
        }

        sets = Vec::new();
        for (split, verify_errors) in verified {
            sets.extend(split);
            errors.extend(verify_errors);
        }
    }

    if is_cancelled(&cancel) {
        return Err(ScanError::Cancelled);
    }

    let result = ScanResult {
        root,
        sets,
        files_scanned,
        bytes_scanned,
        files_hashed,
        bytes_hashed,
        errors,
        duration: start_time.elapsed(),
        verified: config.verify_content,
    };

    log::info!(
        "Scan complete: {} files, {} duplicate sets, {} redundant copies, {} bytes reclaimable, {} errors in {:.2?}",
        result.files_scanned,
        result.sets.len(),
        result.duplicate_files(),
        result.reclaimable_space(),
        result.errors.len(),
        result.duration
    );

    Ok(result)
}

fn hash_worker(jobs: &Receiver<Job>, results: &Sender<JobResult>, hasher: &Hasher) {
    for (id, path) in jobs {
        if let Ok(size) = hasher.size(&path) {
            if size > LARGE_FILE_THRESHOLD {
                log::debug!(
                    "Hashing large file ({} MB): {}",
                    size / (1024 * 1024),
                    path.display()
                );
            }
        }
        let result = hasher.hash(&path);
        if results.send((id, result)).is_err() {
            break;
        }
    }
}

/// Convenience wrapper owning a configuration.
///
/// # Example
///
/// ```no_run
/// use dupe_detective::duplicates::{DuplicateFinder, FinderConfig};
/// use std::path::Path;
///
/// let finder = DuplicateFinder::new(FinderConfig::default().with_workers(4));
/// let result = finder.scan(Path::new("/some/path")).unwrap();
/// println!("Reclaimable: {} bytes", result.reclaimable_space());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// The finder's configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Start a background scan of `root`.
    ///
    /// # Errors
    ///
    /// See [`start_scan`].
    pub fn start_scan(&self, root: &Path) -> Result<ScanHandle, ScanError> {
        start_scan(root, self.config.clone())
    }

    /// Scan `root` and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the root is invalid or the scan is cancelled.
    pub fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        self.start_scan(root)?.result()
    }
}
