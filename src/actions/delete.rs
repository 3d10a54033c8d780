//! Two-phase deletion of duplicate copies.
//!
//! # Overview
//!
//! A scan result is a snapshot of a filesystem that keeps changing, so
//! deletion never trusts it directly:
//!
//! 1. [`DeletionPlanner::plan`] re-validates every selected path against
//!    the filesystem as it is *now* and against the scanned sets. A file
//!    whose size or mtime no longer matches its scan record is rejected, and
//!    only members that still match count as surviving copies. Paths that
//!    fail are rejected with a cause; the rest are approved together with a
//!    [`FileSnapshot`] of their size and mtime.
//! 2. The caller confirms (the CLI prompts here).
//! 3. [`execute_plan`] removes approved paths one at a time, re-checking
//!    each snapshot and at least one surviving copy immediately before
//!    removal. A failure on one path never stops the others.
//!
//! Every requested path ends up as exactly one [`DeletionOutcome`] in the
//! [`DeletionReport`].
//!
//! # Example
//!
//! ```no_run
//! use dupe_detective::actions::delete::{execute_plan, DeleteConfig, DeletionPlanner};
//! use dupe_detective::duplicates::DuplicateFinder;
//! use std::path::Path;
//!
//! let result = DuplicateFinder::with_defaults().scan(Path::new("/data")).unwrap();
//! let plan = DeletionPlanner::from_result(&result).plan(&result.select_all_but_first());
//! let report = execute_plan(plan, &DeleteConfig::default(), None);
//! println!("{}", report.summary());
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

use crate::duplicates::ScanResult;
use crate::scanner::path_utils::{has_parent_component, is_within_any};
use crate::scanner::FileRecord;

/// Why a path was not deleted.
///
/// The first group of variants are rejections (the path was never
/// touched); the rest are failures of an attempted removal. See
/// [`DeleteError::is_rejection`].
#[derive(Debug, Clone, Error)]
pub enum DeleteError {
    /// File no longer exists.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Path is a directory, device, socket or other non-regular file.
    #[error("not a regular file: {0}")]
    NotRegularFile(PathBuf),

    /// Path is a symbolic link.
    #[error("refusing to delete symbolic link: {0}")]
    Symlink(PathBuf),

    /// Path lies outside every scanned root, or its directory now resolves
    /// somewhere else.
    #[error("path is outside the scanned tree: {0}")]
    OutsideScannedTree(PathBuf),

    /// Path is relative or contains `..`.
    #[error("path must be absolute without '..' components: {0}")]
    RelativePath(PathBuf),

    /// Path was selected more than once.
    #[error("path selected more than once: {0}")]
    DuplicateSelection(PathBuf),

    /// Deleting the path would remove the last intact copy of its content.
    #[error("cannot delete the last remaining copy: {0}")]
    LastCopy(PathBuf),

    /// File changed since it was scanned or planned.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Permanent removal failed.
    #[error("failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// Moving to the trash failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },
}

impl DeleteError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::RemoveFailed {
                path: path.to_path_buf(),
                source: Arc::new(error),
            },
        }
    }

    /// Path this error is about.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::NotRegularFile(p)
            | Self::Symlink(p)
            | Self::OutsideScannedTree(p)
            | Self::RelativePath(p)
            | Self::DuplicateSelection(p)
            | Self::LastCopy(p)
            | Self::Modified(p)
            | Self::PermissionDenied(p)
            | Self::RemoveFailed { path: p, .. }
            | Self::TrashFailed { path: p, .. } => p,
        }
    }

    /// Whether the path was refused by validation rather than failing
    /// during removal.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::NotRegularFile(_)
                | Self::Symlink(_)
                | Self::OutsideScannedTree(_)
                | Self::RelativePath(_)
                | Self::DuplicateSelection(_)
                | Self::LastCopy(_)
                | Self::Modified(_)
        )
    }

    /// Short machine-readable name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NotRegularFile(_) => "not_regular_file",
            Self::Symlink(_) => "symlink",
            Self::OutsideScannedTree(_) => "outside_scanned_tree",
            Self::RelativePath(_) => "relative_path",
            Self::DuplicateSelection(_) => "duplicate_selection",
            Self::LastCopy(_) => "last_copy",
            Self::Modified(_) => "modified",
            Self::PermissionDenied(_) => "permission_denied",
            Self::RemoveFailed { .. } => "remove_failed",
            Self::TrashFailed { .. } => "trash_failed",
        }
    }
}

/// Size and mtime of a regular file at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileSnapshot {
    /// Scan-time state of a discovered file.
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            size: record.size,
            mtime: Some(record.modified),
        }
    }

    /// Capture the current state of a regular file.
    ///
    /// Symlinks are not followed.
    ///
    /// # Errors
    ///
    /// `NotFound`, `PermissionDenied`, `Symlink` or `NotRegularFile`.
    pub fn capture(path: &Path) -> Result<Self, DeleteError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;

        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            return Err(DeleteError::Symlink(path.to_path_buf()));
        }
        if !file_type.is_file() {
            return Err(DeleteError::NotRegularFile(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    /// Verify that the file still matches this snapshot.
    ///
    /// # Errors
    ///
    /// Any [`capture`](Self::capture) error, or `Modified` if the size or
    /// mtime changed.
    pub fn verify(&self) -> Result<(), DeleteError> {
        self.compare(&Self::capture(&self.path)?)
    }

    /// Check that `current` has the same size and mtime as this snapshot.
    ///
    /// # Errors
    ///
    /// `Modified` if either differs.
    pub fn compare(&self, current: &FileSnapshot) -> Result<(), DeleteError> {
        if let (Some(orig), Some(curr)) = (self.mtime, current.mtime) {
            if orig != curr {
                log::warn!(
                    "File modified since scan: {} (mtime changed)",
                    self.path.display()
                );
                return Err(DeleteError::Modified(self.path.clone()));
            }
        }

        if self.size != current.size {
            log::warn!(
                "File modified since scan: {} (size changed from {} to {})",
                self.path.display(),
                self.size,
                current.size
            );
            return Err(DeleteError::Modified(self.path.clone()));
        }

        Ok(())
    }
}

/// An approved deletion.
#[derive(Debug, Clone)]
pub struct PlannedDeletion {
    /// Position in the original selection.
    pub index: usize,
    /// Path as selected.
    pub path: PathBuf,
    /// State at planning time, keyed by the resolved path that is removed.
    pub snapshot: FileSnapshot,
    /// Scan records of set members left in place. At least one must still
    /// match when this file is removed; empty when nothing is protected.
    pub survivors: Vec<FileSnapshot>,
}

/// A refused deletion.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// Position in the original selection.
    pub index: usize,
    /// Path as selected.
    pub path: PathBuf,
    /// Why it was refused.
    pub cause: DeleteError,
}

/// Output of [`DeletionPlanner::plan`].
#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    /// Paths cleared for removal, in selection order.
    pub approved: Vec<PlannedDeletion>,
    /// Paths refused, in selection order.
    pub rejections: Vec<Rejection>,
}

impl DeletionPlan {
    /// Whether nothing was approved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.approved.is_empty()
    }

    /// Total size of approved files.
    #[must_use]
    pub fn approved_bytes(&self) -> u64 {
        self.approved.iter().map(|d| d.snapshot.size).sum()
    }

    /// Paths cleared for removal.
    #[must_use]
    pub fn approved_paths(&self) -> Vec<&Path> {
        self.approved.iter().map(|d| d.path.as_path()).collect()
    }
}

/// Validates deletion selections.
#[derive(Debug, Clone, Default)]
pub struct DeletionPlanner {
    roots: Vec<PathBuf>,
    sets: Vec<Vec<FileSnapshot>>,
    set_of: HashMap<PathBuf, usize>,
    scanned: bool,
    allow_last_copy: bool,
}

impl DeletionPlanner {
    /// Planner for arbitrary paths under `roots`, with no set knowledge.
    ///
    /// Without a scan there is nothing to compare against, so the last-copy
    /// rule cannot apply. Use [`from_result`](Self::from_result) whenever a
    /// scan is available.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let roots = roots
            .into_iter()
            .map(|root| fs::canonicalize(&root).unwrap_or(root))
            .collect();
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Planner that knows the root and sets of a completed scan.
    ///
    /// Scanned files that belong to no set are treated as the only copy of
    /// their content.
    #[must_use]
    pub fn from_result(result: &ScanResult) -> Self {
        let sets: Vec<Vec<FileSnapshot>> = result
            .sets
            .iter()
            .map(|set| set.members.iter().map(FileSnapshot::from_record).collect())
            .collect();
        let set_of = sets
            .iter()
            .enumerate()
            .flat_map(|(i, members)| members.iter().map(move |m| (m.path.clone(), i)))
            .collect();
        Self {
            roots: vec![result.root.clone()],
            sets,
            set_of,
            scanned: true,
            allow_last_copy: false,
        }
    }

    /// Allow selections that remove every copy of a set.
    #[must_use]
    pub fn with_allow_last_copy(mut self, allow: bool) -> Self {
        self.allow_last_copy = allow;
        self
    }

    /// Roots that deletions must stay inside.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Validate `paths` against the filesystem and the known sets.
    #[must_use]
    pub fn plan(&self, paths: &[PathBuf]) -> DeletionPlan {
        let mut plan = DeletionPlan::default();
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for (index, path) in paths.iter().enumerate() {
            match self.check(path, &mut seen) {
                Ok(snapshot) => candidates.push((index, snapshot)),
                Err(cause) => {
                    log::debug!("Rejected {}: {}", path.display(), cause);
                    plan.rejections.push(Rejection {
                        index,
                        path: path.clone(),
                        cause,
                    });
                }
            }
        }

        // Per set, how many more members may go while one intact copy survives.
        let mut budgets: HashMap<usize, usize> = HashMap::new();
        for (index, snapshot) in candidates {
            let path = paths[index].clone();
            if !self.allow_last_copy {
                let allowed = match self.set_of.get(&snapshot.path) {
                    Some(&set) => {
                        let budget = budgets
                            .entry(set)
                            .or_insert_with(|| self.surviving_members(set).saturating_sub(1));
                        let allowed = *budget > 0;
                        *budget = budget.saturating_sub(1);
                        allowed
                    }
                    None => !self.scanned,
                };
                if !allowed {
                    log::warn!("Refusing to delete last copy: {}", path.display());
                    plan.rejections.push(Rejection {
                        index,
                        cause: DeleteError::LastCopy(path.clone()),
                        path,
                    });
                    continue;
                }
            }
            plan.approved.push(PlannedDeletion {
                index,
                path,
                snapshot,
                survivors: Vec::new(),
            });
        }

        if !self.allow_last_copy {
            let doomed: HashSet<PathBuf> =
                plan.approved.iter().map(|d| d.snapshot.path.clone()).collect();
            for deletion in &mut plan.approved {
                if let Some(&set) = self.set_of.get(&deletion.snapshot.path) {
                    deletion.survivors = self.sets[set]
                        .iter()
                        .filter(|m| !doomed.contains(&m.path))
                        .cloned()
                        .collect();
                }
            }
        }
        plan.rejections.sort_by_key(|r| r.index);

        log::info!(
            "Deletion plan: {} approved, {} rejected",
            plan.approved.len(),
            plan.rejections.len()
        );
        plan
    }

    fn check(&self, path: &Path, seen: &mut HashSet<PathBuf>) -> Result<FileSnapshot, DeleteError> {
        if !path.is_absolute() || has_parent_component(path) {
            return Err(DeleteError::RelativePath(path.to_path_buf()));
        }

        let resolved = resolve_parent(path)?;
        if !seen.insert(resolved.clone()) {
            return Err(DeleteError::DuplicateSelection(path.to_path_buf()));
        }
        if !is_within_any(&resolved, &self.roots) {
            return Err(DeleteError::OutsideScannedTree(path.to_path_buf()));
        }

        let snapshot = FileSnapshot::capture(&resolved)?;
        if let Some(recorded) = self.recorded(&resolved) {
            recorded.compare(&snapshot)?;
        }
        Ok(snapshot)
    }

    fn recorded(&self, path: &Path) -> Option<&FileSnapshot> {
        let &set = self.set_of.get(path)?;
        self.sets[set].iter().find(|m| m.path == path)
    }

    /// Members still holding their scanned size and mtime.
    fn surviving_members(&self, set: usize) -> usize {
        self.sets[set].iter().filter(|m| m.verify().is_ok()).count()
    }
}

/// Canonicalize the directory part of `path`, leaving the final component
/// untouched so a symlink is still seen as a symlink.
fn resolve_parent(path: &Path) -> Result<PathBuf, DeleteError> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(DeleteError::NotRegularFile(path.to_path_buf()));
    };
    let parent = fs::canonicalize(parent).map_err(|e| DeleteError::from_io(path, e))?;
    Ok(parent.join(name))
}

/// How approved files are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfig {
    /// Remove permanently instead of moving to the trash.
    pub permanent: bool,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self::permanent()
    }
}

impl DeleteConfig {
    /// Move files to the system trash.
    #[must_use]
    pub fn trash() -> Self {
        Self { permanent: false }
    }

    /// Remove files permanently.
    #[must_use]
    pub fn permanent() -> Self {
        Self { permanent: true }
    }

    /// Choose trash or permanent removal.
    #[must_use]
    pub fn with_trash(mut self, trash: bool) -> Self {
        self.permanent = !trash;
        self
    }
}

/// Result for one requested path.
#[derive(Debug, Clone)]
pub struct DeletionOutcome {
    /// Path as selected.
    pub path: PathBuf,
    /// Whether the file was removed.
    pub succeeded: bool,
    /// Why it was not removed.
    pub cause: Option<DeleteError>,
    /// Bytes freed (zero on failure).
    pub bytes: u64,
}

impl DeletionOutcome {
    fn success(path: PathBuf, bytes: u64) -> Self {
        Self {
            path,
            succeeded: true,
            cause: None,
            bytes,
        }
    }

    fn failure(path: PathBuf, cause: DeleteError) -> Self {
        Self {
            path,
            succeeded: false,
            cause: Some(cause),
            bytes: 0,
        }
    }
}

/// Per-path results of executing a plan, in selection order.
#[derive(Debug, Clone, Default)]
pub struct DeletionReport {
    /// One outcome per requested path.
    pub outcomes: Vec<DeletionOutcome>,
    /// Total bytes freed.
    pub bytes_freed: u64,
    /// Whether removal was permanent.
    pub permanent: bool,
}

impl DeletionReport {
    /// Outcomes that removed a file.
    pub fn succeeded(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded)
    }

    /// Outcomes that did not.
    pub fn failed(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }

    /// Number of files removed.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    /// Number of paths refused during planning or verification.
    #[must_use]
    pub fn rejected_count(&self) -> usize {
        self.failed()
            .filter(|o| o.cause.as_ref().is_some_and(DeleteError::is_rejection))
            .count()
    }

    /// Number of paths not removed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// Number of requested paths.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether every requested path was removed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded)
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.permanent { "Deleted" } else { "Trashed" };
        if self.all_succeeded() {
            format!(
                "{} {} file(s), freed {} bytes",
                verb,
                self.success_count(),
                self.bytes_freed
            )
        } else {
            format!(
                "{} {} file(s), {} failed, freed {} bytes",
                verb,
                self.success_count(),
                self.failure_count(),
                self.bytes_freed
            )
        }
    }
}

/// Callback trait for deletion progress reporting.
pub trait DeleteProgressCallback: Send + Sync {
    /// Called before each removal attempt.
    fn on_before_delete(&self, path: &Path, index: usize, total: usize);

    /// Called after a successful removal.
    fn on_delete_success(&self, path: &Path, size: u64);

    /// Called after a failed removal.
    fn on_delete_failure(&self, path: &Path, error: &DeleteError);

    /// Called once the whole plan has been processed.
    fn on_complete(&self, report: &DeletionReport);
}

/// Execute an approved plan.
///
/// Each approved file's snapshot is re-verified just before removal. Every
/// path in the plan, rejected or approved, produces one outcome.
pub fn execute_plan(
    plan: DeletionPlan,
    config: &DeleteConfig,
    callback: Option<&dyn DeleteProgressCallback>,
) -> DeletionReport {
    let total = plan.approved.len();
    let mut indexed: Vec<(usize, DeletionOutcome)> = plan
        .rejections
        .into_iter()
        .map(|r| (r.index, DeletionOutcome::failure(r.path, r.cause)))
        .collect();
    let mut bytes_freed = 0;

    for (position, planned) in plan.approved.into_iter().enumerate() {
        if let Some(cb) = callback {
            cb.on_before_delete(&planned.path, position, total);
        }

        match remove_verified(&planned, config) {
            Ok(size) => {
                bytes_freed += size;
                if let Some(cb) = callback {
                    cb.on_delete_success(&planned.path, size);
                }
                indexed.push((planned.index, DeletionOutcome::success(planned.path, size)));
            }
            Err(e) => {
                log::warn!("Failed to delete {}: {}", planned.path.display(), e);
                if let Some(cb) = callback {
                    cb.on_delete_failure(&planned.path, &e);
                }
                indexed.push((planned.index, DeletionOutcome::failure(planned.path, e)));
            }
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    let report = DeletionReport {
        outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        bytes_freed,
        permanent: config.permanent,
    };

    if let Some(cb) = callback {
        cb.on_complete(&report);
    }
    log::info!("{}", report.summary());

    report
}

fn remove_verified(planned: &PlannedDeletion, config: &DeleteConfig) -> Result<u64, DeleteError> {
    let snapshot = &planned.snapshot;
    let path = snapshot.path.as_path();

    // A directory swapped for a link since planning would redirect the removal.
    if resolve_parent(path)? != path {
        log::warn!("Directory of {} changed since planning", path.display());
        return Err(DeleteError::OutsideScannedTree(planned.path.clone()));
    }
    snapshot.verify()?;
    if !planned.survivors.is_empty() && !planned.survivors.iter().any(|m| m.verify().is_ok()) {
        log::warn!("No intact copy left for {}, keeping it", path.display());
        return Err(DeleteError::LastCopy(planned.path.clone()));
    }

    if config.permanent {
        fs::remove_file(path).map_err(|e| {
            log::error!("Permanent delete failed for {}: {}", path.display(), e);
            DeleteError::from_io(path, e)
        })?;
        log::info!("Permanently deleted: {} ({} bytes)", path.display(), snapshot.size);
    } else {
        trash::delete(path).map_err(|e| {
            log::error!("Trash operation failed for {}: {}", path.display(), e);
            DeleteError::TrashFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;
        log::info!("Moved to trash: {} ({} bytes)", path.display(), snapshot.size);
    }

    Ok(snapshot.size)
}
