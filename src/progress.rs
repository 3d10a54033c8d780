//! Scan progress events and terminal rendering using indicatif.
//!
//! The scan coordinator never talks to a terminal. It pushes
//! [`ScanProgress`] snapshots into a bounded channel with `try_send`, so a
//! slow or absent consumer can never stall the scan; when the channel is
//! full the update is simply dropped and a later one supersedes it.
//!
//! [`ProgressReporter`] is the CLI's consumer: it drains the channel on its
//! own thread and renders a spinner until every sender is gone.
//! [`DeletionProgressBar`] renders deletion progress through the
//! [`DeleteProgressCallback`] hooks.

use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytesize::ByteSize;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::actions::{DeleteError, DeleteProgressCallback, DeletionReport};

/// Default capacity for progress channels.
pub const DEFAULT_PROGRESS_CAPACITY: usize = 64;

/// Phase of a running scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// Walking the tree (hashing may already be running alongside)
    Enumerating,
    /// Walk finished, waiting for outstanding hashes
    Hashing,
    /// Byte-for-byte confirmation of hash matches
    Verifying,
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enumerating => write!(f, "Enumerating"),
            Self::Hashing => write!(f, "Hashing"),
            Self::Verifying => write!(f, "Verifying"),
        }
    }
}

/// Snapshot of scan progress. Counters are cumulative and monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    /// Regular files enumerated so far
    pub files_scanned: u64,
    /// Total size of enumerated files
    pub bytes_scanned: u64,
    /// Files whose content hash has been computed
    pub files_hashed: u64,
    /// Current phase
    pub phase: ScanPhase,
}

/// Create a bounded progress channel.
#[must_use]
pub fn progress_channel(capacity: usize) -> (Sender<ScanProgress>, Receiver<ScanProgress>) {
    bounded(capacity.max(1))
}

/// Non-blocking send. Returns `false` once the receiver is gone.
pub(crate) fn emit(sender: &Sender<ScanProgress>, event: ScanProgress) -> bool {
    match sender.try_send(event) {
        Ok(()) | Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Renders progress events as a terminal spinner.
pub struct ProgressReporter {
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Start draining `events` on a background thread.
    ///
    /// When `quiet` is set events are consumed without rendering.
    #[must_use]
    pub fn spawn(events: Receiver<ScanProgress>, quiet: bool) -> Self {
        let handle = thread::spawn(move || {
            let bar = if quiet {
                ProgressBar::hidden()
            } else {
                let bar = ProgressBar::new_spinner();
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            };

            let mut last = None;
            for event in events {
                bar.set_message(describe(&event));
                last = Some(event);
            }

            match last {
                Some(event) => bar.finish_with_message(format!(
                    "Scanned {} files ({}), hashed {}",
                    event.files_scanned,
                    ByteSize::b(event.bytes_scanned),
                    event.files_hashed
                )),
                None => bar.finish_and_clear(),
            }
        });
        Self { handle }
    }

    /// Wait for the reporter to finish (after all senders are dropped).
    pub fn finish(self) {
        if self.handle.join().is_err() {
            log::debug!("Progress reporter thread panicked");
        }
    }
}

/// Progress bar for executing a deletion plan.
pub struct DeletionProgressBar {
    bar: ProgressBar,
}

impl DeletionProgressBar {
    /// Bar sized for `total` removals; hidden when `quiet`.
    #[must_use]
    pub fn new(total: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        bar.set_style(
            ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl DeleteProgressCallback for DeletionProgressBar {
    fn on_before_delete(&self, path: &Path, _index: usize, _total: usize) {
        self.bar.set_message(path.display().to_string());
    }

    fn on_delete_success(&self, _path: &Path, _size: u64) {
        self.bar.inc(1);
    }

    fn on_delete_failure(&self, path: &Path, error: &DeleteError) {
        self.bar.println(format!("Skipped {}: {}", path.display(), error));
        self.bar.inc(1);
    }

    fn on_complete(&self, report: &DeletionReport) {
        self.bar.finish_with_message(report.summary());
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
}

fn describe(event: &ScanProgress) -> String {
    match event.phase {
        ScanPhase::Enumerating => format!(
            "{}: {} files ({}), {} hashed",
            event.phase,
            event.files_scanned,
            ByteSize::b(event.bytes_scanned),
            event.files_hashed
        ),
        ScanPhase::Hashing | ScanPhase::Verifying => format!(
            "{}: {} of {} files hashed",
            event.phase, event.files_hashed, event.files_scanned
        ),
    }
}
