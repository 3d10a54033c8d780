//! Exit codes and structured error output.

use serde::Serialize;

use crate::scanner::ScanError;

/// Process exit codes.
///
/// - 0: duplicates found (or deletion fully succeeded)
/// - 1: fatal error
/// - 2: no duplicates found
/// - 3: partial success (entry errors, or some deletions failed)
/// - 130: interrupted (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed and duplicates were found.
    Success = 0,
    /// Fatal error.
    GeneralError = 1,
    /// Completed and no duplicates were found.
    NoDuplicates = 2,
    /// Completed with non-fatal errors.
    PartialSuccess = 3,
    /// Interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DD000",
            Self::GeneralError => "DD001",
            Self::NoDuplicates => "DD002",
            Self::PartialSuccess => "DD003",
            Self::Interrupted => "DD130",
        }
    }

    /// Exit code for an error that escaped `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<ScanError>() {
            Some(ScanError::Cancelled) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Fatal error rendered as JSON with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Code such as "DD001"
    pub code: String,
    /// Numeric exit code
    pub exit_code: i32,
    /// Error message including its causes
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Build from an error and its exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
