//! Report formatters for scan and deletion results.
//!
//! - [`json`]: machine-readable report for scripting
//! - [`text`]: human-readable report, optionally colored
//!
//! ```no_run
//! use dupe_detective::duplicates::DuplicateFinder;
//! use dupe_detective::error::ExitCode;
//! use dupe_detective::output::JsonReport;
//! use std::path::Path;
//!
//! let result = DuplicateFinder::with_defaults().scan(Path::new(".")).unwrap();
//! JsonReport::new(&result, ExitCode::Success)
//!     .write_to(&mut std::io::stdout())
//!     .unwrap();
//! ```

pub mod json;
pub mod text;

pub use json::{write_json, JsonDeletion, JsonOutputError, JsonReport};
pub use text::TextReport;
