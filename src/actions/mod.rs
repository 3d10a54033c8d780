//! File actions.
//!
//! Deletion is split into a validating planner and a best-effort executor
//! so that callers can confirm between the two:
//!
//! ```no_run
//! use dupe_detective::actions::{execute_plan, DeleteConfig, DeletionPlanner};
//! use std::path::PathBuf;
//!
//! let planner = DeletionPlanner::new(vec![PathBuf::from("/data")]);
//! let plan = planner.plan(&[PathBuf::from("/data/copy.txt")]);
//! let report = execute_plan(plan, &DeleteConfig::trash(), None);
//! println!("{}", report.summary());
//! ```

pub mod delete;

pub use delete::{
    execute_plan, DeleteConfig, DeleteError, DeleteProgressCallback, DeletionOutcome,
    DeletionPlan, DeletionPlanner, DeletionReport, FileSnapshot, PlannedDeletion, Rejection,
};
