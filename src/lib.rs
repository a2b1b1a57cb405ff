//! lintwarden library crate
//!
//! Turns raw static-analysis diagnostics into a de-duplicated set of tracked
//! issues on GitHub and keeps that set synchronized across CI runs.

pub mod blame;
pub mod config;
pub mod diagnostic;
pub mod github;
pub mod issue;
pub mod linter;
pub mod notify;
pub mod reconcile;
pub mod report;
pub mod util;
