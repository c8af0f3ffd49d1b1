// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! strata-git: Git history analysis for strata-mcp
//!
//! This library crate parses commit logs, computes line-level and
//! commit-level diffs, scans files for unresolved merge conflicts and searches
//! file content across history. Repository access goes through the
//! [`GitBackend`] trait; [`Git2Backend`] implements it with libgit2.

#![warn(missing_docs)]

//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use strata_git::{EngineOptions, HistoryEngine, SearchQuery};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), strata_git::GitError> {
//! let engine = HistoryEngine::with_git2(EngineOptions::default());
//! let response = engine
//!     .search_commits(Path::new("."), &SearchQuery::new("TODO", 20), &CancellationToken::new())
//!     .await?;
//!
//! for result in &response.results {
//!     println!("{} - {} matches", result.hash, result.total_matches());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod commit;
pub mod conflict;
pub mod diff;
pub mod engine;
pub mod error;
pub mod line_diff;
pub mod log;
mod pool;
pub mod repo;
pub mod search;

pub use backend::{GitBackend, LogQuery};
pub use commit::{ChangeKind, CommitRecord, FileChange};
pub use conflict::{ConflictResult, ConflictScanReport, FileScan, FileScanError, scan_batch, scan_file};
pub use diff::{CommitDiffInfo, RenamedPath};
pub use engine::{CommitHistory, EngineOptions, HistoryEngine};
pub use error::GitError;
pub use line_diff::{FileLineDiff, LineDiff, LineKind, compute_line_diff};
pub use log::parse_log;
pub use repo::{Git2Backend, GitRepo};
pub use search::{
    CommitSearchResponse, CommitSearchResult, FileSearchMatch, LineSearchMatch, SearchQuery,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commit::CommitRecord;
    pub use crate::diff::CommitDiffInfo;
    pub use crate::engine::{EngineOptions, HistoryEngine};
    pub use crate::error::GitError;
    pub use crate::line_diff::FileLineDiff;
    pub use crate::search::{CommitSearchResponse, SearchQuery};
}
