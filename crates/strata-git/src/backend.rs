// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! The text-retrieval boundary between the engine and a version-control store
//!
//! Every method is a blocking call. The engine runs them on the blocking
//! thread pool under a per-call timeout, so implementations only need to be
//! correct, not fast or cancellable.

use std::path::Path;

use crate::error::GitError;

/// Parameters for a commit log request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Starting reference (defaults to `HEAD`)
    pub rev: Option<String>,
    /// Maximum number of commits to emit
    pub max_count: usize,
}

impl LogQuery {
    /// Log of the N most recent commits reachable from `HEAD`
    #[must_use]
    pub fn latest(n: usize) -> Self {
        Self {
            rev: None,
            max_count: n,
        }
    }

    /// Set the starting reference
    #[must_use]
    pub fn from(mut self, reference: &str) -> Self {
        self.rev = Some(reference.to_string());
        self
    }

    /// Starting reference, falling back to `HEAD`
    #[must_use]
    pub fn rev_or_head(&self) -> &str {
        self.rev.as_deref().unwrap_or("HEAD")
    }
}

/// Raw access to repository history and content
pub trait GitBackend: Send + Sync {
    /// Log text for up to `query.max_count` commits, newest first, in the
    /// record format understood by [`crate::log::parse_log`]
    ///
    /// An empty repository yields an empty string.
    fn commit_log(&self, repo: &Path, query: &LogQuery) -> Result<String, GitError>;

    /// Full text of `path` at `rev`, or `None` when the path does not exist
    /// at that revision
    fn file_at(&self, repo: &Path, rev: &str, path: &str) -> Result<Option<String>, GitError>;

    /// One name-status line per changed path between two revisions,
    /// optionally restricted to `paths`
    fn name_status(
        &self,
        repo: &Path,
        from: &str,
        to: &str,
        paths: &[String],
    ) -> Result<String, GitError>;

    /// Unified diff text between two revisions, optionally restricted to `paths`
    fn unified_diff(
        &self,
        repo: &Path,
        from: &str,
        to: &str,
        paths: &[String],
    ) -> Result<String, GitError>;
}
