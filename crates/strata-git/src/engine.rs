// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! The history engine: backend access with timeouts, plus commit log retrieval
//!
//! Diffing and searching live in their own modules as further `impl` blocks
//! on [`HistoryEngine`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::backend::{GitBackend, LogQuery};
use crate::commit::CommitRecord;
use crate::error::GitError;
use crate::log::parse_log;
use crate::repo::Git2Backend;

/// Default per-call backend timeout
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of units processed concurrently in batch operations
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Tuning knobs shared by every engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Deadline for a single backend call
    pub call_timeout: Duration,
    /// Maximum units in flight for batch operations
    pub concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl EngineOptions {
    /// Set the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the batch concurrency (at least 1)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Commit history for a ref, or why it could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHistory {
    /// Commits, newest first
    pub commits: Vec<CommitRecord>,
    /// Backend failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Entry point for all history operations
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct HistoryEngine {
    backend: Arc<dyn GitBackend>,
    options: EngineOptions,
}

impl std::fmt::Debug for HistoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl HistoryEngine {
    /// Create an engine over an arbitrary backend
    #[must_use]
    pub fn new(backend: Arc<dyn GitBackend>, options: EngineOptions) -> Self {
        Self { backend, options }
    }

    /// Create an engine backed by libgit2
    #[must_use]
    pub fn with_git2(options: EngineOptions) -> Self {
        Self::new(Arc::new(Git2Backend), options)
    }

    /// Options in effect
    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Read and parse up to `query.max_count` commits
    ///
    /// # Errors
    ///
    /// Returns `GitError::Validation` for an empty repository path or a zero
    /// commit limit. Backend failures are reported in [`CommitHistory::error`].
    #[instrument(skip(self, repo), fields(repo = %repo.display()))]
    pub async fn commit_log(&self, repo: &Path, query: &LogQuery) -> Result<CommitHistory, GitError> {
        let repo = validate_repo(repo)?;
        if query.max_count == 0 {
            return Err(GitError::validation("max_commits must be at least 1"));
        }

        let max = query.max_count;
        let owned = query.clone();
        match self
            .call("commit_log", move |b| b.commit_log(&repo, &owned))
            .await
        {
            Ok(raw) => Ok(CommitHistory {
                commits: parse_log(&raw, max),
                error: None,
            }),
            Err(e) => {
                warn!(error = %e, "Commit log unavailable");
                Ok(CommitHistory {
                    commits: Vec::new(),
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Run one blocking backend call under the configured timeout
    pub(crate) async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T, GitError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn GitBackend) -> Result<T, GitError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let timeout = self.options.call_timeout;
        debug!(operation, "Calling backend");

        let handle = tokio::task::spawn_blocking(move || f(backend.as_ref()));
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(GitError::Task(join.to_string())),
            Err(_) => {
                let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(operation, millis, "Backend call timed out");
                Err(GitError::Timeout { operation, millis })
            }
        }
    }
}

/// Reject an empty repository path before touching the backend
pub(crate) fn validate_repo(repo: &Path) -> Result<PathBuf, GitError> {
    if repo.as_os_str().is_empty() {
        return Err(GitError::validation("repository path cannot be empty"));
    }
    Ok(repo.to_path_buf())
}

/// Reject an empty required string argument
pub(crate) fn require(name: &str, value: &str) -> Result<(), GitError> {
    if value.trim().is_empty() {
        return Err(GitError::validation(format!("{name} cannot be empty")));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;

    const SHA_A: &str = "1945ab9c752534e733c38ba0109dc3b741f0a6eb";

    #[tokio::test]
    async fn test_commit_log_parses_backend_text() {
        let backend = FakeBackend::default();
        backend.push_commit(SHA_A, "Initial commit", &["A\tREADME.md"]);
        let engine = HistoryEngine::new(Arc::new(backend), EngineOptions::default());

        let history = engine
            .commit_log(Path::new("/repo"), &LogQuery::latest(5))
            .await
            .expect("valid input");

        assert!(history.error.is_none());
        assert_eq!(history.commits.len(), 1);
        assert_eq!(history.commits[0].changed_files, vec!["README.md"]);
    }

    #[tokio::test]
    async fn test_commit_log_rejects_empty_repo_path() {
        let engine = HistoryEngine::new(Arc::new(FakeBackend::default()), EngineOptions::default());
        let result = engine.commit_log(Path::new(""), &LogQuery::latest(5)).await;
        assert!(matches!(result, Err(GitError::Validation(_))));
    }

    #[tokio::test]
    async fn test_commit_log_rejects_zero_limit() {
        let engine = HistoryEngine::new(Arc::new(FakeBackend::default()), EngineOptions::default());
        let result = engine.commit_log(Path::new("/repo"), &LogQuery::latest(0)).await;
        assert!(matches!(result, Err(GitError::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_history_is_success() {
        let engine = HistoryEngine::new(Arc::new(FakeBackend::default()), EngineOptions::default());
        let history = engine
            .commit_log(Path::new("/repo"), &LogQuery::latest(5))
            .await
            .expect("valid input");
        assert!(history.commits.is_empty());
        assert!(history.error.is_none());
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let engine = HistoryEngine::new(
            Arc::new(FakeBackend::default()),
            EngineOptions::default().with_timeout(Duration::from_millis(20)),
        );
        let result: Result<(), GitError> = engine
            .call("file_at", |_| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(GitError::Timeout {
                operation: "file_at",
                millis: 20
            })
        ));
        let message = result.expect_err("timed out").to_string();
        assert_eq!(message, "file_at timed out after 20ms");
    }

    #[test]
    fn test_options_builder_clamps_concurrency() {
        let options = EngineOptions::default().with_concurrency(0);
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.call_timeout, DEFAULT_CALL_TIMEOUT);
    }
}
