// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Literal, case-insensitive search through file content across history
//!
//! Commits are scanned concurrently but reported in log order. A commit whose
//! files could not be reached because the repository itself is gone ends the
//! walk; everything before it is still returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backend::LogQuery;
use crate::commit::CommitRecord;
use crate::engine::{HistoryEngine, validate_repo};
use crate::error::GitError;
use crate::log::parse_log;
use crate::pool::fan_out;

/// Parameters for a history search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Literal text to look for
    pub needle: String,
    /// Number of commits to examine, newest first
    pub max_commits: usize,
    /// Starting reference (defaults to `HEAD`)
    pub rev: Option<String>,
    /// Cap on files read per commit
    pub max_files_per_commit: Option<usize>,
}

impl SearchQuery {
    /// Search the `max_commits` most recent commits for `needle`
    #[must_use]
    pub fn new(needle: &str, max_commits: usize) -> Self {
        Self {
            needle: needle.to_string(),
            max_commits,
            rev: None,
            max_files_per_commit: None,
        }
    }

    /// Set the starting reference
    #[must_use]
    pub fn from(mut self, reference: &str) -> Self {
        self.rev = Some(reference.to_string());
        self
    }

    /// Limit how many changed files are read per commit
    #[must_use]
    pub fn with_max_files(mut self, max: usize) -> Self {
        self.max_files_per_commit = Some(max);
        self
    }
}

/// A single matching line
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LineSearchMatch {
    /// 1-based line number
    pub line_number: usize,
    /// The full line
    pub content: String,
    /// The search string that matched
    pub matched: String,
}

/// Matching lines within one file, ascending by line number
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileSearchMatch {
    /// Path of the file at the commit
    pub file: String,
    /// Matching lines
    pub line_matches: Vec<LineSearchMatch>,
}

/// A commit with at least one matching line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSearchResult {
    /// Commit SHA
    pub hash: String,
    /// Commit subject
    pub message: String,
    /// Author name
    pub author: String,
    /// Author timestamp
    pub timestamp: DateTime<Utc>,
    /// Matches grouped per file, in the commit's changed-file order
    pub file_matches: Vec<FileSearchMatch>,
}

impl CommitSearchResult {
    /// Matching lines across all files of this commit
    #[must_use]
    pub fn total_matches(&self) -> usize {
        self.file_matches.iter().map(|f| f.line_matches.len()).sum()
    }
}

impl Serialize for CommitSearchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CommitSearchResult", 6)?;
        state.serialize_field("hash", &self.hash)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("author", &self.author)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("total_matches", &self.total_matches())?;
        state.serialize_field("file_matches", &self.file_matches)?;
        state.end()
    }
}

/// Outcome of a history search
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitSearchResponse {
    /// The search string as given
    pub search_string: String,
    /// Commits examined, matching or not
    pub total_commits_searched: usize,
    /// Matching commits, newest first
    pub results: Vec<CommitSearchResult>,
    /// Why the walk stopped early, plus any per-file failures
    pub error: Option<String>,
}

impl CommitSearchResponse {
    fn empty(needle: &str) -> Self {
        Self {
            search_string: needle.to_string(),
            ..Default::default()
        }
    }

    /// Number of commits with at least one match
    #[must_use]
    pub fn total_matching_commits(&self) -> usize {
        self.results.len()
    }

    /// Matching lines across every result
    #[must_use]
    pub fn total_line_matches(&self) -> usize {
        self.results.iter().map(CommitSearchResult::total_matches).sum()
    }
}

impl Serialize for CommitSearchResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CommitSearchResponse", 6)?;
        state.serialize_field("search_string", &self.search_string)?;
        state.serialize_field("total_commits_searched", &self.total_commits_searched)?;
        state.serialize_field("total_matching_commits", &self.total_matching_commits())?;
        state.serialize_field("total_line_matches", &self.total_line_matches())?;
        state.serialize_field("results", &self.results)?;
        state.serialize_field("error", &self.error)?;
        state.end()
    }
}

/// Lines of `text` containing `needle`, ignoring case
#[must_use]
pub fn find_line_matches(text: &str, needle: &str) -> Vec<LineSearchMatch> {
    let folded = needle.to_lowercase();
    text.lines()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&folded))
        .map(|(index, line)| LineSearchMatch {
            line_number: index + 1,
            content: line.to_string(),
            matched: needle.to_string(),
        })
        .collect()
}

/// What scanning one commit produced
struct CommitScan {
    result: Option<CommitSearchResult>,
    file_errors: Vec<String>,
}

impl HistoryEngine {
    /// Search the content of files changed by recent commits
    ///
    /// # Errors
    ///
    /// Only `GitError::Validation` is returned as `Err`: an empty repository
    /// path, an empty search string, or a zero commit limit. Every other
    /// failure is reported through [`CommitSearchResponse::error`] alongside
    /// the results gathered so far.
    #[instrument(skip(self, repo, query, cancel), fields(repo = %repo.display(), needle = %query.needle))]
    pub async fn search_commits(
        &self,
        repo: &Path,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<CommitSearchResponse, GitError> {
        let repo = validate_repo(repo)?;
        if query.needle.is_empty() {
            return Err(GitError::validation("search string cannot be empty"));
        }
        if query.max_commits == 0 {
            return Err(GitError::validation("max_commits must be at least 1"));
        }

        let mut response = CommitSearchResponse::empty(&query.needle);

        let log_query = LogQuery {
            rev: query.rev.clone(),
            max_count: query.max_commits,
        };
        let raw = {
            let repo = repo.clone();
            self.call("commit_log", move |b| b.commit_log(&repo, &log_query))
                .await
        };
        let commits = match raw {
            Ok(raw) => parse_log(&raw, query.max_commits),
            Err(e) => {
                warn!(error = %e, "Commit log unavailable");
                response.error = Some(e.to_string());
                return Ok(response);
            }
        };
        debug!(commits = commits.len(), "Walking history");

        // Lowest log position whose scan found the repository unreachable
        let first_failure = Arc::new(AtomicUsize::new(usize::MAX));
        let engine = self.clone();
        let (needle, max_files) = (query.needle.clone(), query.max_files_per_commit);
        let outcomes = fan_out(
            commits.into_iter().enumerate().collect(),
            self.options().concurrency,
            cancel,
            move |(index, commit): (usize, CommitRecord)| {
                let engine = engine.clone();
                let repo = repo.clone();
                let needle = needle.clone();
                let first_failure = Arc::clone(&first_failure);
                async move {
                    // Only commits older than a known failure are skipped
                    if index > first_failure.load(Ordering::SeqCst) {
                        return Err(GitError::Cancelled);
                    }
                    let scanned = engine.scan_commit(repo, commit, &needle, max_files).await;
                    if matches!(&scanned, Err(e) if e.is_fatal()) {
                        first_failure.fetch_min(index, Ordering::SeqCst);
                    }
                    scanned
                }
            },
        )
        .await;

        let mut notes = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(scan) => {
                    response.total_commits_searched += 1;
                    notes.extend(scan.file_errors);
                    response.results.extend(scan.result);
                }
                // Every skipped commit sits after this one, so it is the real cause
                Err(e) if e.is_fatal() => {
                    warn!(
                        searched = response.total_commits_searched,
                        error = %e,
                        "Stopping history walk"
                    );
                    notes.insert(
                        0,
                        format!(
                            "stopped after {} commits: {e}",
                            response.total_commits_searched
                        ),
                    );
                    break;
                }
                Err(e) => {
                    response.total_commits_searched += 1;
                    notes.push(e.to_string());
                }
            }
        }

        if !notes.is_empty() {
            response.error = Some(notes.join("; "));
        }

        info!(
            searched = response.total_commits_searched,
            matching = response.total_matching_commits(),
            lines = response.total_line_matches(),
            "Search complete"
        );
        Ok(response)
    }

    async fn scan_commit(
        &self,
        repo: PathBuf,
        commit: CommitRecord,
        needle: &str,
        max_files: Option<usize>,
    ) -> Result<CommitScan, GitError> {
        let mut file_matches = Vec::new();
        let mut file_errors = Vec::new();

        for path in commit.changed_files.iter().take(max_files.unwrap_or(usize::MAX)) {
            let text = {
                let (repo, rev, file) = (repo.clone(), commit.hash.clone(), path.clone());
                self.call("file_at", move |b| b.file_at(&repo, &rev, &file))
                    .await
            };
            let text = match text {
                Ok(Some(text)) => text,
                // Deleted by this commit, or not text
                Ok(None) | Err(GitError::BinaryContent { .. }) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(commit = commit.short_sha(), path = %path, error = %e, "Skipping file");
                    file_errors.push(format!("{}:{path}: {e}", commit.short_sha()));
                    continue;
                }
            };

            let line_matches = find_line_matches(&text, needle);
            if !line_matches.is_empty() {
                file_matches.push(FileSearchMatch {
                    file: path.clone(),
                    line_matches,
                });
            }
        }

        let result = (!file_matches.is_empty()).then(|| CommitSearchResult {
            hash: commit.hash,
            message: commit.message,
            author: commit.author,
            timestamp: commit.timestamp,
            file_matches,
        });
        Ok(CommitScan {
            result,
            file_errors,
        })
    }
}
