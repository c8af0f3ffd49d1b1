// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Commit-to-commit diff aggregation
//!
//! The backend's name-status listing is partitioned as-is; rename detection
//! belongs to the backend and is never re-derived here.

use std::path::Path;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::commit::{ChangeKind, FileChange};
use crate::engine::{HistoryEngine, require, validate_repo};
use crate::error::GitError;
use crate::line_diff::{FileLineDiff, compute_line_diff};
use crate::pool::fan_out;

/// A path that moved between the two commits
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenamedPath {
    /// Path in the old commit
    pub old_path: String,
    /// Path in the new commit
    pub new_path: String,
    /// Backend similarity score, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<u8>,
}

/// Files changed between two commits plus the backend's unified diff
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitDiffInfo {
    /// Old commit identifier
    pub from_commit: String,
    /// New commit identifier
    pub to_commit: String,
    /// Paths created (copies included)
    pub added_files: Vec<String>,
    /// Paths whose content or type changed
    pub modified_files: Vec<String>,
    /// Paths removed
    pub deleted_files: Vec<String>,
    /// Paths that moved
    pub renamed_files: Vec<RenamedPath>,
    /// Unified diff text with `\n` line endings
    pub detailed_diff: String,
    /// Whether `max_files` cut the listing short
    pub truncated: bool,
    /// Why the listing is empty or incomplete
    pub error: Option<String>,
}

impl CommitDiffInfo {
    fn empty(from: &str, to: &str) -> Self {
        Self {
            from_commit: from.to_string(),
            to_commit: to.to_string(),
            ..Default::default()
        }
    }

    /// Total number of changed paths across all four lists
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.added_files.len()
            + self.modified_files.len()
            + self.deleted_files.len()
            + self.renamed_files.len()
    }

    /// Every path touched, old and new sides of renames included
    fn touched_paths(&self) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.total_changes() + self.renamed_files.len());
        paths.extend(self.added_files.iter().cloned());
        paths.extend(self.modified_files.iter().cloned());
        paths.extend(self.deleted_files.iter().cloned());
        for rename in &self.renamed_files {
            paths.push(rename.old_path.clone());
            paths.push(rename.new_path.clone());
        }
        paths
    }

    fn push(&mut self, change: FileChange) {
        match change.kind {
            ChangeKind::Added | ChangeKind::Copied => self.added_files.push(change.path),
            ChangeKind::Modified | ChangeKind::TypeChanged => self.modified_files.push(change.path),
            ChangeKind::Deleted => self.deleted_files.push(change.path),
            ChangeKind::Renamed => self.renamed_files.push(RenamedPath {
                old_path: change.old_path.unwrap_or_default(),
                new_path: change.path,
                similarity: change.similarity,
            }),
        }
    }
}

impl Serialize for CommitDiffInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CommitDiffInfo", 10)?;
        state.serialize_field("from_commit", &self.from_commit)?;
        state.serialize_field("to_commit", &self.to_commit)?;
        state.serialize_field("total_changes", &self.total_changes())?;
        state.serialize_field("added_files", &self.added_files)?;
        state.serialize_field("modified_files", &self.modified_files)?;
        state.serialize_field("deleted_files", &self.deleted_files)?;
        state.serialize_field("renamed_files", &self.renamed_files)?;
        state.serialize_field("detailed_diff", &self.detailed_diff)?;
        state.serialize_field("truncated", &self.truncated)?;
        state.serialize_field("error", &self.error)?;
        state.end()
    }
}

/// Normalize CRLF and lone CR line endings to LF
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

impl HistoryEngine {
    /// Classify the files changed between two commits
    ///
    /// `paths` restricts the listing and the unified diff; `max_files` caps
    /// the number of listed paths.
    ///
    /// # Errors
    ///
    /// Only `GitError::Validation` is returned as `Err`. Unknown commits yield
    /// empty lists with [`CommitDiffInfo::error`] explaining why.
    #[instrument(skip(self, repo, paths), fields(repo = %repo.display()))]
    pub async fn commit_diff(
        &self,
        repo: &Path,
        from: &str,
        to: &str,
        paths: &[String],
        max_files: Option<usize>,
    ) -> Result<CommitDiffInfo, GitError> {
        let repo = validate_repo(repo)?;
        require("from commit", from)?;
        require("to commit", to)?;

        let mut info = CommitDiffInfo::empty(from, to);

        let status_text = {
            let (repo, from, to, paths) = (repo.clone(), from.to_string(), to.to_string(), paths.to_vec());
            self.call("name_status", move |b| b.name_status(&repo, &from, &to, &paths))
                .await
        };
        let status_text = match status_text {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Could not list changed files");
                info.error = Some(explain(&e, from, to));
                return Ok(info);
            }
        };

        let changes: Vec<FileChange> = status_text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let change = FileChange::parse_name_status(line.trim_end());
                if change.is_none() {
                    warn!(line, "Skipping unrecognised status line");
                }
                change
            })
            .collect();

        let listed = changes.len();
        let keep = max_files.map_or(listed, |max| max.min(listed));
        for change in changes.into_iter().take(keep) {
            info.push(change);
        }
        info.truncated = keep < listed;

        // Restrict the patch to the listed paths when the listing was capped
        let diff_paths = if info.truncated {
            info.touched_paths()
        } else {
            paths.to_vec()
        };

        let unified = {
            let (repo, from, to) = (repo.clone(), from.to_string(), to.to_string());
            self.call("unified_diff", move |b| b.unified_diff(&repo, &from, &to, &diff_paths))
                .await
        };
        match unified {
            Ok(text) => info.detailed_diff = normalize_line_endings(&text),
            Err(e) => {
                warn!(error = %e, "Could not produce unified diff");
                info.error = Some(format!("unified diff unavailable: {e}"));
            }
        }

        info!(
            total = info.total_changes(),
            truncated = info.truncated,
            "Computed commit diff"
        );
        Ok(info)
    }

    /// Line-level diff of one path between two commits
    ///
    /// # Errors
    ///
    /// Only `GitError::Validation` is returned as `Err`. Retrieval failures
    /// are reported through [`FileLineDiff::error`].
    #[instrument(skip(self, repo), fields(repo = %repo.display()))]
    pub async fn file_line_diff(
        &self,
        repo: &Path,
        from: &str,
        to: &str,
        path: &str,
    ) -> Result<FileLineDiff, GitError> {
        let repo = validate_repo(repo)?;
        require("from commit", from)?;
        require("to commit", to)?;
        require("path", path)?;
        Ok(self.line_diff_unchecked(repo, from, to, path).await)
    }

    /// Line-level diffs for several paths, in input order
    ///
    /// One path failing never affects the others.
    ///
    /// # Errors
    ///
    /// Only `GitError::Validation` is returned as `Err`.
    pub async fn file_line_diffs(
        &self,
        repo: &Path,
        from: &str,
        to: &str,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<FileLineDiff>, GitError> {
        let repo = validate_repo(repo)?;
        require("from commit", from)?;
        require("to commit", to)?;

        let engine = self.clone();
        let (from_owned, to_owned) = (from.to_string(), to.to_string());
        let outcomes = fan_out(
            paths.to_vec(),
            self.options().concurrency,
            cancel,
            move |path: String| {
                let engine = engine.clone();
                let (repo, from, to) = (repo.clone(), from_owned.clone(), to_owned.clone());
                async move { Ok(engine.line_diff_unchecked(repo, &from, &to, &path).await) }
            },
        )
        .await;

        Ok(outcomes
            .into_iter()
            .zip(paths)
            .map(|(outcome, path)| {
                outcome.unwrap_or_else(|e| FileLineDiff::failed(path, from, to, e.to_string()))
            })
            .collect())
    }

    async fn line_diff_unchecked(
        &self,
        repo: std::path::PathBuf,
        from: &str,
        to: &str,
        path: &str,
    ) -> FileLineDiff {
        let old = {
            let (repo, rev, file) = (repo.clone(), from.to_string(), path.to_string());
            self.call("file_at", move |b| b.file_at(&repo, &rev, &file))
        };
        let new = {
            let (repo, rev, file) = (repo, to.to_string(), path.to_string());
            self.call("file_at", move |b| b.file_at(&repo, &rev, &file))
        };

        match tokio::join!(old, new) {
            (Ok(old), Ok(new)) => compute_line_diff(path, from, to, old.as_deref(), new.as_deref()),
            (Err(e), _) => FileLineDiff::failed(path, from, to, format!("{from}: {e}")),
            (_, Err(e)) => FileLineDiff::failed(path, from, to, format!("{to}: {e}")),
        }
    }
}

fn explain(error: &GitError, from: &str, to: &str) -> String {
    match error {
        GitError::InvalidReference { reference } => format!(
            "commit '{reference}' not found; no changes listed between {from} and {to}"
        ),
        other => format!("could not compare {from} and {to}: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;
    use crate::engine::testing::FakeBackend;
    use crate::line_diff::LineKind;
    use similar_asserts::assert_eq;
    use std::sync::Arc;

    fn engine(backend: FakeBackend) -> HistoryEngine {
        HistoryEngine::new(Arc::new(backend), EngineOptions::default())
    }

    #[test]
    fn test_total_changes_of_empty_info() {
        let info = CommitDiffInfo::empty("a", "b");
        assert_eq!(info.total_changes(), 0);
    }

    #[test]
    fn test_total_changes_is_sum_of_lists() {
        let mut info = CommitDiffInfo::empty("a", "b");
        info.added_files = vec!["x".into(), "y".into()];
        info.deleted_files = vec!["z".into()];
        info.renamed_files = vec![RenamedPath {
            old_path: "o".into(),
            new_path: "n".into(),
            similarity: None,
        }];
        assert_eq!(info.total_changes(), 4);
    }

    #[test]
    fn test_serialized_total_changes() {
        let mut info = CommitDiffInfo::empty("a", "b");
        info.modified_files = vec!["src/lib.rs".into()];
        let json = serde_json::to_value(&info).expect("serialize");
        assert_eq!(json["total_changes"], 1);
        assert_eq!(json["from_commit"], "a");
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[tokio::test]
    async fn test_commit_diff_partitions_backend_status() {
        let backend = FakeBackend {
            name_status: Some(
                "A\tnew.rs\nM\tsrc/lib.rs\nD\told.rs\nR092\ta.rs\tb.rs\nC\tsrc/lib.rs\tcopy.rs\nT\tlink\n"
                    .to_string(),
            ),
            unified: Some("diff --git a/src/lib.rs b/src/lib.rs\r\n-old\r\n+new\r\n".to_string()),
            ..Default::default()
        };

        let info = engine(backend)
            .commit_diff(Path::new("/repo"), "HEAD~1", "HEAD", &[], None)
            .await
            .expect("valid input");

        assert_eq!(info.added_files, vec!["new.rs", "copy.rs"]);
        assert_eq!(info.modified_files, vec!["src/lib.rs", "link"]);
        assert_eq!(info.deleted_files, vec!["old.rs"]);
        assert_eq!(
            info.renamed_files,
            vec![RenamedPath {
                old_path: "a.rs".into(),
                new_path: "b.rs".into(),
                similarity: Some(92),
            }]
        );
        assert_eq!(info.total_changes(), 6);
        assert!(!info.detailed_diff.contains('\r'));
        assert!(info.error.is_none());
        assert!(!info.truncated);
    }

    #[tokio::test]
    async fn test_commit_diff_unknown_commit_is_annotated() {
        let info = engine(FakeBackend::default())
            .commit_diff(Path::new("/repo"), "deadbeef", "HEAD", &[], None)
            .await
            .expect("valid input");

        assert_eq!(info.total_changes(), 0);
        assert!(info.detailed_diff.is_empty());
        let message = info.error.expect("explanation");
        assert!(message.contains("deadbeef"));
    }

    #[tokio::test]
    async fn test_commit_diff_max_files_truncates() {
        let backend = FakeBackend {
            name_status: Some("M\ta\nM\tb\nM\tc\n".to_string()),
            unified: Some(String::new()),
            ..Default::default()
        };

        let info = engine(backend)
            .commit_diff(Path::new("/repo"), "a", "b", &[], Some(2))
            .await
            .expect("valid input");

        assert_eq!(info.modified_files, vec!["a", "b"]);
        assert!(info.truncated);
    }

    #[tokio::test]
    async fn test_commit_diff_validates_arguments() {
        let engine = engine(FakeBackend::default());
        let empty_repo = engine.commit_diff(Path::new(""), "a", "b", &[], None).await;
        assert!(matches!(empty_repo, Err(GitError::Validation(_))));

        let empty_ref = engine.commit_diff(Path::new("/repo"), "", "b", &[], None).await;
        assert!(matches!(empty_ref, Err(GitError::Validation(_))));
    }

    #[tokio::test]
    async fn test_file_line_diff_through_backend() {
        let backend = FakeBackend::default()
            .with_file("v1", "src/lib.rs", "alpha\nfoo\nomega\n")
            .with_file("v2", "src/lib.rs", "alpha\nfoo!\nomega\n");

        let d = engine(backend)
            .file_line_diff(Path::new("/repo"), "v1", "v2", "src/lib.rs")
            .await
            .expect("valid input");

        assert!(d.exists_in_both);
        assert_eq!(d.modified_lines, 1);
        assert_eq!(d.lines[1].kind, LineKind::Modified);
    }

    #[tokio::test]
    async fn test_file_line_diff_retrieval_failure() {
        let backend = FakeBackend {
            broken_revs: vec!["v1".to_string()],
            ..Default::default()
        };

        let d = engine(backend)
            .file_line_diff(Path::new("/repo"), "v1", "v2", "src/lib.rs")
            .await
            .expect("valid input");

        assert!(!d.exists_in_both);
        assert!(d.lines.is_empty());
        assert!(d.error.is_some());
    }

    #[tokio::test]
    async fn test_file_line_diffs_isolate_failures() {
        let backend = FakeBackend::default()
            .with_file("v2", "added.rs", "one\n")
            .with_file("v1", "same.rs", "x\n")
            .with_file("v2", "same.rs", "x\n");

        let paths = vec![
            "added.rs".to_string(),
            "missing.rs".to_string(),
            "same.rs".to_string(),
        ];
        let diffs = engine(backend)
            .file_line_diffs(Path::new("/repo"), "v1", "v2", &paths, &CancellationToken::new())
            .await
            .expect("valid input");

        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0].path, "added.rs");
        assert_eq!(diffs[0].added_lines, 1);
        assert!(diffs[1].error.is_some());
        assert!(diffs[2].error.is_none());
        assert!(!diffs[2].has_changes());
    }
}
