// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! libgit2-backed repository access
//!
//! [`GitRepo`] wraps a `git2::Repository` and renders history, file content
//! and tree diffs as the plain text the engine consumes. [`Git2Backend`]
//! opens a fresh `GitRepo` per call, since `git2::Repository` is not `Sync`.

use std::path::Path;

use git2::{
    Delta, Diff, DiffDelta, DiffFindOptions, DiffFormat, DiffOptions, ErrorCode, ObjectType,
    Repository, Sort, Status, StatusOptions, Tree,
};
use tracing::debug;

use crate::backend::{GitBackend, LogQuery};
use crate::error::GitError;
use crate::log::render_header;

/// A git repository wrapper that renders backend text
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// # Errors
    ///
    /// Returns `GitError::RepositoryNotFound` if the path is not a git repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| GitError::RepositoryNotFound {
            path: path.display().to_string(),
        })?;
        Ok(Self { repo })
    }

    /// Discover and open a git repository containing the given path
    ///
    /// This walks up the directory tree to find a `.git` directory.
    ///
    /// # Errors
    ///
    /// Returns `GitError::RepositoryNotFound` if no repository is found.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|_| GitError::RepositoryNotFound {
            path: path.display().to_string(),
        })?;
        Ok(Self { repo })
    }

    /// Get the working directory path (None for bare repos)
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Resolve a branch, tag, or SHA to a commit
    fn resolve_commit(&self, reference: &str) -> Result<git2::Commit<'_>, GitError> {
        let invalid = || GitError::InvalidReference {
            reference: reference.to_string(),
        };
        self.repo
            .revparse_single(reference)
            .map_err(|_| invalid())?
            .peel_to_commit()
            .map_err(|_| invalid())
    }

    /// Render up to `query.max_count` commits in log record format
    ///
    /// Merge commits are emitted once per parent so each block carries the
    /// paths that differ from that parent.
    ///
    /// # Errors
    ///
    /// Returns `GitError` if the starting reference cannot be resolved or the
    /// repository cannot be walked.
    pub fn render_log(&self, query: &LogQuery) -> Result<String, GitError> {
        if query.rev.is_none() && self.repo.is_empty()? {
            return Ok(String::new());
        }

        let start = self.resolve_commit(query.rev_or_head())?;
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;
        revwalk.push(start.id())?;

        let mut out = String::new();
        for oid_result in revwalk.take(query.max_count) {
            let git_commit = self.repo.find_commit(oid_result?)?;
            let parents: Vec<String> = git_commit.parent_ids().map(|id| id.to_string()).collect();
            let header = render_header(
                &git_commit.id().to_string(),
                git_commit.author().name().unwrap_or("Unknown"),
                git_commit.author().email().unwrap_or(""),
                git_commit.time().seconds(),
                &parents,
                git_commit.summary().unwrap_or(""),
            );

            let tree = git_commit.tree()?;
            if git_commit.parent_count() == 0 {
                out.push_str(&header);
                let diff = self.tree_diff(None, Some(&tree), &[])?;
                push_name_status(&mut out, &diff);
            } else {
                for parent in git_commit.parents() {
                    out.push_str(&header);
                    let parent_tree = parent.tree()?;
                    let diff = self.tree_diff(Some(&parent_tree), Some(&tree), &[])?;
                    push_name_status(&mut out, &diff);
                }
            }
        }

        Ok(out)
    }

    /// Text of `path` at `rev`, or `None` when the path is absent there
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidReference` for an unknown revision and
    /// `GitError::BinaryContent` for binary blobs.
    pub fn file_at(&self, rev: &str, path: &str) -> Result<Option<String>, GitError> {
        let tree = self.resolve_commit(rev)?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }

        let blob = self.repo.find_blob(entry.id())?;
        if blob.is_binary() {
            return Err(GitError::BinaryContent {
                path: path.to_string(),
            });
        }
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }

    /// Name-status lines for the changes between two revisions
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidReference` if either revision is unknown.
    pub fn name_status(&self, from: &str, to: &str, paths: &[String]) -> Result<String, GitError> {
        let diff = self.commit_diff(from, to, paths)?;
        let mut out = String::new();
        push_name_status(&mut out, &diff);
        Ok(out)
    }

    /// Unified diff text between two revisions
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidReference` if either revision is unknown.
    pub fn unified_diff(&self, from: &str, to: &str, paths: &[String]) -> Result<String, GitError> {
        let diff = self.commit_diff(from, to, paths)?;
        let mut out = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                out.push(line.origin());
            }
            out.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(out)
    }

    /// Working-tree paths that are conflicted or modified
    ///
    /// # Errors
    ///
    /// Returns `GitError` for bare repositories or unreadable status.
    pub fn worktree_changed_paths(&self) -> Result<Vec<String>, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut conflicted = Vec::new();
        let mut modified = Vec::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else { continue };
            let status = entry.status();
            if status.contains(Status::CONFLICTED) {
                conflicted.push(path.to_string());
            } else if status.intersects(Status::WT_MODIFIED | Status::INDEX_MODIFIED) {
                modified.push(path.to_string());
            }
        }

        conflicted.extend(modified);
        Ok(conflicted)
    }

    fn commit_diff(&self, from: &str, to: &str, paths: &[String]) -> Result<Diff<'_>, GitError> {
        let old_tree = self.resolve_commit(from)?.tree()?;
        let new_tree = self.resolve_commit(to)?.tree()?;
        self.tree_diff(Some(&old_tree), Some(&new_tree), paths)
    }

    fn tree_diff(
        &self,
        old: Option<&Tree<'_>>,
        new: Option<&Tree<'_>>,
        paths: &[String],
    ) -> Result<Diff<'_>, GitError> {
        let mut opts = DiffOptions::new();
        opts.ignore_whitespace(false);
        for path in paths {
            opts.pathspec(path.as_str());
        }

        let mut diff = self.repo.diff_tree_to_tree(old, new, Some(&mut opts))?;
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;
        Ok(diff)
    }
}

fn push_name_status(out: &mut String, diff: &Diff<'_>) {
    for delta in diff.deltas() {
        if let Some(line) = name_status_line(&delta) {
            out.push_str(&line);
            out.push('\n');
        }
    }
}

fn name_status_line(delta: &DiffDelta<'_>) -> Option<String> {
    let path_of = |file: git2::DiffFile<'_>| file.path().map(|p| p.to_string_lossy().into_owned());
    let old = path_of(delta.old_file());
    let new = path_of(delta.new_file());

    match delta.status() {
        Delta::Added => Some(format!("A\t{}", new?)),
        Delta::Deleted => Some(format!("D\t{}", old?)),
        Delta::Modified => Some(format!("M\t{}", new?)),
        Delta::Typechange => Some(format!("T\t{}", new?)),
        Delta::Renamed => Some(format!("R\t{}\t{}", old?, new?)),
        Delta::Copied => Some(format!("C\t{}\t{}", old?, new?)),
        _ => None,
    }
}

/// [`GitBackend`] implementation using libgit2
#[derive(Debug, Clone, Copy, Default)]
pub struct Git2Backend;

impl GitBackend for Git2Backend {
    fn commit_log(&self, repo: &Path, query: &LogQuery) -> Result<String, GitError> {
        debug!(repo = %repo.display(), max = query.max_count, "Rendering commit log");
        GitRepo::open(repo)?.render_log(query)
    }

    fn file_at(&self, repo: &Path, rev: &str, path: &str) -> Result<Option<String>, GitError> {
        GitRepo::open(repo)?.file_at(rev, path)
    }

    fn name_status(
        &self,
        repo: &Path,
        from: &str,
        to: &str,
        paths: &[String],
    ) -> Result<String, GitError> {
        GitRepo::open(repo)?.name_status(from, to, paths)
    }

    fn unified_diff(
        &self,
        repo: &Path,
        from: &str,
        to: &str,
        paths: &[String],
    ) -> Result<String, GitError> {
        GitRepo::open(repo)?.unified_diff(from, to, paths)
    }
}
