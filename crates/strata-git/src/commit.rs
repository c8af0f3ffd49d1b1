//! Commit record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One historical commit as parsed from backend log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// The commit SHA (40 hex characters)
    pub hash: String,
    /// Commit message (subject line)
    pub message: String,
    /// Author name
    pub author: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub timestamp: DateTime<Utc>,
    /// Parent commit SHAs
    pub parents: Vec<String>,
    /// Paths touched by this commit, in backend order, without duplicates
    pub changed_files: Vec<String>,
    /// Human-readable change descriptors such as `modified: src/lib.rs`
    pub changes: Vec<String>,
}

impl CommitRecord {
    /// Validate that a SHA is a valid 40-character hex string
    #[must_use]
    pub fn is_valid_sha(sha: &str) -> bool {
        sha.len() == 40 && sha.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Get the short SHA (first 7 characters)
    #[must_use]
    pub fn short_sha(&self) -> &str {
        &self.hash[..7.min(self.hash.len())]
    }

    /// Check if this is a merge commit (has multiple parents)
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Check if this is a root commit (has no parents)
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Get the first line of the commit message (subject)
    #[must_use]
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// How a path changed between two trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Path was created
    Added,
    /// Content changed
    Modified,
    /// Path was removed
    Deleted,
    /// Path moved, possibly with edits
    Renamed,
    /// Path was copied from another path
    Copied,
    /// File type changed (e.g. regular file to symlink)
    TypeChanged,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
            Self::Renamed => write!(f, "renamed"),
            Self::Copied => write!(f, "copied"),
            Self::TypeChanged => write!(f, "type_changed"),
        }
    }
}

/// A single entry of a name-status listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Kind of change
    pub kind: ChangeKind,
    /// Path the change applies to (the new path for renames and copies)
    pub path: String,
    /// Source path for renames and copies
    pub old_path: Option<String>,
    /// Backend similarity score (0-100) for renames and copies
    pub similarity: Option<u8>,
}

impl FileChange {
    /// Parse one `--name-status` style line
    ///
    /// Accepted shapes are `M\tpath` and `R087\told\tnew`. Returns `None` for
    /// anything else.
    #[must_use]
    pub fn parse_name_status(line: &str) -> Option<Self> {
        let mut fields = line.split('\t');
        let status = fields.next()?.trim();
        let mut letters = status.chars();
        let letter = letters.next()?;
        let score = letters.as_str();
        let similarity = if score.is_empty() {
            None
        } else {
            Some(score.parse::<u8>().ok()?.min(100))
        };

        let kind = match letter {
            'A' => ChangeKind::Added,
            'M' => ChangeKind::Modified,
            'D' => ChangeKind::Deleted,
            'R' => ChangeKind::Renamed,
            'C' => ChangeKind::Copied,
            'T' => ChangeKind::TypeChanged,
            _ => return None,
        };

        let first = fields.next().filter(|p| !p.is_empty())?;
        let change = match kind {
            ChangeKind::Renamed | ChangeKind::Copied => {
                let second = fields.next().filter(|p| !p.is_empty())?;
                Self {
                    kind,
                    path: second.to_string(),
                    old_path: Some(first.to_string()),
                    similarity,
                }
            }
            _ => Self {
                kind,
                path: first.to_string(),
                old_path: None,
                similarity: None,
            },
        };

        if fields.next().is_some() {
            return None;
        }
        Some(change)
    }

    /// Render the change as a free-form descriptor
    #[must_use]
    pub fn describe(&self) -> String {
        match (&self.old_path, self.similarity) {
            (Some(old), Some(score)) => {
                format!("{}: {} -> {} ({}%)", self.kind, old, self.path, score)
            }
            (Some(old), None) => format!("{}: {} -> {}", self.kind, old, self.path),
            _ => format!("{}: {}", self.kind, self.path),
        }
    }
}
