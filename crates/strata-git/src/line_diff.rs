// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Line-level diffing of one file between two revisions
//!
//! Alignment is a longest-common-subsequence over whole lines with exact,
//! case-sensitive comparison. The raw edit script is then refined: inside each
//! change hunk the k-th deleted line is paired with the k-th added line, and
//! the pair is reported as a single [`LineKind::Modified`] entry when
//! [`is_edit`] holds.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp};
use tracing::warn;

/// Time allowed for aligning one file before the changed region is
/// reported as a whole-block replacement
pub const ALIGNMENT_DEADLINE: Duration = Duration::from_secs(2);

/// Classification of a single line in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Present and identical in both revisions
    Context,
    /// Only in the new revision
    Added,
    /// Only in the old revision
    Deleted,
    /// Edited in place
    Modified,
}

/// One entry of a line-level diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    /// 1-based index of this entry within the diff
    pub position: usize,
    /// Line number in the old revision, if the line exists there
    pub old_line: Option<usize>,
    /// Line number in the new revision, if the line exists there
    pub new_line: Option<usize>,
    /// Line content (the new text for modified lines)
    pub content: String,
    /// Previous text of a modified line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    /// Classification
    pub kind: LineKind,
}

/// Line-level diff of one path between two commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLineDiff {
    /// Path of the file
    pub path: String,
    /// Old commit identifier
    pub from_commit: String,
    /// New commit identifier
    pub to_commit: String,
    /// Whether the path exists in both revisions
    pub exists_in_both: bool,
    /// Line count of the longer revision
    pub total_lines: usize,
    /// Number of [`LineKind::Added`] entries
    pub added_lines: usize,
    /// Number of [`LineKind::Deleted`] entries
    pub deleted_lines: usize,
    /// Number of [`LineKind::Modified`] entries
    pub modified_lines: usize,
    /// Ordered diff entries
    pub lines: Vec<LineDiff>,
    /// Why the diff could not be computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileLineDiff {
    /// A diff that could not be computed
    #[must_use]
    pub fn failed(path: &str, from_commit: &str, to_commit: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            from_commit: from_commit.to_string(),
            to_commit: to_commit.to_string(),
            exists_in_both: false,
            total_lines: 0,
            added_lines: 0,
            deleted_lines: 0,
            modified_lines: 0,
            lines: Vec::new(),
            error: Some(message.into()),
        }
    }

    fn from_entries(
        path: &str,
        from_commit: &str,
        to_commit: &str,
        exists_in_both: bool,
        total_lines: usize,
        lines: Vec<LineDiff>,
    ) -> Self {
        let count = |kind: LineKind| lines.iter().filter(|l| l.kind == kind).count();
        Self {
            path: path.to_string(),
            from_commit: from_commit.to_string(),
            to_commit: to_commit.to_string(),
            exists_in_both,
            total_lines,
            added_lines: count(LineKind::Added),
            deleted_lines: count(LineKind::Deleted),
            modified_lines: count(LineKind::Modified),
            lines,
            error: None,
        }
    }

    /// Number of unchanged lines
    #[must_use]
    pub fn context_lines(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind == LineKind::Context)
            .count()
    }

    /// Whether the two revisions differ at all
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.added_lines + self.deleted_lines + self.modified_lines > 0
    }
}

/// Compute the line diff of `path` given its text at both revisions
///
/// `None` means the path does not exist at that revision.
#[must_use]
pub fn compute_line_diff(
    path: &str,
    from_commit: &str,
    to_commit: &str,
    old: Option<&str>,
    new: Option<&str>,
) -> FileLineDiff {
    match (old, new) {
        (None, None) => FileLineDiff::failed(
            path,
            from_commit,
            to_commit,
            format!("{path} does not exist in {from_commit} or {to_commit}"),
        ),
        (None, Some(new)) => {
            let lines: Vec<&str> = new.lines().collect();
            let entries = one_sided(&lines, LineKind::Added);
            FileLineDiff::from_entries(path, from_commit, to_commit, false, lines.len(), entries)
        }
        (Some(old), None) => {
            let lines: Vec<&str> = old.lines().collect();
            let entries = one_sided(&lines, LineKind::Deleted);
            FileLineDiff::from_entries(path, from_commit, to_commit, false, lines.len(), entries)
        }
        (Some(old), Some(new)) => {
            let old_lines: Vec<&str> = old.lines().collect();
            let new_lines: Vec<&str> = new.lines().collect();
            let ops = align(&old_lines, &new_lines);
            let entries = build_entries(&ops, &old_lines, &new_lines);
            let total = old_lines.len().max(new_lines.len());
            FileLineDiff::from_entries(path, from_commit, to_commit, true, total, entries)
        }
    }
}

/// Whether a deleted/added pair looks like an in-place edit
///
/// The rule: the shared prefix plus the shared suffix (in chars, never
/// overlapping) covers at least half of the longer line.
#[must_use]
pub fn is_edit(old: &str, new: &str) -> bool {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    let longer = a.len().max(b.len());
    if longer == 0 {
        return false;
    }

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let room = a.len().min(b.len()) - prefix;
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take(room)
        .take_while(|(x, y)| x == y)
        .count();

    2 * (prefix + suffix) >= longer
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

fn one_sided(lines: &[&str], kind: LineKind) -> Vec<LineDiff> {
    lines
        .iter()
        .enumerate()
        .map(|(i, content)| LineDiff {
            position: i + 1,
            old_line: (kind == LineKind::Deleted).then_some(i + 1),
            new_line: (kind == LineKind::Added).then_some(i + 1),
            content: (*content).to_string(),
            old_content: None,
            kind,
        })
        .collect()
}

/// Minimal edit script from `old` to `new`
///
/// Past [`ALIGNMENT_DEADLINE`] the changed middle degrades to a plain
/// delete-then-insert block.
fn align(old: &[&str], new: &[&str]) -> Vec<Op> {
    let deadline = Instant::now() + ALIGNMENT_DEADLINE;
    // Myers yields a minimal script, so its Equal runs form a longest common subsequence
    let script = similar::capture_diff_slices_deadline(Algorithm::Myers, old, new, Some(deadline));
    if Instant::now() >= deadline {
        warn!(
            old_lines = old.len(),
            new_lines = new.len(),
            "Alignment deadline exceeded, changed region reported as replaced"
        );
    }

    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    for op in script {
        match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => ops.extend((0..len).map(|k| Op::Equal(old_index + k, new_index + k))),
            DiffOp::Delete {
                old_index, old_len, ..
            } => ops.extend((old_index..old_index + old_len).map(Op::Delete)),
            DiffOp::Insert {
                new_index, new_len, ..
            } => ops.extend((new_index..new_index + new_len).map(Op::Insert)),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                ops.extend((old_index..old_index + old_len).map(Op::Delete));
                ops.extend((new_index..new_index + new_len).map(Op::Insert));
            }
        }
    }
    ops
}

fn build_entries(ops: &[Op], old: &[&str], new: &[&str]) -> Vec<LineDiff> {
    let mut entries = Vec::with_capacity(ops.len());
    let mut deleted = Vec::new();
    let mut inserted = Vec::new();

    for op in ops {
        match *op {
            Op::Delete(i) => deleted.push(i),
            Op::Insert(j) => inserted.push(j),
            Op::Equal(i, j) => {
                flush_hunk(&mut entries, &mut deleted, &mut inserted, old, new);
                push_entry(&mut entries, Some(i), Some(j), new[j], None, LineKind::Context);
            }
        }
    }
    flush_hunk(&mut entries, &mut deleted, &mut inserted, old, new);
    entries
}

fn flush_hunk(
    entries: &mut Vec<LineDiff>,
    deleted: &mut Vec<usize>,
    inserted: &mut Vec<usize>,
    old: &[&str],
    new: &[&str],
) {
    for k in 0..deleted.len().max(inserted.len()) {
        match (deleted.get(k).copied(), inserted.get(k).copied()) {
            (Some(i), Some(j)) if is_edit(old[i], new[j]) => push_entry(
                entries,
                Some(i),
                Some(j),
                new[j],
                Some(old[i]),
                LineKind::Modified,
            ),
            (d, a) => {
                if let Some(i) = d {
                    push_entry(entries, Some(i), None, old[i], None, LineKind::Deleted);
                }
                if let Some(j) = a {
                    push_entry(entries, None, Some(j), new[j], None, LineKind::Added);
                }
            }
        }
    }
    deleted.clear();
    inserted.clear();
}

fn push_entry(
    entries: &mut Vec<LineDiff>,
    old_index: Option<usize>,
    new_index: Option<usize>,
    content: &str,
    old_content: Option<&str>,
    kind: LineKind,
) {
    entries.push(LineDiff {
        position: entries.len() + 1,
        old_line: old_index.map(|i| i + 1),
        new_line: new_index.map(|j| j + 1),
        content: content.to_string(),
        old_content: old_content.map(str::to_string),
        kind,
    });
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn text_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec("[abc]{0,3}", 0..12).prop_map(|lines| lines.join("\n"))
    }

    /// Textbook quadratic LCS length
    fn lcs_len(old: &[&str], new: &[&str]) -> usize {
        let mut row = vec![0usize; new.len() + 1];
        for a in old {
            let mut diagonal = 0;
            for (j, b) in new.iter().enumerate() {
                let above = row[j + 1];
                row[j + 1] = if a == b { diagonal + 1 } else { above.max(row[j]) };
                diagonal = above;
            }
        }
        row[new.len()]
    }

    proptest! {
        /// Property: counts agree with the typed entries
        #[test]
        fn prop_counts_match_entries(old in text_strategy(), new in text_strategy()) {
            let d = compute_line_diff("f", "a", "b", Some(&old), Some(&new));
            let count = |kind| d.lines.iter().filter(|l| l.kind == kind).count();
            prop_assert_eq!(d.added_lines, count(LineKind::Added));
            prop_assert_eq!(d.deleted_lines, count(LineKind::Deleted));
            prop_assert_eq!(d.modified_lines, count(LineKind::Modified));
            prop_assert_eq!(d.total_lines, old.lines().count().max(new.lines().count()));
        }

        /// Property: context entries form a longest common subsequence
        #[test]
        fn prop_context_is_lcs(old in text_strategy(), new in text_strategy()) {
            let d = compute_line_diff("f", "a", "b", Some(&old), Some(&new));
            let old_lines: Vec<&str> = old.lines().collect();
            let new_lines: Vec<&str> = new.lines().collect();
            prop_assert_eq!(d.context_lines(), lcs_len(&old_lines, &new_lines));
        }

        /// Property: every old and new line is accounted for exactly once, in order
        #[test]
        fn prop_entries_cover_both_sides(old in text_strategy(), new in text_strategy()) {
            let d = compute_line_diff("f", "a", "b", Some(&old), Some(&new));
            let olds: Vec<usize> = d.lines.iter().filter_map(|l| l.old_line).collect();
            let news: Vec<usize> = d.lines.iter().filter_map(|l| l.new_line).collect();
            prop_assert_eq!(olds, (1..=old.lines().count()).collect::<Vec<_>>());
            prop_assert_eq!(news, (1..=new.lines().count()).collect::<Vec<_>>());
        }

        /// Property: positions never decrease
        #[test]
        fn prop_positions_monotonic(old in text_strategy(), new in text_strategy()) {
            let d = compute_line_diff("f", "a", "b", Some(&old), Some(&new));
            for pair in d.lines.windows(2) {
                prop_assert!(pair[0].position <= pair[1].position);
            }
        }
    }
}
