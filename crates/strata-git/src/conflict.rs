// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Unresolved merge-conflict detection
//!
//! Each file is scanned line by line with an explicit three-state machine.
//! Out-of-order markers become per-file annotations; they never discard
//! regions already found and never stop the rest of a batch.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::GitError;
use crate::pool::fan_out;

/// Prefix of the line opening a conflict region
pub const OPEN_MARKER: &str = "<<<<<<<";

/// The whole line separating the two sides of a region
pub const SEPARATOR_MARKER: &str = "=======";

/// Prefix of the line closing a conflict region
pub const CLOSE_MARKER: &str = ">>>>>>>";

/// One complete conflict region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResult {
    /// File containing the region
    pub file: String,
    /// 1-based line number of the opening marker
    pub line_number: usize,
    /// Opening marker through closing marker, inclusive
    pub content: String,
}

/// Outcome of scanning a single file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileScan {
    /// Complete regions, in file order
    pub conflicts: Vec<ConflictResult>,
    /// Out-of-order marker annotations
    pub malformed: Vec<String>,
}

/// A problem confined to one file of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileScanError {
    /// File the problem belongs to
    pub file: String,
    /// What went wrong
    pub message: String,
}

/// Combined result of scanning a batch of files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictScanReport {
    /// Every region found, grouped by file in input order
    pub conflicts: Vec<ConflictResult>,
    /// Malformed markers and failed scans
    pub file_errors: Vec<FileScanError>,
    /// Files that were actually scanned
    pub files_scanned: usize,
    /// Why the batch stopped early, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum ScanState<'a> {
    Clean,
    AfterOpen { start: usize, lines: Vec<&'a str> },
    AfterSeparator { start: usize, lines: Vec<&'a str> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Open,
    Separator,
    Close,
}

fn classify(line: &str) -> Option<Marker> {
    if line.starts_with(OPEN_MARKER) {
        Some(Marker::Open)
    } else if line == SEPARATOR_MARKER {
        Some(Marker::Separator)
    } else if line.starts_with(CLOSE_MARKER) {
        Some(Marker::Close)
    } else {
        None
    }
}

/// Scan one file's text for conflict regions
#[must_use]
pub fn scan_file(path: &str, text: &str) -> FileScan {
    let mut scan = FileScan::default();
    let mut state = ScanState::Clean;

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let marker = classify(line);

        state = match (state, marker) {
            (ScanState::Clean, Some(Marker::Open)) => ScanState::AfterOpen {
                start: number,
                lines: vec![line],
            },
            (ScanState::Clean, Some(Marker::Separator)) => {
                scan.malformed
                    .push(format!("line {number}: separator outside a conflict region"));
                ScanState::Clean
            }
            (ScanState::Clean, Some(Marker::Close)) => {
                scan.malformed
                    .push(format!("line {number}: closing marker without an opening marker"));
                ScanState::Clean
            }
            (ScanState::Clean, None) => ScanState::Clean,

            (
                ScanState::AfterOpen { start, .. } | ScanState::AfterSeparator { start, .. },
                Some(Marker::Open),
            ) => {
                scan.malformed.push(format!(
                    "line {number}: nested opening marker inside region opened at line {start}"
                ));
                ScanState::AfterOpen {
                    start: number,
                    lines: vec![line],
                }
            }
            (ScanState::AfterOpen { start, mut lines }, Some(Marker::Separator)) => {
                lines.push(line);
                ScanState::AfterSeparator { start, lines }
            }
            (ScanState::AfterOpen { start, .. }, Some(Marker::Close)) => {
                scan.malformed.push(format!(
                    "line {number}: closing marker before separator in region opened at line {start}"
                ));
                ScanState::Clean
            }
            (ScanState::AfterOpen { start, mut lines }, None) => {
                lines.push(line);
                ScanState::AfterOpen { start, lines }
            }

            (ScanState::AfterSeparator { start, mut lines }, Some(Marker::Separator)) => {
                scan.malformed.push(format!(
                    "line {number}: second separator in region opened at line {start}"
                ));
                lines.push(line);
                ScanState::AfterSeparator { start, lines }
            }
            (ScanState::AfterSeparator { start, mut lines }, Some(Marker::Close)) => {
                lines.push(line);
                scan.conflicts.push(ConflictResult {
                    file: path.to_string(),
                    line_number: start,
                    content: lines.join("\n"),
                });
                ScanState::Clean
            }
            (ScanState::AfterSeparator { start, mut lines }, None) => {
                lines.push(line);
                ScanState::AfterSeparator { start, lines }
            }
        };
    }

    match state {
        ScanState::Clean => {}
        ScanState::AfterOpen { start, .. } | ScanState::AfterSeparator { start, .. } => {
            scan.malformed
                .push(format!("line {start}: unterminated conflict region"));
        }
    }

    debug!(
        path,
        conflicts = scan.conflicts.len(),
        malformed = scan.malformed.len(),
        "Scanned file"
    );
    scan
}

/// Scan a batch of `(path, text)` pairs with at most `concurrency` in flight
///
/// The report lists conflicts and errors in input order. Once `cancel`
/// fires, files not yet scanned are left out and `error` says so.
pub async fn scan_batch(
    files: Vec<(String, String)>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> ConflictScanReport {
    let paths: Vec<String> = files.iter().map(|(path, _)| path.clone()).collect();
    let outcomes = fan_out(files, concurrency, cancel, |(path, text): (String, String)| async move {
        Ok::<FileScan, GitError>(scan_file(&path, &text))
    })
    .await;

    let mut report = ConflictScanReport::default();
    for (path, outcome) in paths.into_iter().zip(outcomes) {
        match outcome {
            Ok(scan) => {
                report.files_scanned += 1;
                report.conflicts.extend(scan.conflicts);
                report
                    .file_errors
                    .extend(scan.malformed.into_iter().map(|message| FileScanError {
                        file: path.clone(),
                        message,
                    }));
            }
            Err(GitError::Cancelled) => {
                report.error = Some(GitError::Cancelled.to_string());
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Conflict scan failed");
                report.file_errors.push(FileScanError {
                    file: path,
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        files = report.files_scanned,
        conflicts = report.conflicts.len(),
        errors = report.file_errors.len(),
        "Conflict scan complete"
    );
    report
}
