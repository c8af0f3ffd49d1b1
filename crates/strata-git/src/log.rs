// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Commit log parsing
//!
//! Backends emit history as a sequence of records. Each record starts with
//! [`RECORD_SEPARATOR`] followed by one header line of [`FIELD_SEPARATOR`]
//! delimited fields:
//!
//! ```text
//! <RS>hash<US>author name<US>author email<US>unix time<US>parents<US>subject
//! M\tsrc/lib.rs
//! R087\told.rs\tnew.rs
//! ```
//!
//! The lines after the header are name-status entries. A merge commit may be
//! emitted once per parent; consecutive records sharing a hash are folded into
//! a single [`CommitRecord`] whose file list is the union of all blocks.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::commit::{CommitRecord, FileChange};

/// Marks the start of a commit record (ASCII RS)
pub const RECORD_SEPARATOR: char = '\x1e';

/// Separates header fields inside a record (ASCII US)
pub const FIELD_SEPARATOR: char = '\x1f';

const HEADER_FIELDS: usize = 6;

/// Parse raw log text into commit records, newest first
///
/// Record order from the backend is preserved. At most `max` distinct commits
/// are returned. Malformed records are logged and skipped.
#[must_use]
pub fn parse_log(raw: &str, max: usize) -> Vec<CommitRecord> {
    let mut records: Vec<RecordBuilder> = Vec::new();

    let mut chunks = raw.split(RECORD_SEPARATOR);
    if let Some(preamble) = chunks.next() {
        if !preamble.trim().is_empty() {
            warn!(
                bytes = preamble.len(),
                "Ignoring log text before first record"
            );
        }
    }

    for chunk in chunks {
        let Some(parsed) = RecordBuilder::parse(chunk) else {
            continue;
        };

        if let Some(last) = records.last_mut() {
            if last.record.hash == parsed.record.hash {
                last.absorb(parsed);
                continue;
            }
        }

        if records.len() >= max {
            break;
        }
        records.push(parsed);
    }

    debug!(commits = records.len(), "Parsed commit log");
    records.into_iter().map(|b| b.record).collect()
}

/// Render one record header in the format [`parse_log`] understands
#[must_use]
pub fn render_header(
    hash: &str,
    author: &str,
    author_email: &str,
    timestamp: i64,
    parents: &[String],
    subject: &str,
) -> String {
    let clean = |s: &str| s.replace([RECORD_SEPARATOR, FIELD_SEPARATOR, '\n', '\r'], " ");
    format!(
        "{RECORD_SEPARATOR}{hash}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{timestamp}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}\n",
        clean(author),
        clean(author_email),
        parents.join(" "),
        clean(subject),
    )
}

struct RecordBuilder {
    record: CommitRecord,
    seen_files: HashSet<String>,
    seen_changes: HashSet<String>,
}

impl RecordBuilder {
    fn parse(chunk: &str) -> Option<Self> {
        let mut lines = chunk.lines();
        let header = lines.next().unwrap_or("");
        let fields: Vec<&str> = header.split(FIELD_SEPARATOR).collect();

        if fields.len() < HEADER_FIELDS {
            warn!(
                fields = fields.len(),
                expected = HEADER_FIELDS,
                "Skipping malformed commit record"
            );
            return None;
        }

        let hash = fields[0].trim();
        if !CommitRecord::is_valid_sha(hash) {
            warn!(hash, "Skipping commit record with invalid hash");
            return None;
        }

        let timestamp = match fields[3].trim().parse::<i64>() {
            Ok(secs) => DateTime::<Utc>::from_timestamp(secs, 0),
            Err(_) => None,
        };
        let Some(timestamp) = timestamp else {
            warn!(hash, raw = fields[3], "Skipping commit record with invalid timestamp");
            return None;
        };

        let separator = FIELD_SEPARATOR.to_string();
        let subject = fields[HEADER_FIELDS - 1..].join(separator.as_str());

        let mut builder = Self {
            record: CommitRecord {
                hash: hash.to_lowercase(),
                message: subject.trim().to_string(),
                author: fields[1].trim().to_string(),
                author_email: fields[2].trim().to_string(),
                timestamp,
                parents: fields[4].split_whitespace().map(str::to_string).collect(),
                changed_files: Vec::new(),
                changes: Vec::new(),
            },
            seen_files: HashSet::new(),
            seen_changes: HashSet::new(),
        };

        for line in lines {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            match FileChange::parse_name_status(line) {
                Some(change) => builder.add_change(&change),
                None => warn!(hash, line, "Skipping unrecognised change line"),
            }
        }

        Some(builder)
    }

    fn add_change(&mut self, change: &FileChange) {
        if self.seen_files.insert(change.path.clone()) {
            self.record.changed_files.push(change.path.clone());
        }
        let descriptor = change.describe();
        if self.seen_changes.insert(descriptor.clone()) {
            self.record.changes.push(descriptor);
        }
    }

    /// Fold another block of the same commit into this one
    fn absorb(&mut self, other: Self) {
        for path in other.record.changed_files {
            if self.seen_files.insert(path.clone()) {
                self.record.changed_files.push(path);
            }
        }
        for descriptor in other.record.changes {
            if self.seen_changes.insert(descriptor.clone()) {
                self.record.changes.push(descriptor);
            }
        }
    }
}
