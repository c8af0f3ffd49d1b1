// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for strata-git

use thiserror::Error;

/// Errors that can occur during git history analysis
#[derive(Debug, Error)]
pub enum GitError {
    /// A required argument was missing or empty
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// Error from git2 library
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// Repository not found at the specified path
    #[error("Repository not found: {path}")]
    RepositoryNotFound {
        /// The path that was searched for a repository
        path: String,
    },

    /// Invalid commit reference (branch, tag, or SHA)
    #[error("Invalid commit reference: {reference}")]
    InvalidReference {
        /// The reference string that could not be resolved
        reference: String,
    },

    /// The blob at a path is not text
    #[error("Binary content at {path}")]
    BinaryContent {
        /// Path of the binary file
        path: String,
    },

    /// A backend call exceeded its deadline
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// Backend capability that was called
        operation: &'static str,
        /// Configured per-call timeout in milliseconds
        millis: u64,
    },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// A worker task failed to complete
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl GitError {
    /// Whether this error should stop a history walk
    ///
    /// Localized failures (a timed-out file, a binary blob, a bad reference)
    /// are reported per unit; everything that means the backend itself is
    /// unreachable, or that the caller gave up, ends the walk.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RepositoryNotFound { .. } | Self::Cancelled | Self::Git2(_)
        )
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
