// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Tests for the strata_conflicts MCP tool handler


use mcp_harness::McpTestHarness;
use serde_json::json;
use similar_asserts::assert_eq;
use test_utils::{TempTestDir, TestGitRepo};

use std::time::Duration;
use strata_git::EngineOptions;
use strata_mcp::server::CONFLICTS_TOOL;

const ONE_REGION: &str = "fn main() {\n<<<<<<< HEAD\n    ours();\n=======\n    theirs();\n>>>>>>> topic\n}\n";

// ============================================================================
// Explicit Paths
// ============================================================================

#[tokio::test]
async fn test_conflicts_in_named_file() {
    let repo = TestGitRepo::new("conflicts_named");
    repo.write_file("main.rs", ONE_REGION);
    let harness = McpTestHarness::new();

    let report = harness
        .conflicts(&repo.path_str(), Some(&["main.rs"]))
        .await
        .expect("scan should succeed");

    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert_eq!(conflict.file, "main.rs");
    assert_eq!(conflict.line_number, 2);
    assert!(conflict.content.starts_with("<<<<<<< HEAD"));
    assert!(conflict.content.ends_with(">>>>>>> topic"));
    assert!(report.file_errors.is_empty());
}

#[tokio::test]
async fn test_conflicts_clean_file_has_none() {
    let dir = TempTestDir::new("conflicts_clean");
    dir.create_file("clean.txt", "nothing to see\n=====\n");
    let harness = McpTestHarness::new();

    let report = harness
        .conflicts(&dir.path_str(), Some(&["clean.txt"]))
        .await
        .expect("scan should succeed");

    assert_eq!(report.files_scanned, 1);
    assert!(report.conflicts.is_empty());
    assert!(report.file_errors.is_empty());
}

#[tokio::test]
async fn test_conflicts_malformed_marker_reported_per_file() {
    let dir = TempTestDir::new("conflicts_malformed");
    dir.create_file("bad.txt", "<<<<<<< HEAD\nstill open\n");
    dir.create_file("good.txt", ONE_REGION);
    let harness = McpTestHarness::new();

    let report = harness
        .conflicts(&dir.path_str(), Some(&["bad.txt", "good.txt"]))
        .await
        .expect("scan should succeed");

    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].file, "good.txt");
    assert_eq!(report.file_errors.len(), 1);
    assert_eq!(report.file_errors[0].file, "bad.txt");
    assert!(report.file_errors[0].message.contains("unterminated"));
}

#[tokio::test]
async fn test_conflicts_unreadable_file_does_not_stop_scan() {
    let dir = TempTestDir::new("conflicts_unreadable");
    dir.create_file("real.txt", ONE_REGION);
    let harness = McpTestHarness::new();

    let report = harness
        .conflicts(&dir.path_str(), Some(&["ghost.txt", "real.txt"]))
        .await
        .expect("scan should succeed");

    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.file_errors.len(), 1);
    assert_eq!(report.file_errors[0].file, "ghost.txt");
}

#[tokio::test]
async fn test_conflicts_paths_outside_repository_are_refused() {
    let outer = TempTestDir::new("conflicts_escape");
    outer.create_file("secret.txt", ONE_REGION);
    outer.create_file("repo/inside.txt", ONE_REGION);
    let workspace = outer.path().join("repo").display().to_string();
    let absolute = outer.path().join("secret.txt").display().to_string();
    let harness = McpTestHarness::new();

    let report = harness
        .conflicts(
            &workspace,
            Some(&["../secret.txt", absolute.as_str(), "inside.txt"]),
        )
        .await
        .expect("scan should succeed");

    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].file, "inside.txt");
    assert_eq!(report.file_errors.len(), 2);
    for refused in &report.file_errors {
        assert!(refused.message.contains("outside the repository"));
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_conflicts_stalled_read_times_out_per_file() {
    let dir = TempTestDir::new("conflicts_stalled");
    dir.create_file("real.txt", ONE_REGION);
    let fifo = dir.path().join("stalled");
    let made = std::process::Command::new("mkfifo")
        .arg(&fifo)
        .status()
        .expect("run mkfifo");
    assert!(made.success());
    let harness =
        McpTestHarness::with_options(EngineOptions::default().with_timeout(Duration::from_millis(200)));

    let report = harness
        .conflicts(&dir.path_str(), Some(&["stalled", "real.txt"]))
        .await
        .expect("scan should succeed");

    // Release the reader still blocked on the pipe
    drop(
        std::fs::OpenOptions::new()
            .write(true)
            .open(&fifo)
            .expect("open pipe for writing"),
    );

    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.file_errors.len(), 1);
    assert_eq!(report.file_errors[0].file, "stalled");
    assert!(report.file_errors[0].message.contains("timed out after 200ms"));
}

// ============================================================================
// Working Tree Discovery
// ============================================================================

#[tokio::test]
async fn test_conflicts_found_after_failed_merge() {
    let repo = TestGitRepo::new("conflicts_merge");
    repo.create_merge_conflict("shared.txt");
    let harness = McpTestHarness::new();

    let report = harness
        .conflicts(&repo.path_str(), None)
        .await
        .expect("scan should succeed");

    assert!(report.error.is_none());
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].file, "shared.txt");
    assert_eq!(report.conflicts[0].line_number, 1);
    assert!(report.conflicts[0].content.contains("ours"));
    assert!(report.conflicts[0].content.contains("theirs"));
}

#[tokio::test]
async fn test_conflicts_clean_worktree_scans_nothing() {
    let repo = TestGitRepo::new("conflicts_clean_tree");
    repo.create_commits(2);
    let harness = McpTestHarness::new();

    let report = harness
        .conflicts(&repo.path_str(), None)
        .await
        .expect("scan should succeed");

    assert_eq!(report.files_scanned, 0);
    assert!(report.conflicts.is_empty());
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_conflicts_outside_repository_sets_error() {
    let dir = TempTestDir::new("conflicts_no_repo");
    let harness = McpTestHarness::new();

    let report = harness
        .conflicts(&dir.path_str(), None)
        .await
        .expect("scan should succeed");

    assert_eq!(report.files_scanned, 0);
    assert!(report.error.is_some());
}

// ============================================================================
// Limits and Cancellation
// ============================================================================

#[tokio::test]
async fn test_conflicts_max_files_limits_scan() {
    let dir = TempTestDir::new("conflicts_max_files");
    for name in ["a.txt", "b.txt", "c.txt"] {
        dir.create_file(name, ONE_REGION);
    }
    let harness = McpTestHarness::new();

    let value = harness
        .invoke_with_json(
            CONFLICTS_TOOL,
            json!({"workspace": dir.path_str(), "paths": ["a.txt", "b.txt", "c.txt"], "max_files": 2}),
        )
        .await
        .expect("raw scan should succeed");

    assert_eq!(value["files_scanned"], json!(2));
    assert_eq!(value["conflicts"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_conflicts_cancelled_before_start() {
    let dir = TempTestDir::new("conflicts_cancelled");
    dir.create_file("a.txt", ONE_REGION);
    let harness = McpTestHarness::new();
    harness.cancel_token().cancel();

    let report = harness
        .conflicts(&dir.path_str(), Some(&["a.txt"]))
        .await
        .expect("cancellation is reported, not raised");

    assert_eq!(report.files_scanned, 0);
    assert!(report.error.expect("error").contains("cancelled"));
}
