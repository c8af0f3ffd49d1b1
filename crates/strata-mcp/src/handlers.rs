//! Tool handlers for the MCP server
//!
//! This module implements the handlers for each MCP tool, bridging
//! MCP requests to history engine operations and returning typed results.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use strata_git::conflict::{ConflictScanReport, FileScanError, scan_batch};
use strata_git::{
    CommitDiffInfo, CommitHistory, CommitSearchResponse, FileLineDiff, GitError, GitRepo,
    HistoryEngine, LogQuery, SearchQuery,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// ============================================================================
// Error Types
// ============================================================================

/// Handler errors
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Engine error
    #[error("Git operation failed: {0}")]
    Git(#[from] GitError),

    /// Invalid input - missing required field
    #[error("Invalid input: {0}. Check the tool's required parameters.")]
    InvalidInput(String),

    /// JSON serialization error
    #[error("Failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No tool with this name is registered
    #[error("Unknown tool: {0}. Run 'strata-mcp tools' to list available tools.")]
    UnknownTool(String),
}

// ============================================================================
// Input Types
// ============================================================================

/// Input for the log tool
#[derive(Debug, Clone, Deserialize)]
pub struct LogInput {
    /// Repository path (defaults to the server workspace)
    pub workspace: Option<String>,
    /// Maximum commits to return
    #[serde(default = "default_log_limit")]
    pub max_commits: usize,
    /// Starting reference (defaults to HEAD)
    pub rev: Option<String>,
}

fn default_log_limit() -> usize {
    50
}

/// Input for the diff tool
#[derive(Debug, Clone, Deserialize)]
pub struct DiffInput {
    /// Repository path (defaults to the server workspace)
    pub workspace: Option<String>,
    /// Old commit, branch, or tag
    pub from: String,
    /// New commit, branch, or tag
    #[serde(default = "default_to")]
    pub to: String,
    /// Restrict the diff to these paths
    #[serde(default)]
    pub paths: Vec<String>,
    /// Maximum changed files to list
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

/// Input for the file_diff tool
#[derive(Debug, Clone, Deserialize)]
pub struct FileDiffInput {
    /// Repository path (defaults to the server workspace)
    pub workspace: Option<String>,
    /// Old commit, branch, or tag
    pub from: String,
    /// New commit, branch, or tag
    #[serde(default = "default_to")]
    pub to: String,
    /// A single path to diff
    pub path: Option<String>,
    /// Several paths to diff
    #[serde(default)]
    pub paths: Vec<String>,
}

impl FileDiffInput {
    fn all_paths(&self) -> Vec<String> {
        self.path
            .iter()
            .chain(self.paths.iter())
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// Input for the conflicts tool
#[derive(Debug, Clone, Deserialize)]
pub struct ConflictsInput {
    /// Repository path (defaults to the server workspace)
    pub workspace: Option<String>,
    /// Files to scan, relative to the repository (defaults to changed files)
    #[serde(default)]
    pub paths: Vec<String>,
    /// Maximum files to scan
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

/// Input for the search tool
#[derive(Debug, Clone, Deserialize)]
pub struct SearchInput {
    /// Repository path (defaults to the server workspace)
    pub workspace: Option<String>,
    /// Literal text to search for (case-insensitive)
    pub query: String,
    /// Maximum commits to examine
    #[serde(default = "default_search_limit")]
    pub max_commits: usize,
    /// Starting reference (defaults to HEAD)
    pub rev: Option<String>,
    /// Maximum files read per commit
    pub max_files_per_commit: Option<usize>,
}

fn default_to() -> String {
    "HEAD".to_string()
}

fn default_max_files() -> usize {
    200
}

fn default_search_limit() -> usize {
    100
}

// ============================================================================
// Handler Functions
// ============================================================================

/// Parse input from MCP arguments into a typed struct
pub(crate) fn parse_input<T: for<'de> Deserialize<'de>>(
    args: Option<Map<String, Value>>,
) -> Result<T, HandlerError> {
    let value = args
        .map(Value::Object)
        .unwrap_or(Value::Object(serde_json::Map::new()));
    serde_json::from_value(value).map_err(|e| HandlerError::InvalidInput(e.to_string()))
}

/// Pick the requested repository or fall back to the server default
fn resolve_workspace(
    requested: Option<&str>,
    default_workspace: Option<&Path>,
) -> Result<PathBuf, HandlerError> {
    match requested.filter(|w| !w.trim().is_empty()) {
        Some(workspace) => Ok(PathBuf::from(workspace)),
        None => default_workspace.map(Path::to_path_buf).ok_or_else(|| {
            HandlerError::InvalidInput(
                "No workspace given and the server has no default. Pass 'workspace'.".to_string(),
            )
        }),
    }
}

/// Handle the strata_log tool
///
/// Returns recent commits, newest first.
pub async fn handle_log(
    engine: &HistoryEngine,
    args: Option<Map<String, Value>>,
    default_workspace: Option<&Path>,
) -> Result<CommitHistory, HandlerError> {
    let input: LogInput = parse_input(args)?;
    let repo = resolve_workspace(input.workspace.as_deref(), default_workspace)?;

    let mut query = LogQuery::latest(input.max_commits);
    if let Some(rev) = input.rev.as_deref() {
        query = query.from(rev);
    }

    Ok(engine.commit_log(&repo, &query).await?)
}

/// Handle the strata_diff tool
///
/// Lists files added, modified, deleted, and renamed between two commits.
pub async fn handle_diff(
    engine: &HistoryEngine,
    args: Option<Map<String, Value>>,
    default_workspace: Option<&Path>,
) -> Result<CommitDiffInfo, HandlerError> {
    let input: DiffInput = parse_input(args)?;
    let repo = resolve_workspace(input.workspace.as_deref(), default_workspace)?;

    let info = engine
        .commit_diff(
            &repo,
            &input.from,
            &input.to,
            &input.paths,
            Some(input.max_files),
        )
        .await?;
    Ok(info)
}

/// Handle the strata_file_diff tool
///
/// Returns a line-level diff for each requested path, in request order.
pub async fn handle_file_diff(
    engine: &HistoryEngine,
    args: Option<Map<String, Value>>,
    default_workspace: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<Vec<FileLineDiff>, HandlerError> {
    let input: FileDiffInput = parse_input(args)?;
    let repo = resolve_workspace(input.workspace.as_deref(), default_workspace)?;

    let paths = input.all_paths();
    if paths.is_empty() {
        return Err(HandlerError::InvalidInput(
            "At least one file is required. Provide 'path' or 'paths'.".to_string(),
        ));
    }

    let diffs = engine
        .file_line_diffs(&repo, &input.from, &input.to, &paths, cancel)
        .await?;
    Ok(diffs)
}

/// Handle the strata_conflicts tool
///
/// Scans the named files, or the repository's conflicted and modified files,
/// for unresolved merge conflict markers.
pub async fn handle_conflicts(
    engine: &HistoryEngine,
    args: Option<Map<String, Value>>,
    default_workspace: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<ConflictScanReport, HandlerError> {
    let input: ConflictsInput = parse_input(args)?;
    let repo = resolve_workspace(input.workspace.as_deref(), default_workspace)?;

    let timeout = engine.options().call_timeout;
    let (root, mut paths) = if input.paths.is_empty() {
        match list_worktree(repo.clone(), timeout).await {
            Ok(found) => found,
            Err(e) => {
                warn!(repo = %repo.display(), error = %e, "Cannot list working tree changes");
                return Ok(ConflictScanReport {
                    error: Some(e.to_string()),
                    ..Default::default()
                });
            }
        }
    } else {
        (repo, input.paths)
    };
    paths.truncate(input.max_files);
    debug!(files = paths.len(), "Scanning for conflict markers");

    let mut readable = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for path in paths {
        if !stays_inside(&path) {
            unreadable.push(FileScanError {
                message: format!("{path} is outside the repository working tree"),
                file: path,
            });
            continue;
        }
        match tokio::time::timeout(timeout, tokio::fs::read_to_string(root.join(&path))).await {
            Ok(Ok(text)) => readable.push((path, text)),
            Ok(Err(e)) => unreadable.push(FileScanError {
                file: path,
                message: e.to_string(),
            }),
            Err(_) => {
                let message = timed_out("read_file", timeout).to_string();
                warn!(file = %path, %message, "Skipping file");
                unreadable.push(FileScanError {
                    file: path,
                    message,
                });
            }
        }
    }

    let mut report = scan_batch(readable, engine.options().concurrency, cancel).await;
    report.file_errors.extend(unreadable);
    Ok(report)
}

/// Run the status walk off the executor under the per-call timeout
async fn list_worktree(
    repo: PathBuf,
    timeout: Duration,
) -> Result<(PathBuf, Vec<String>), GitError> {
    let task = tokio::task::spawn_blocking(move || worktree_candidates(&repo));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(found)) => found,
        Ok(Err(join)) => Err(GitError::Task(join.to_string())),
        Err(_) => Err(timed_out("worktree_status", timeout)),
    }
}

fn timed_out(operation: &'static str, timeout: Duration) -> GitError {
    GitError::Timeout {
        operation,
        millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Relative path that cannot climb out of the directory it is joined to
fn stays_inside(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Working directory and changed paths of the repository containing `path`
fn worktree_candidates(path: &Path) -> Result<(PathBuf, Vec<String>), GitError> {
    let repo = GitRepo::discover(path)?;
    let root = repo
        .workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| GitError::RepositoryNotFound {
            path: format!("{} (bare repository has no working tree)", path.display()),
        })?;
    Ok((root, repo.worktree_changed_paths()?))
}

/// Handle the strata_search tool
///
/// Case-insensitive literal search through files changed by recent commits.
pub async fn handle_search(
    engine: &HistoryEngine,
    args: Option<Map<String, Value>>,
    default_workspace: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<CommitSearchResponse, HandlerError> {
    let input: SearchInput = parse_input(args)?;

    if input.query.is_empty() {
        return Err(HandlerError::InvalidInput(
            "Search query cannot be empty. Provide a search term like 'TODO' or 'fn main'."
                .to_string(),
        ));
    }
    let repo = resolve_workspace(input.workspace.as_deref(), default_workspace)?;

    let mut query = SearchQuery::new(&input.query, input.max_commits);
    if let Some(rev) = input.rev.as_deref() {
        query = query.from(rev);
    }
    if let Some(max) = input.max_files_per_commit {
        query = query.with_max_files(max);
    }

    Ok(engine.search_commits(&repo, &query, cancel).await?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_git::EngineOptions;

    /// Helper to convert a JSON Value to a Map for testing
    fn to_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected JSON object"),
        }
    }

    fn engine() -> HistoryEngine {
        HistoryEngine::with_git2(EngineOptions::default())
    }

    #[test]
    fn test_parse_log_input_defaults() {
        let input: LogInput = parse_input(None).expect("parse");
        assert_eq!(input.max_commits, 50);
        assert!(input.workspace.is_none());
        assert!(input.rev.is_none());
    }

    #[test]
    fn test_parse_diff_input() {
        let args = to_map(json!({
            "from": "v1.0",
            "paths": ["src/lib.rs"],
            "max_files": 10
        }));
        let input: DiffInput = parse_input(Some(args)).expect("parse");
        assert_eq!(input.from, "v1.0");
        assert_eq!(input.to, "HEAD");
        assert_eq!(input.paths, vec!["src/lib.rs"]);
        assert_eq!(input.max_files, 10);
    }

    #[test]
    fn test_parse_diff_input_requires_from() {
        let result: Result<DiffInput, _> = parse_input(None);
        assert!(matches!(result, Err(HandlerError::InvalidInput(_))));
    }

    #[test]
    fn test_file_diff_paths_are_combined() {
        let args = to_map(json!({
            "from": "a",
            "path": "one.rs",
            "paths": ["two.rs", ""]
        }));
        let input: FileDiffInput = parse_input(Some(args)).expect("parse");
        assert_eq!(input.all_paths(), vec!["one.rs", "two.rs"]);
    }

    #[test]
    fn test_parse_search_input_defaults() {
        let args = to_map(json!({ "query": "todo" }));
        let input: SearchInput = parse_input(Some(args)).expect("parse");
        assert_eq!(input.max_commits, 100);
        assert!(input.max_files_per_commit.is_none());
    }

    #[test]
    fn test_parse_conflicts_input_defaults() {
        let input: ConflictsInput = parse_input(None).expect("parse");
        assert!(input.paths.is_empty());
        assert_eq!(input.max_files, 200);
    }

    #[test]
    fn test_stays_inside_rejects_escapes() {
        assert!(stays_inside("src/main.rs"));
        assert!(stays_inside("./notes.txt"));
        assert!(!stays_inside("../outside.txt"));
        assert!(!stays_inside("src/../../outside.txt"));
        assert!(!stays_inside("/etc/passwd"));
        assert!(!stays_inside(""));
    }

    #[test]
    fn test_timed_out_reports_millis() {
        let err = timed_out("read_file", Duration::from_millis(250));
        assert_eq!(err.to_string(), "read_file timed out after 250ms");
    }

    #[tokio::test]
    async fn test_list_worktree_outside_repository() {
        let dir = std::env::temp_dir().join(format!("strata-no-repo-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");

        let result = list_worktree(dir.clone(), Duration::from_secs(5)).await;
        let _ = std::fs::remove_dir_all(&dir);

        assert!(matches!(result, Err(GitError::RepositoryNotFound { .. })));
    }

    #[test]
    fn test_resolve_workspace_prefers_request() {
        let default = PathBuf::from("/default");
        let resolved =
            resolve_workspace(Some("/requested"), Some(default.as_path())).expect("resolve");
        assert_eq!(resolved, PathBuf::from("/requested"));

        let resolved = resolve_workspace(None, Some(default.as_path())).expect("resolve");
        assert_eq!(resolved, default);

        assert!(resolve_workspace(Some("  "), None).is_err());
    }

    #[tokio::test]
    async fn test_handle_search_empty_query() {
        let args = to_map(json!({ "query": "", "workspace": "/tmp" }));
        let result = handle_search(&engine(), Some(args), None, &CancellationToken::new()).await;
        assert!(matches!(result, Err(HandlerError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_handle_search_zero_commits_is_rejected() {
        let args = to_map(json!({ "query": "x", "max_commits": 0, "workspace": "/tmp" }));
        let result = handle_search(&engine(), Some(args), None, &CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(HandlerError::Git(GitError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_handle_file_diff_requires_path() {
        let args = to_map(json!({ "from": "a", "workspace": "/tmp" }));
        let result =
            handle_file_diff(&engine(), Some(args), None, &CancellationToken::new()).await;
        assert!(matches!(result, Err(HandlerError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_handle_log_missing_repository_is_annotated() {
        let args = to_map(json!({ "workspace": "/nonexistent/strata/repo" }));
        let history = handle_log(&engine(), Some(args), None).await.expect("handle");
        assert!(history.commits.is_empty());
        assert!(history.error.is_some());
    }

    #[tokio::test]
    async fn test_handle_conflicts_outside_repository() {
        let args = to_map(json!({ "workspace": "/nonexistent/strata/repo" }));
        let report = handle_conflicts(&engine(), Some(args), None, &CancellationToken::new())
            .await
            .expect("handle");
        assert_eq!(report.files_scanned, 0);
        assert!(report.error.is_some());
    }
}
