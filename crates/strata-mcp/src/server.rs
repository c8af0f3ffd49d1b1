//! MCP server implementation for strata-mcp
//!
//! This module provides the MCP server that exposes git history analysis
//! (commit logs, diffs, conflict scanning, and content search) to LLMs via
//! MCP tool calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rust_mcp_sdk::McpServer;
use rust_mcp_sdk::mcp_server::ServerHandler;
use rust_mcp_sdk::schema::{
    CallToolRequestParams, CallToolResult, ListToolsResult, PaginatedRequestParams, RpcError,
    TextContent, Tool, ToolInputSchema, schema_utils::CallToolError,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use strata_git::HistoryEngine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::handlers::{self, HandlerError};

/// Tool listing recent commits
pub const LOG_TOOL: &str = "strata_log";
/// Tool classifying changed files between two commits
pub const DIFF_TOOL: &str = "strata_diff";
/// Tool producing line-level diffs of individual files
pub const FILE_DIFF_TOOL: &str = "strata_file_diff";
/// Tool scanning files for merge conflict markers
pub const CONFLICTS_TOOL: &str = "strata_conflicts";
/// Tool searching file content across history
pub const SEARCH_TOOL: &str = "strata_search";

/// Convert a JSON object into the properties format expected by ToolInputSchema.
///
/// ToolInputSchema expects `HashMap<String, Map<String, Value>>` for properties,
/// where each key maps to a JSON object describing that property's schema.
fn make_properties(json_obj: Value) -> HashMap<String, Map<String, Value>> {
    let mut properties = HashMap::new();
    if let Value::Object(obj) = json_obj {
        for (key, value) in obj {
            if let Value::Object(inner) = value {
                properties.insert(key, inner);
            }
        }
    }
    properties
}

fn tool(name: &str, title: &str, description: &str, required: &[&str], properties: Value) -> Tool {
    Tool {
        name: name.into(),
        description: Some(description.into()),
        input_schema: ToolInputSchema::new(
            required.iter().map(|r| (*r).to_string()).collect(),
            Some(make_properties(properties)),
            None,
        ),
        annotations: None,
        execution: None,
        icons: vec![],
        meta: None,
        output_schema: None,
        title: Some(title.into()),
    }
}

fn to_text<T: Serialize>(value: &T) -> Result<String, HandlerError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// The main strata MCP server handler
///
/// Exposes history engine operations as MCP tools for LLM consumption.
pub struct StrataServer {
    /// The history engine all tools run through
    engine: HistoryEngine,
    /// Default repository for tool calls
    workspace: Option<PathBuf>,
    /// Cancels in-flight batch operations on shutdown
    shutdown: CancellationToken,
}

impl StrataServer {
    /// Create a new strata server
    ///
    /// # Arguments
    ///
    /// * `engine` - The history engine used by every tool
    /// * `workspace` - Optional default repository path
    #[must_use]
    pub fn new(engine: HistoryEngine, workspace: Option<PathBuf>) -> Self {
        Self {
            engine,
            workspace,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get the default workspace path
    #[must_use]
    pub fn workspace(&self) -> Option<&PathBuf> {
        self.workspace.as_ref()
    }

    /// Token cancelled when the server shuts down
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run one tool and render its result as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns `HandlerError::UnknownTool` for an unregistered name, or the
    /// handler's error for invalid input.
    pub async fn call_tool(
        &self,
        name: &str,
        args: Option<Map<String, Value>>,
    ) -> Result<String, HandlerError> {
        let engine = &self.engine;
        let workspace = self.workspace.as_deref();
        let cancel = self.shutdown.child_token();

        match name {
            LOG_TOOL => to_text(&handlers::handle_log(engine, args, workspace).await?),
            DIFF_TOOL => to_text(&handlers::handle_diff(engine, args, workspace).await?),
            FILE_DIFF_TOOL => to_text(
                &handlers::handle_file_diff(engine, args, workspace, &cancel).await?,
            ),
            CONFLICTS_TOOL => to_text(
                &handlers::handle_conflicts(engine, args, workspace, &cancel).await?,
            ),
            SEARCH_TOOL => {
                to_text(&handlers::handle_search(engine, args, workspace, &cancel).await?)
            }
            _ => Err(HandlerError::UnknownTool(name.to_string())),
        }
    }

    /// Build the list of available tools
    #[must_use]
    pub fn build_tools() -> Vec<Tool> {
        vec![
            Self::log_tool(),
            Self::diff_tool(),
            Self::file_diff_tool(),
            Self::conflicts_tool(),
            Self::search_tool(),
        ]
    }

    fn log_tool() -> Tool {
        tool(
            LOG_TOOL,
            "Commit Log",
            "List recent commits, newest first, with author, timestamp, and changed files. \
             Merge commits list the files changed relative to every parent.",
            &[],
            json!({
                "workspace": {
                    "type": "string",
                    "description": "Repository path (defaults to the server workspace)"
                },
                "max_commits": {
                    "type": "integer",
                    "default": 50,
                    "description": "Maximum commits to return"
                },
                "rev": {
                    "type": "string",
                    "description": "Branch, tag, or SHA to start from (defaults to HEAD)"
                }
            }),
        )
    }

    fn diff_tool() -> Tool {
        tool(
            DIFF_TOOL,
            "Commit Diff",
            "List files added, modified, deleted, and renamed between two commits, \
             with the unified diff text.",
            &["from"],
            json!({
                "workspace": {
                    "type": "string",
                    "description": "Repository path (defaults to the server workspace)"
                },
                "from": {
                    "type": "string",
                    "description": "Old commit, branch, or tag"
                },
                "to": {
                    "type": "string",
                    "default": "HEAD",
                    "description": "New commit, branch, or tag"
                },
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Restrict the diff to these paths (optional)"
                },
                "max_files": {
                    "type": "integer",
                    "default": 200,
                    "description": "Maximum changed files to list"
                }
            }),
        )
    }

    fn file_diff_tool() -> Tool {
        tool(
            FILE_DIFF_TOOL,
            "File Line Diff",
            "Line-by-line diff of one or more files between two commits. Each line is \
             classified as context, added, deleted, or modified.",
            &["from"],
            json!({
                "workspace": {
                    "type": "string",
                    "description": "Repository path (defaults to the server workspace)"
                },
                "from": {
                    "type": "string",
                    "description": "Old commit, branch, or tag"
                },
                "to": {
                    "type": "string",
                    "default": "HEAD",
                    "description": "New commit, branch, or tag"
                },
                "path": {
                    "type": "string",
                    "description": "File to diff"
                },
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Several files to diff"
                }
            }),
        )
    }

    fn conflicts_tool() -> Tool {
        tool(
            CONFLICTS_TOOL,
            "Merge Conflicts",
            "Find unresolved merge conflict regions. Scans the given files, or the \
             repository's conflicted and modified files when none are given.",
            &[],
            json!({
                "workspace": {
                    "type": "string",
                    "description": "Repository path (defaults to the server workspace)"
                },
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Files to scan, relative to the repository (optional)"
                },
                "max_files": {
                    "type": "integer",
                    "default": 200,
                    "description": "Maximum files to scan"
                }
            }),
        )
    }

    fn search_tool() -> Tool {
        tool(
            SEARCH_TOOL,
            "Search History",
            "Case-insensitive literal search through the files changed by recent commits. \
             Returns matching lines grouped by commit and file.",
            &["query"],
            json!({
                "workspace": {
                    "type": "string",
                    "description": "Repository path (defaults to the server workspace)"
                },
                "query": {
                    "type": "string",
                    "description": "Text to search for (not a regular expression)"
                },
                "max_commits": {
                    "type": "integer",
                    "default": 100,
                    "description": "Maximum commits to examine"
                },
                "rev": {
                    "type": "string",
                    "description": "Branch, tag, or SHA to start from (defaults to HEAD)"
                },
                "max_files_per_commit": {
                    "type": "integer",
                    "description": "Maximum files read per commit (optional)"
                }
            }),
        )
    }

    /// Default repository as a path slice
    #[must_use]
    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }
}

impl Drop for StrataServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// ServerHandler implementation for the MCP protocol
#[async_trait]
impl ServerHandler for StrataServer {
    /// Handle requests to list available tools
    async fn handle_list_tools_request(
        &self,
        _params: Option<PaginatedRequestParams>,
        _runtime: Arc<dyn McpServer>,
    ) -> Result<ListToolsResult, RpcError> {
        Ok(ListToolsResult {
            tools: Self::build_tools(),
            meta: None,
            next_cursor: None,
        })
    }

    /// Handle requests to call a specific tool
    async fn handle_call_tool_request(
        &self,
        params: CallToolRequestParams,
        _runtime: Arc<dyn McpServer>,
    ) -> Result<CallToolResult, CallToolError> {
        debug!(tool = %params.name, "Calling tool");

        match self.call_tool(&params.name, params.arguments).await {
            Ok(text) => Ok(CallToolResult::text_content(vec![TextContent::new(
                text, None, None,
            )])),
            Err(HandlerError::UnknownTool(_)) => Err(CallToolError::unknown_tool(&params.name)),
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                let mut result =
                    CallToolResult::text_content(vec![TextContent::new(e.to_string(), None, None)]);
                result.is_error = Some(true);
                Ok(result)
            }
        }
    }
}
