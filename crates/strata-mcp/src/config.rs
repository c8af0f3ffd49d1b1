//! Configuration for the strata-mcp server
//!
//! This module provides configuration types and utilities for the MCP server,
//! including the default repository, backend limits, and logging options.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use strata_git::EngineOptions;
use strata_git::engine::{DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY};

/// Strata MCP Server - git history analysis, diffing and search
#[derive(Parser, Debug, Clone)]
#[command(name = "strata-mcp")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Subcommand to run (defaults to MCP server mode)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Default repository path for tool calls
    ///
    /// This is used when a tool call doesn't name a workspace.
    /// Defaults to the current working directory.
    #[arg(short, long, env = "STRATA_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Timeout in seconds for each call into the repository
    #[arg(long, env = "STRATA_TIMEOUT_SECS", default_value_t = DEFAULT_CALL_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    /// Maximum commits or files processed concurrently
    #[arg(long, env = "STRATA_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Enable verbose logging (debug level)
    ///
    /// Logs are written to stderr to avoid interfering with MCP stdio
    /// transport.
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    ///
    /// Only errors and warnings will be logged.
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: None,
            workspace: None,
            timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
            concurrency: DEFAULT_CONCURRENCY,
            verbose: false,
            quiet: false,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the tool catalogue as JSON
    Tools,

    /// Run a single tool and print its JSON result
    ///
    /// Example:
    ///   strata-mcp call strata_search --args '{"query": "TODO", "max_commits": 20}'
    Call {
        /// Tool name, such as `strata_log`
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

impl Config {
    /// Get the workspace path, using current directory as default
    ///
    /// Returns `None` if no workspace is specified and the current
    /// directory cannot be determined.
    #[must_use]
    pub fn workspace_path(&self) -> Option<PathBuf> {
        self.workspace
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }

    /// Engine tuning derived from the command line
    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_concurrency(self.concurrency)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The workspace path is specified but doesn't exist or isn't a directory
    /// - The timeout or concurrency is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref workspace) = self.workspace {
            if !workspace.exists() {
                return Err(ConfigError::WorkspaceNotFound(workspace.clone()));
            }
            if !workspace.is_dir() {
                return Err(ConfigError::WorkspaceNotDirectory(workspace.clone()));
            }
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidLimit("timeout-secs"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidLimit("concurrency"));
        }

        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Workspace path not found
    #[error("Workspace path not found: {0}")]
    WorkspaceNotFound(PathBuf),

    /// Workspace path is not a directory
    #[error("Workspace path is not a directory: {0}")]
    WorkspaceNotDirectory(PathBuf),

    /// A numeric limit that must be positive was zero
    #[error("--{0} must be greater than zero")]
    InvalidLimit(&'static str),
}
