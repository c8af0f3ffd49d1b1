//! strata-mcp: MCP server for git history analysis
//!
//! This binary exposes commit logs, commit and line diffs, merge conflict
//! scanning, and history search as MCP tools. The `tools` and `call`
//! subcommands run the same tool dispatch from the command line.

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value;
use strata_git::HistoryEngine;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use strata_mcp::config::{Command, Config};
use strata_mcp::server::StrataServer;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    // Logs go to stderr so stdout stays free for protocol and tool output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(config.log_level().into()))
        .init();

    config.validate()?;

    let engine = HistoryEngine::with_git2(config.engine_options());
    let server = StrataServer::new(engine, config.workspace_path());
    debug!(options = ?config.engine_options(), workspace = ?server.workspace(), "Configured");

    match config.command {
        Some(Command::Tools) => {
            let tools = StrataServer::build_tools();
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Some(Command::Call { ref tool, ref args }) => {
            let arguments = match serde_json::from_str(args)
                .with_context(|| format!("--args is not valid JSON: {args}"))?
            {
                Value::Object(map) => Some(map),
                Value::Null => None,
                _ => bail!("--args must be a JSON object"),
            };

            let shutdown = server.shutdown_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    shutdown.cancel();
                }
            });

            let output = server.call_tool(tool, arguments).await?;
            println!("{output}");
        }
        None => {
            info!(
                tools = StrataServer::build_tools().len(),
                "strata-mcp ready; use the `tools` or `call` subcommands to run tools"
            );
        }
    }

    Ok(())
}
