#![no_main]

//! Fuzz target for tool dispatch
//!
//! Arbitrary tool names and argument values go through the same dispatch the
//! MCP server uses. The workspace never exists, so no repository is touched.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};

use strata_git::{EngineOptions, HistoryEngine};
use strata_mcp::server::StrataServer;

#[derive(Debug, Arbitrary)]
struct ToolCall {
    tool: String,
    text: String,
    number: i64,
    flag: bool,
}

fuzz_target!(|call: ToolCall| {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let server = StrataServer::new(
        HistoryEngine::with_git2(EngineOptions::default()),
        Some("/nonexistent/strata-fuzz".into()),
    );

    let args = json!({
        "from": call.text,
        "to": if call.flag { Value::Null } else { json!(call.text) },
        "path": call.text,
        "query": call.text,
        "rev": call.text,
        "max_commits": call.number,
        "max_files": call.number,
    });
    let Value::Object(map) = args else { return };

    let _ = runtime.block_on(server.call_tool(&call.tool, Some(map)));
});
