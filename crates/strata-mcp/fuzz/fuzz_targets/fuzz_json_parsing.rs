#![no_main]

//! Fuzz target for JSON parsing
//!
//! This target tests that arbitrary bytes never cause panics
//! when parsed as JSON for tool arguments.

use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};

use strata_mcp::handlers::{ConflictsInput, DiffInput, FileDiffInput, LogInput, SearchInput};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _: Result<Value, _> = serde_json::from_str(s);

        let _: Result<LogInput, _> = serde_json::from_str(s);
        let _: Result<DiffInput, _> = serde_json::from_str(s);
        let _: Result<FileDiffInput, _> = serde_json::from_str(s);
        let _: Result<ConflictsInput, _> = serde_json::from_str(s);
        let _: Result<SearchInput, _> = serde_json::from_str(s);

        let _: Result<Map<String, Value>, _> = serde_json::from_str(s);
    }

    // Also try parsing raw bytes (should fail gracefully)
    let _: Result<Value, _> = serde_json::from_slice(data);
});
