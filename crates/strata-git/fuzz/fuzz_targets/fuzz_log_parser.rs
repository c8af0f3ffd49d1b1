#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_git::parse_log;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let commits = parse_log(&raw, 64);
    assert!(commits.len() <= 64);
});
