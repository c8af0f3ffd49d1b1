#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_git::scan_file;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let scan = scan_file("fuzz.txt", &text);
    for conflict in &scan.conflicts {
        assert!(conflict.content.starts_with("<<<<<<<"));
    }
});
