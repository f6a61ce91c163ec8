//! Fuzz the positional index parser: arbitrary input must never panic,
//! and accepted input must round-trip through Display.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mindnoscape::NodeIndex;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(index) = NodeIndex::parse(s) {
            let rendered = index.to_string();
            let reparsed = NodeIndex::parse(&rendered).expect("rendered index must parse");
            assert_eq!(reparsed, index);
        }
    }
});
