//! Fuzz the snapshot JSON codec: arbitrary input must never panic, and
//! accepted snapshots must survive a serialize/parse cycle.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mindnoscape::mindmap::snapshot::MindmapSnapshot;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(snapshot) = MindmapSnapshot::from_json(s) {
            let json = snapshot.to_json().expect("snapshot must serialize");
            let reparsed = MindmapSnapshot::from_json(&json).expect("round trip must parse");
            assert_eq!(reparsed, snapshot);
        }
    }
});
