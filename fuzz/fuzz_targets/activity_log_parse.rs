//! Fuzz target for activity log parsing, in both the line-delimited and
//! the legacy list layouts.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scoremark::activity::{analyze_logs, fuzz_parse_activity_log};

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(events) = fuzz_parse_activity_log(input) {
        let report = analyze_logs(&events);
        assert!(report.active_minutes <= report.events);
    }
});
