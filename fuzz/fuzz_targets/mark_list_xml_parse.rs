//! Fuzz target for mark list XML parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run mark_list_xml_parse
//!
//! Or with a corpus:
//!   cargo +nightly fuzz run mark_list_xml_parse fuzz/corpus/mark_list_xml_parse/

#![no_main]

use libfuzzer_sys::fuzz_target;
use scoremark::io::{from_mark_list_slice, to_mark_list_string};

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for one page of marks.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    // Errors are fine; panics are not. Parsed lists must also be writable.
    if let Ok(list) = from_mark_list_slice(data) {
        let _ = to_mark_list_string(&list);
    }
});
