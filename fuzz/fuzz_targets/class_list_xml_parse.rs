//! Fuzz target for class list XML parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scoremark::io::from_class_list_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }
    let _ = from_class_list_slice(data);
});
