//! Fuzz target for dependency grammar parsing.
//!
//! The alphabet is fixed so wildcard expansion has something to match.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scoremark::grammar::DependencyGrammar;

const ALPHABET: &[&str] = &[
    "notehead-full",
    "notehead-empty",
    "stem",
    "beam",
    "ledger_line",
    "numeral_0",
    "numeral_1",
];

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(grammar) = DependencyGrammar::parse(source, ALPHABET.iter().copied()) {
        for (head, child) in grammar.rules() {
            assert!(ALPHABET.contains(&head) && ALPHABET.contains(&child));
        }
    }
});
