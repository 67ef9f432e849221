//! Fuzz target: duration text form
//!
//! Parsing must never panic; any parsed duration must print back to a
//! string that parses to the same value.
//!
//! Run: cargo +nightly fuzz run fuzz_duration_parse -- -max_len=64

#![no_main]
use libfuzzer_sys::fuzz_target;
use ndau_core::Duration;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(d) = s.parse::<Duration>() {
            let text = d.to_string();
            assert_eq!(text.parse::<Duration>(), Ok(d), "{} -> {}", s, text);
        }
    }
});
