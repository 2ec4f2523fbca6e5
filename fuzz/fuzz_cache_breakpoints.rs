//! Fuzz target for prompt-cache breakpoint extraction on request bodies.
//!
//! Run with: cargo +nightly fuzz run fuzz_cache_breakpoints

#![no_main]

use libfuzzer_sys::fuzz_target;
use llmrelay_core::relay::cache_breakpoints;

fuzz_target!(|data: &[u8]| {
    if let Some((count, marks)) = cache_breakpoints(data) {
        assert!(marks.len() <= count);
    }
});
