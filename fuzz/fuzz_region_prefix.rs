//! Fuzz target for region → Bedrock prefix resolution.
//!
//! Run with: cargo +nightly fuzz run fuzz_region_prefix

#![no_main]

use libfuzzer_sys::fuzz_target;
use llmrelay_core::region::{DEFAULT_REGION_PREFIX, REGION_PREFIXES, regional_prefix};

fuzz_target!(|data: &[u8]| {
    let Ok(region) = std::str::from_utf8(data) else {
        return;
    };
    let prefix = regional_prefix(region);
    assert!(REGION_PREFIXES.contains(&prefix));
    if prefix != DEFAULT_REGION_PREFIX {
        assert!(region.starts_with(prefix));
    }
});
