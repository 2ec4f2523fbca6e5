//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Any config that parses must also produce a serializable `x-metadata`
//! header value.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = llmrelay_config::AppConfig::parse(s) {
        let header = config.metadata_header();
        assert!(serde_json::from_str::<serde_json::Value>(&header).is_ok());
    }
});
