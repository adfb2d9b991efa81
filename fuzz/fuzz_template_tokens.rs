//! Fuzz target for template usage-token extraction.
//!
//! Run with: cargo +nightly fuzz run fuzz_template_tokens

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let tokens = lantern_core::tokens::extract(source);
        for token in &tokens.tokens {
            let _ = lantern_core::tokens::dasherize_component(token);
        }
    }
});
