//! Fuzz target for layout classification.
//!
//! Run with: cargo +nightly fuzz run fuzz_classify
//!
//! The first byte picks where the input splits into a pod prefix and a
//! relative path.

#![no_main]

use lantern_core::{LayoutMatcher, PathMatcher, SymbolKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(rest) else {
        return;
    };
    let split = (split as usize).min(text.len());
    let (prefix, path) = match text.split_at_checked(split) {
        Some(parts) => parts,
        None => ("", text),
    };

    let matcher = LayoutMatcher::new((!prefix.is_empty()).then_some(prefix));
    if let Some(result) = matcher.classify(path) {
        assert!(!result.name.is_empty());
        let _ = SymbolKind::from_match(&result);
    }
});
