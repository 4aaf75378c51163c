//! Fuzz target for recovery phrase decoding
//!
//! Feeds arbitrary text to `recovery_to_key`. Any phrase that decodes must
//! re-encode to the canonical uppercase, single-spaced form of its words.
//!
//! The fuzzer should NEVER panic. Every rejection is `InvalidPhrase`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_crypto::{key_to_recovery, recovery_to_key};

fuzz_target!(|data: &[u8]| {
    let Ok(phrase) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(key) = recovery_to_key(phrase) {
        let canonical = phrase.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        assert_eq!(key_to_recovery(&key).as_str(), canonical);
    }
});
