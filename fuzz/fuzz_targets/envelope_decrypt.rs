//! Fuzz target for channel envelopes
//!
//! # Strategy
//!
//! - Arbitrary envelope bytes under an arbitrary key
//! - Valid envelopes with one byte flipped
//! - Hex decoding of arbitrary text
//!
//! # Invariants
//!
//! - Decryption never panics, whatever the length
//! - A freshly sealed envelope opens to its plaintext
//! - Any single-byte change makes decryption fail

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_crypto::{Envelope, SharedKey, decrypt, encrypt};
use parley_harness::SimEnv;

#[derive(Debug, Arbitrary)]
struct Scenario {
    key: [u8; 32],
    seed: u64,
    plaintext: Vec<u8>,
    raw: Vec<u8>,
    hex: String,
    flip_at: usize,
    flip_mask: u8,
}

fuzz_target!(|scenario: Scenario| {
    let key = SharedKey::from_bytes(scenario.key);

    let _ = decrypt(&key, &Envelope::from_bytes(scenario.raw));
    if let Ok(envelope) = Envelope::from_hex(&scenario.hex) {
        let _ = decrypt(&key, &envelope);
    }

    let env = SimEnv::with_seed(scenario.seed);
    let sealed = encrypt(&env, &key, &scenario.plaintext);
    assert_eq!(decrypt(&key, &sealed).ok(), Some(scenario.plaintext));

    if scenario.flip_mask != 0 {
        let mut bytes = sealed.as_bytes().to_vec();
        let index = scenario.flip_at % bytes.len();
        bytes[index] ^= scenario.flip_mask;
        assert!(decrypt(&key, &Envelope::from_bytes(bytes)).is_err());
    }
});
