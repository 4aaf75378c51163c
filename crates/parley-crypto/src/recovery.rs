//! Human-transcribable recovery phrase for a 32-byte private key.
//!
//! The key is split into four 8-byte groups. Each group gets a 2-bit parity
//! value (the sum of its thirty-two 2-bit slices, mod 4) appended after the
//! data bits, and the resulting 66 bits are read MSB-first as six 11-bit
//! indices into the 2048-word English list.
//!
//! ```text
//! group (64 bits) || parity (2 bits)  ->  w0 w1 w2 w3 w4 w5
//! ```
//!
//! Parity catches roughly three out of four single-word substitutions. It
//! is a transcription check, not an integrity guarantee.

use std::fmt;

use bip39::Language;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    error::RecoveryError,
    keys::{KEY_SIZE, PrivateKey},
};

/// Number of words in a phrase
pub const PHRASE_WORDS: usize = 24;

const GROUP_BYTES: usize = 8;
const WORDS_PER_GROUP: usize = 6;
const BITS_PER_WORD: usize = 11;
const WORD_MASK: u128 = (1 << BITS_PER_WORD) - 1;
const PARITY_BITS: u32 = 2;
const PARITY_MASK: u128 = (1 << PARITY_BITS) - 1;

/// A 24-word recovery phrase, upper-case and space-separated.
///
/// Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryPhrase(String);

impl RecoveryPhrase {
    /// The phrase as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The individual words.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ')
    }
}

impl Drop for RecoveryPhrase {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecoveryPhrase([REDACTED])")
    }
}

/// Encode a private key as a recovery phrase.
pub fn key_to_recovery(key: &PrivateKey) -> RecoveryPhrase {
    let list = Language::English.word_list();
    let mut words = Zeroizing::new(Vec::with_capacity(PHRASE_WORDS));

    for group in key.as_bytes().chunks_exact(GROUP_BYTES) {
        let mut data = [0u8; GROUP_BYTES];
        data.copy_from_slice(group);
        let data = u64::from_be_bytes(data);

        let bits = (u128::from(data) << PARITY_BITS) | u128::from(parity(data));
        for word in (0..WORDS_PER_GROUP).rev() {
            let index = (bits >> (word * BITS_PER_WORD)) & WORD_MASK;
            words.push(list[index as usize].to_ascii_uppercase());
        }
    }

    RecoveryPhrase(words.join(" "))
}

/// Decode a recovery phrase back to the private key it encodes.
///
/// Words are matched case-insensitively and may be separated by any
/// whitespace.
///
/// # Errors
///
/// - `InvalidPhrase`: wrong word count, a word outside the list, or a
///   parity mismatch in any group. The cause is not reported.
pub fn recovery_to_key(phrase: &str) -> Result<PrivateKey, RecoveryError> {
    let indices = phrase
        .split_whitespace()
        .map(|word| Language::English.find_word(&word.to_ascii_lowercase()))
        .collect::<Option<Vec<u16>>>()
        .map(Zeroizing::new)
        .ok_or(RecoveryError::InvalidPhrase)?;

    if indices.len() != PHRASE_WORDS {
        return Err(RecoveryError::InvalidPhrase);
    }

    let mut seed = Zeroizing::new([0u8; KEY_SIZE]);
    for (group, words) in indices.chunks_exact(WORDS_PER_GROUP).enumerate() {
        let bits =
            words.iter().fold(0u128, |acc, &index| (acc << BITS_PER_WORD) | u128::from(index));

        let data = (bits >> PARITY_BITS) as u64;
        if u128::from(parity(data)) != bits & PARITY_MASK {
            return Err(RecoveryError::InvalidPhrase);
        }
        seed[group * GROUP_BYTES..(group + 1) * GROUP_BYTES].copy_from_slice(&data.to_be_bytes());
    }

    Ok(PrivateKey::from_bytes(*seed))
}

/// Sum of the thirty-two 2-bit slices of `data`, mod 4.
fn parity(data: u64) -> u8 {
    let sum: u32 = (0..32).map(|slice| ((data >> (2 * slice)) & 0b11) as u32).sum();
    (sum % 4) as u8
}
