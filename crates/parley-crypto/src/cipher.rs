//! Message encryption using AES-256-GCM.
//!
//! An envelope is `nonce (12) || ciphertext || tag (16)`, hex-encoded as one
//! string at the boundary. Every call to [`encrypt`] draws its own nonce
//! from the environment, so concurrent calls under the same key never share
//! one.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};

use crate::{
    env::Environment,
    error::CipherError,
    keys::{PrivateKey, PublicKey, SharedKey, Signature},
};

/// Nonce width (96 bits)
pub const NONCE_SIZE: usize = 12;

/// GCM tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// An encrypted message: nonce, ciphertext and tag as one opaque byte string.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope(Vec<u8>);

impl Envelope {
    /// Wrap raw envelope bytes. Length is checked on decryption.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded envelope.
    pub fn from_hex(input: &str) -> Result<Self, CipherError> {
        hex::decode(input.trim()).map(Self).map_err(|_| CipherError::InvalidHex)
    }

    /// Raw envelope bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Plaintext length (envelope length minus nonce and tag).
    pub fn plaintext_len(&self) -> usize {
        self.0.len().saturating_sub(NONCE_SIZE + TAG_SIZE)
    }

    /// Sign the envelope bytes with the sender's identity key.
    pub fn sign(&self, identity: &PrivateKey) -> Signature {
        identity.sign(&self.0)
    }

    /// Check that `sender` signed this envelope.
    pub fn verify_signature(&self, sender: &PublicKey, signature: &Signature) -> bool {
        sender.verify(&self.0, signature)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Envelope({} bytes)", self.0.len())
    }
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(env: &impl Environment, key: &SharedKey, plaintext: &[u8]) -> Envelope {
    let mut nonce = [0u8; NONCE_SIZE];
    env.random_bytes(&mut nonce);
    seal(key, nonce, plaintext)
}

fn seal(key: &SharedKey, nonce: [u8; NONCE_SIZE], plaintext: &[u8]) -> Envelope {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(&nonce), plaintext) else {
        unreachable!("AES-256-GCM encryption cannot fail for messages under 64 GiB");
    };

    let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Envelope(envelope)
}

/// Decrypt an envelope.
///
/// # Errors
///
/// - `Authentication`: wrong key, tampered bytes, or an envelope too short
///   to hold a nonce and tag
pub fn decrypt(key: &SharedKey, envelope: &Envelope) -> Result<Vec<u8>, CipherError> {
    if envelope.0.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CipherError::Authentication);
    }

    let (nonce, ciphertext) = envelope.0.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher.decrypt(Nonce::from_slice(nonce), ciphertext).map_err(|_| CipherError::Authentication)
}
