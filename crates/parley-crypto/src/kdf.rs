//! Key derivation for handshake outputs using HKDF-SHA512.
//!
//! All four parameters are protocol constants. Changing any of them changes
//! every shared secret derived afterwards, so they must match bit-for-bit
//! across implementations.

use hkdf::Hkdf;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::keys::{KEY_SIZE, SharedKey};

/// Domain-separation prefix prepended to the input key material
const DOMAIN_PREFIX: [u8; 32] = [0xFF; 32];

/// Fixed HKDF salt (one SHA-512 block of zeros)
const SALT: [u8; 64] = [0u8; 64];

/// Application identifier used as HKDF info
const INFO: &[u8] = b"Parley";

/// Derive a 32-byte shared key from concatenated Diffie-Hellman outputs.
///
/// Computes `HKDF-SHA512(salt = 0^64, ikm = 0xFF^32 || material, info)` and
/// keeps the first 32 bytes of output key material.
pub fn kdf(material: &[u8]) -> SharedKey {
    let mut ikm = Zeroizing::new(Vec::with_capacity(DOMAIN_PREFIX.len() + material.len()));
    ikm.extend_from_slice(&DOMAIN_PREFIX);
    ikm.extend_from_slice(material);

    let hkdf = Hkdf::<Sha512>::new(Some(&SALT[..]), &ikm);

    let mut okm = [0u8; KEY_SIZE];
    let Ok(()) = hkdf.expand(INFO, &mut okm) else {
        unreachable!("32 bytes is a valid HKDF-SHA512 output length");
    };

    SharedKey::from_bytes(okm)
}
