//! Elliptic-curve primitives: key generation, signatures, Diffie-Hellman.
//!
//! Keys live on the Ed25519 signing curve. A private key is a 32-byte seed;
//! its scalar is the clamped lower half of `SHA-512(seed)` (RFC 8032), and
//! its public key is the compressed Edwards point `scalar·B`.
//!
//! Diffie-Hellman runs on the birationally equivalent Montgomery curve:
//! the private side uses the same expanded scalar bytes and the public side
//! maps the Edwards point to its Montgomery `u` coordinate. Both parties
//! must apply this mapping identically, otherwise the outputs diverge with
//! no error signal.
//!
//! ```text
//! seed ──SHA-512──▶ scalar bytes ──clamp──▶ a
//!                                           │
//!        Edwards:  A = a·B   (public key, signatures, challenges)
//!        Montgomery: DH(a, P) = u(a · mont(P))
//! ```

use std::fmt;

use curve25519_dalek::{
    edwards::{CompressedEdwardsY, EdwardsPoint},
    montgomery::MontgomeryPoint,
};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::{env::Environment, error::KeyError};

/// Width of every scalar, point and shared key in bytes.
pub const KEY_SIZE: usize = 32;

/// Width of a signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Decode a fixed-width hex string.
pub(crate) fn decode_hex<const N: usize>(input: &str) -> Result<[u8; N], KeyError> {
    let bytes = hex::decode(input.trim()).map_err(|_| KeyError::InvalidHex)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| KeyError::InvalidLength { expected: N, actual })
}

/// A party's private key (32-byte seed).
///
/// Owned by exactly one party and never transmitted. Zeroized on drop.
#[derive(Clone)]
pub struct PrivateKey {
    seed: [u8; KEY_SIZE],
}

impl PrivateKey {
    /// Generate a fresh private key from the environment's randomness.
    pub fn generate(env: &impl Environment) -> Self {
        Self { seed: env.random_key_bytes() }
    }

    /// Wrap raw seed bytes.
    pub fn from_bytes(seed: [u8; KEY_SIZE]) -> Self {
        Self { seed }
    }

    /// Parse a hex-encoded private key.
    pub fn from_hex(input: &str) -> Result<Self, KeyError> {
        decode_hex(input).map(Self::from_bytes)
    }

    /// Raw seed bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.seed
    }

    /// Hex encoding of the seed, for storage by the owner only.
    pub fn to_hex(&self) -> String {
        hex::encode(self.seed)
    }

    /// Derive the public key. Deterministic and one-way.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(EdwardsPoint::mul_base_clamped(*self.scalar_bytes()))
    }

    /// Sign an arbitrary message (Ed25519, RFC 8032).
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signing_key = SigningKey::from_bytes(&self.seed);
        Signature(signing_key.sign(message).to_bytes())
    }

    /// Answer a login challenge by scaling the challenge point by our scalar.
    ///
    /// Only the owner of the scalar can produce `a·C`. This is a
    /// proof of possession, not a signature, and must not be used to
    /// authenticate arbitrary data.
    pub fn challenge_response(&self, challenge: &PublicKey) -> PublicKey {
        PublicKey::from_point(challenge.point.mul_clamped(*self.scalar_bytes()))
    }

    /// Diffie-Hellman with a signing-curve public key.
    ///
    /// Both keys are mapped to the Montgomery curve before combination, so
    /// `a.diffie_hellman(&b.public_key()) == b.diffie_hellman(&a.public_key())`.
    pub fn diffie_hellman(&self, their_public: &PublicKey) -> [u8; KEY_SIZE] {
        x25519(*self.scalar_bytes(), their_public.to_montgomery())
    }

    /// Secret only this key's owner can reproduce, used to self-encrypt
    /// private storage.
    pub fn personal_key(&self) -> SharedKey {
        SharedKey::from_bytes(self.diffie_hellman(&self.public_key()))
    }

    /// Lower half of `SHA-512(seed)`, unclamped. Clamping happens inside
    /// the `*_clamped` multiplications.
    fn scalar_bytes(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        let digest = Sha512::digest(self.seed);
        let mut scalar = Zeroizing::new([0u8; KEY_SIZE]);
        scalar.copy_from_slice(&digest[..KEY_SIZE]);
        scalar
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Montgomery-ladder Diffie-Hellman on raw scalar bytes (RFC 7748 X25519).
fn x25519(scalar: [u8; KEY_SIZE], u: MontgomeryPoint) -> [u8; KEY_SIZE] {
    u.mul_clamped(scalar).to_bytes()
}

/// A compressed public key on the signing curve.
///
/// Construction always decompresses, so every `PublicKey` is a valid curve
/// point.
#[derive(Clone, Copy)]
pub struct PublicKey {
    compressed: CompressedEdwardsY,
    point: EdwardsPoint,
}

impl PublicKey {
    fn from_point(point: EdwardsPoint) -> Self {
        Self { compressed: point.compress(), point }
    }

    /// Parse and validate compressed point bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Result<Self, KeyError> {
        let compressed = CompressedEdwardsY(bytes);
        let point = compressed.decompress().ok_or(KeyError::InvalidPoint)?;
        Ok(Self { compressed, point })
    }

    /// Parse and validate a hex-encoded public key.
    pub fn from_hex(input: &str) -> Result<Self, KeyError> {
        decode_hex(input).and_then(Self::from_bytes)
    }

    /// Compressed point bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.compressed.as_bytes()
    }

    /// Lowercase hex encoding of the compressed point.
    pub fn to_hex(&self) -> String {
        hex::encode(self.compressed.as_bytes())
    }

    /// Montgomery form of this point (the `u` coordinate).
    pub fn to_montgomery(&self) -> MontgomeryPoint {
        self.point.to_montgomery()
    }

    /// Verify a signature over `message` made by this key's owner.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(self.compressed.as_bytes()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        verifying_key.verify(message, &signature).is_ok()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.compressed == other.compressed
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded).map_err(de::Error::custom)
    }
}

/// An Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded signature.
    pub fn from_hex(input: &str) -> Result<Self, KeyError> {
        decode_hex(input).map(Self)
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded).map_err(de::Error::custom)
    }
}

/// A 32-byte symmetric key shared by the members of a conversation.
///
/// Created once when the conversation is created and never rotated.
/// Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; KEY_SIZE]);

impl SharedKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded shared key.
    pub fn from_hex(input: &str) -> Result<Self, KeyError> {
        decode_hex(input).map(Self)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding, for storage by conversation members.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Reinterpret this key as a private scalar seed (group tree leaves).
    pub fn to_private_key(&self) -> PrivateKey {
        PrivateKey::from_bytes(self.0)
    }
}

impl Drop for SharedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::SeededEnv;

    // RFC 8032 section 7.1, TEST 1
    const RFC8032_SECRET: &str =
        "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const RFC8032_PUBLIC: &str =
        "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const RFC8032_SIGNATURE: &str = "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b";

    fn seeded_key(seed: u8) -> PrivateKey {
        PrivateKey::from_bytes([seed; KEY_SIZE])
    }

    #[test]
    fn public_key_matches_rfc8032() {
        let key = PrivateKey::from_hex(RFC8032_SECRET).unwrap();
        assert_eq!(key.public_key().to_hex(), RFC8032_PUBLIC);
    }

    #[test]
    fn signature_matches_rfc8032() {
        let key = PrivateKey::from_hex(RFC8032_SECRET).unwrap();
        let signature = key.sign(b"");
        assert_eq!(signature.to_hex(), RFC8032_SIGNATURE);
        assert!(key.public_key().verify(b"", &signature));
    }

    #[test]
    fn public_key_matches_ed25519_dalek() {
        let env = SeededEnv::new(11);
        for _ in 0..16 {
            let key = PrivateKey::generate(&env);
            let expected = SigningKey::from_bytes(key.as_bytes()).verifying_key().to_bytes();
            assert_eq!(key.public_key().as_bytes(), &expected);
        }
    }

    #[test]
    fn x25519_matches_rfc7748() {
        // RFC 7748 section 6.1, Alice's key pair
        let scalar: [u8; 32] =
            decode_hex("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a")
                .unwrap();
        let mut base = [0u8; 32];
        base[0] = 9;

        let output = x25519(scalar, MontgomeryPoint(base));

        assert_eq!(
            hex::encode(output),
            "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
        );
    }

    #[test]
    fn montgomery_conversion_matches_x25519_dalek() {
        let env = SeededEnv::new(3);
        for _ in 0..16 {
            let ours = PrivateKey::generate(&env);
            let theirs = PrivateKey::generate(&env);

            let x_secret = x25519_dalek::StaticSecret::from(*ours.scalar_bytes());
            let x_public = x25519_dalek::PublicKey::from(&x_secret);
            assert_eq!(x_public.as_bytes(), &ours.public_key().to_montgomery().to_bytes());

            let their_x_public =
                x25519_dalek::PublicKey::from(theirs.public_key().to_montgomery().to_bytes());
            let expected = x_secret.diffie_hellman(&their_x_public);
            assert_eq!(&ours.diffie_hellman(&theirs.public_key()), expected.as_bytes());
        }
    }

    #[test]
    fn diffie_hellman_is_commutative() {
        let a = seeded_key(1);
        let b = seeded_key(2);

        assert_eq!(a.diffie_hellman(&b.public_key()), b.diffie_hellman(&a.public_key()));
    }

    #[test]
    fn diffie_hellman_differs_per_peer() {
        let a = seeded_key(1);
        let b = seeded_key(2);
        let c = seeded_key(3);

        assert_ne!(a.diffie_hellman(&b.public_key()), a.diffie_hellman(&c.public_key()));
    }

    #[test]
    fn personal_key_is_deterministic_and_private() {
        let a = seeded_key(4);
        let b = seeded_key(5);

        assert_eq!(a.personal_key(), a.personal_key());
        assert_ne!(a.personal_key(), b.personal_key());
    }

    #[test]
    fn challenge_response_commutes() {
        let user = seeded_key(6);
        let server = seeded_key(7);

        // server knows d and user public A; user knows a and challenge D
        let challenge = server.public_key();
        let expected = server.challenge_response(&user.public_key());

        assert_eq!(user.challenge_response(&challenge), expected);
    }

    #[test]
    fn tampered_signature_fails() {
        let key = seeded_key(8);
        let signature = key.sign(b"message");

        let mut bytes = *signature.as_bytes();
        bytes[10] ^= 0x01;

        assert!(key.public_key().verify(b"message", &signature));
        assert!(!key.public_key().verify(b"message", &Signature::from_bytes(bytes)));
        assert!(!key.public_key().verify(b"other message", &signature));
        assert!(!seeded_key(9).public_key().verify(b"message", &signature));
    }

    #[test]
    fn public_key_hex_roundtrip_accepts_uppercase() {
        let public = seeded_key(10).public_key();
        let upper = public.to_hex().to_uppercase();

        assert_eq!(PublicKey::from_hex(&upper).unwrap(), public);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(PublicKey::from_hex("zz").unwrap_err(), KeyError::InvalidHex);
        assert_eq!(
            PrivateKey::from_hex("00ff").unwrap_err(),
            KeyError::InvalidLength { expected: 32, actual: 2 }
        );
        assert_eq!(
            Signature::from_hex(&"00".repeat(32)).unwrap_err(),
            KeyError::InvalidLength { expected: 64, actual: 32 }
        );
    }

    #[test]
    fn rejects_points_off_curve() {
        // y = 2 has no matching x on edwards25519
        let mut bytes = [0u8; KEY_SIZE];
        bytes[0] = 2;

        assert_eq!(PublicKey::from_bytes(bytes).unwrap_err(), KeyError::InvalidPoint);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let key = seeded_key(12);

        assert_eq!(format!("{key:?}"), "PrivateKey(..)");
        assert_eq!(format!("{:?}", key.personal_key()), "SharedKey(..)");
    }
}
