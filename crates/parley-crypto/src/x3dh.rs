//! Pairwise offline key agreement (X3DH).
//!
//! The responder publishes a [`KeyBundle`] once. An initiator who has the
//! bundle derives a shared key without the responder being online, and
//! sends the responder an [`Initiation`] carrying its ephemeral public key.
//!
//! ```text
//! initiator (IK_a, EK)                      responder (IK_b, SPK_b)
//!   DH1 = DH(IK_a,  SPK_b)          ==        DH(SPK_b, IK_a)
//!   DH2 = DH(EK,    IK_b)           ==        DH(IK_b,  EK)
//!   DH3 = DH(EK,    SPK_b)          ==        DH(SPK_b, EK)
//!   DH4 = DH(IK_a,  IK_b)           ==        DH(IK_b,  IK_a)
//!
//!   SK = KDF(DH1 || DH2 || DH3 || DH4)
//! ```
//!
//! Both sides concatenate in the same fixed order, so DH commutativity
//! gives both the same 32-byte key.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    env::Environment,
    error::X3dhError,
    kdf::kdf,
    keys::{KEY_SIZE, PrivateKey, PublicKey, SharedKey, Signature},
};

/// A party's published key bundle `{ik, spk, sig}`.
///
/// Reused for every incoming handshake until the owner replaces the
/// prekey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBundle {
    /// Long-term identity public key
    pub ik: PublicKey,
    /// Signed prekey public key
    pub spk: PublicKey,
    /// Signature over the raw 32-byte `spk` by `ik`
    pub sig: Signature,
}

impl KeyBundle {
    /// Build a signed bundle from the owner's identity and prekey.
    pub fn publish(identity: &PrivateKey, prekey: &PrivateKey) -> Self {
        let spk = prekey.public_key();
        Self { ik: identity.public_key(), spk, sig: identity.sign(spk.as_bytes()) }
    }

    /// Check the prekey signature.
    pub fn verify(&self) -> bool {
        self.ik.verify(self.spk.as_bytes(), &self.sig)
    }
}

/// Initiation payload sent peer-to-peer via the relay: `{ek, spk}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiation {
    /// Initiator's ephemeral public key
    pub ek: PublicKey,
    /// The responder's signed prekey the initiator used
    pub spk: PublicKey,
}

/// Initiator's result: the shared key plus the payload for the responder.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Derived shared key
    pub shared_key: SharedKey,
    /// Payload to transmit to the responder
    pub initiation: Initiation,
}

/// Run the initiator half of the handshake against a published bundle.
///
/// Verifies the prekey signature first. On failure nothing is derived and
/// no ephemeral key is drawn.
pub fn send(
    env: &impl Environment,
    own_identity: &PrivateKey,
    bundle: &KeyBundle,
) -> Result<Handshake, X3dhError> {
    if !bundle.verify() {
        tracing::warn!(ik = %bundle.ik.to_hex(), "prekey signature verification failed");
        return Err(X3dhError::PrekeySignature);
    }

    let ephemeral = PrivateKey::generate(env);

    let shared_key = derive([
        own_identity.diffie_hellman(&bundle.spk),
        ephemeral.diffie_hellman(&bundle.ik),
        ephemeral.diffie_hellman(&bundle.spk),
        own_identity.diffie_hellman(&bundle.ik),
    ]);

    Ok(Handshake {
        shared_key,
        initiation: Initiation { ek: ephemeral.public_key(), spk: bundle.spk },
    })
}

/// Run the responder half of the handshake.
///
/// Fails closed with [`X3dhError::PrekeyMismatch`] when `own_prekey` is
/// not the prekey the initiation was made against (for example after the
/// responder rotated its bundle). Without this check both sides would
/// silently derive different keys.
pub fn recv(
    own_identity: &PrivateKey,
    their_identity: &PublicKey,
    own_prekey: &PrivateKey,
    initiation: &Initiation,
) -> Result<SharedKey, X3dhError> {
    if own_prekey.public_key() != initiation.spk {
        tracing::warn!(spk = %initiation.spk.to_hex(), "initiation targets an unknown prekey");
        return Err(X3dhError::PrekeyMismatch);
    }

    Ok(derive([
        own_prekey.diffie_hellman(their_identity),
        own_identity.diffie_hellman(&initiation.ek),
        own_prekey.diffie_hellman(&initiation.ek),
        own_identity.diffie_hellman(their_identity),
    ]))
}

fn derive(outputs: [[u8; KEY_SIZE]; 4]) -> SharedKey {
    let mut material = Zeroizing::new([0u8; 4 * KEY_SIZE]);
    for (chunk, output) in material.chunks_exact_mut(KEY_SIZE).zip(outputs) {
        chunk.copy_from_slice(&output);
    }
    kdf(material.as_slice())
}
