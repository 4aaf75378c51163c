//! Error types for Parley cryptographic operations.
//!
//! Every failure is returned as a value. Verification failures abort the
//! whole operation before any secret, message or tree is produced.

use thiserror::Error;

/// Errors decoding or validating key material at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Input is not a hex string
    #[error("invalid hex encoding")]
    InvalidHex,

    /// Decoded bytes have the wrong width
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Bytes do not decompress to a point on the curve
    #[error("not a valid curve point")]
    InvalidPoint,
}

/// Errors from the pairwise handshake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum X3dhError {
    /// The prekey signature does not verify under the identity key
    #[error("prekey signature verification failed")]
    PrekeySignature,

    /// The responder's prekey does not match the prekey the initiator used
    #[error("prekey mismatch: initiation targets a different signed prekey")]
    PrekeyMismatch,
}

impl X3dhError {
    /// Returns true if the peer's published material cannot be trusted.
    ///
    /// A stale prekey is a synchronization problem and may be resolved by
    /// fetching the current bundle; a bad signature never is.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::PrekeySignature => true,
            Self::PrekeyMismatch => false,
        }
    }
}

/// Errors from group key tree creation and receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    /// A group needs at least one invitee
    #[error("group has no invitees")]
    EmptyGroup,

    /// More invitees than positions can address
    #[error("too many invitees: {count}")]
    TooManyInvitees {
        /// Number of bundles supplied
        count: usize,
    },

    /// Handshake with one invitee failed, so the whole group was aborted
    #[error("handshake with invitee at position {position} failed: {source}")]
    Invitee {
        /// 1-indexed position of the failing invitee
        position: u32,
        /// Underlying handshake failure
        source: X3dhError,
    },

    /// Received tree is not a complete binary tree without its root
    #[error("malformed key tree with {len} nodes")]
    MalformedTree {
        /// Number of nodes received
        len: usize,
    },

    /// Position does not address a leaf of the received tree
    #[error("position {position} outside a tree of {leaves} leaves")]
    PositionOutOfRange {
        /// 1-indexed position supplied
        position: u32,
        /// Number of leaves in the tree
        leaves: usize,
    },

    /// The tree leaf at this position is not the public form of our leaf
    /// secret, so the invite was built for someone else or is corrupted
    #[error("key tree leaf at position {position} does not match our handshake")]
    LeafMismatch {
        /// 1-indexed position supplied
        position: u32,
    },

    /// Position 0 belongs to the creator and is never assigned to an invitee
    #[error("position 0 is reserved for the group creator")]
    CreatorPosition,

    /// Pairwise handshake failed while accepting an invite
    #[error("handshake failed: {0}")]
    Handshake(#[from] X3dhError),
}

impl GroupError {
    /// Returns true if the invite or bundle set must be discarded.
    ///
    /// Handshake failures inherit the classification of the underlying
    /// [`X3dhError`]. An empty or oversized invitee list is a caller error
    /// that can be corrected and retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Invitee { source, .. } | Self::Handshake(source) => source.is_fatal(),
            Self::EmptyGroup | Self::TooManyInvitees { .. } => false,
            Self::MalformedTree { .. }
            | Self::PositionOutOfRange { .. }
            | Self::LeafMismatch { .. }
            | Self::CreatorPosition => true,
        }
    }
}

/// Errors from the symmetric channel cipher.
///
/// Wrong key, corrupted ciphertext and truncated input all surface as
/// [`CipherError::Authentication`]. Callers treat such messages as
/// undecryptable rather than as a fatal condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// Authentication tag did not verify
    #[error("decryption failed: authentication failed")]
    Authentication,

    /// Envelope is not a hex string
    #[error("invalid hex encoding")]
    InvalidHex,
}

/// Errors decoding a recovery phrase.
///
/// Wrong word count, unknown word and parity mismatch are reported
/// identically so a failed attempt reveals nothing about which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecoveryError {
    /// Phrase failed validation
    #[error("invalid recovery key")]
    InvalidPhrase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prekey_signature_is_fatal() {
        assert!(X3dhError::PrekeySignature.is_fatal());
    }

    #[test]
    fn prekey_mismatch_is_not_fatal() {
        assert!(!X3dhError::PrekeyMismatch.is_fatal());
    }

    #[test]
    fn group_error_inherits_handshake_classification() {
        let stale = GroupError::Invitee { position: 1, source: X3dhError::PrekeyMismatch };
        assert!(!stale.is_fatal());

        let forged = GroupError::Handshake(X3dhError::PrekeySignature);
        assert!(forged.is_fatal());

        assert!(GroupError::LeafMismatch { position: 3 }.is_fatal());
        assert!(!GroupError::EmptyGroup.is_fatal());
    }

    #[test]
    fn error_display() {
        let err = KeyError::InvalidLength { expected: 32, actual: 31 };
        assert_eq!(err.to_string(), "invalid key length: expected 32, got 31");

        let err = GroupError::Invitee { position: 2, source: X3dhError::PrekeySignature };
        assert_eq!(
            err.to_string(),
            "handshake with invitee at position 2 failed: prekey signature verification failed"
        );
    }

    #[test]
    fn recovery_error_does_not_leak_cause() {
        assert_eq!(RecoveryError::InvalidPhrase.to_string(), "invalid recovery key");
    }
}
