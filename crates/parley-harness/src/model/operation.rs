//! Operations for model-based testing.
//!
//! Operations are generated randomly by proptest and applied to a
//! [`SimWorld`](super::SimWorld). Invariants are checked after every step.

use arbitrary::Arbitrary;
use parley_crypto::GroupError;

use crate::relay::RelayError;

/// Client identifier (0-indexed).
pub type ClientId = u8;

/// Relay-assigned group identifier.
pub type GroupId = u32;

/// Operations that can be applied to the world.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Client answers a login challenge from the relay.
    Login {
        /// Client logging in.
        client_id: ClientId,
    },

    /// Client publishes its current key bundle.
    PublishBundle {
        /// Client publishing.
        client_id: ClientId,
    },

    /// Client replaces its signed prekey and republishes.
    ///
    /// Invites made against the old prekey can no longer be accepted.
    RotatePrekey {
        /// Client rotating.
        client_id: ClientId,
    },

    /// Client creates a group with the given invitees.
    CreateGroup {
        /// Group creator.
        creator_id: ClientId,
        /// Invitees in position order. Duplicates and the creator are
        /// dropped before the group is built.
        invitees: Vec<ClientId>,
    },

    /// Client accepts every invite waiting in its relay inbox.
    SyncInvites {
        /// Client syncing.
        client_id: ClientId,
    },

    /// Client encrypts and posts a message to one of its groups.
    SendMessage {
        /// Sender.
        client_id: ClientId,
        /// Index into the sender's groups (taken modulo their count).
        group_index: u8,
        /// Message content.
        content: SmallMessage,
    },

    /// Client fetches and decrypts new messages in all of its groups.
    SyncMessages {
        /// Client syncing.
        client_id: ClientId,
    },
}

/// Small message content for testing.
///
/// Content is deterministic from the seed.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallMessage {
    /// Message seed.
    pub seed: u8,
    /// Message length hint (0-3 maps to empty/small/medium/large).
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to actual message bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = match self.size_class % 4 {
            0 => 0,
            1 => 8,
            2 => 64,
            _ => 256,
        };

        (0..len).map(|i| self.seed.wrapping_add(i as u8)).collect()
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with an expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Client id outside the world.
    InvalidClient,

    /// Client has no active relay session.
    NotLoggedIn,

    /// An invitee has not published a bundle.
    NoBundle(ClientId),

    /// Group would have no invitees.
    NoInvitees,

    /// Client is not in any group.
    NotMember,

    /// Group key agreement failed.
    Group(GroupError),

    /// The relay refused the request.
    Relay(RelayError),
}

impl From<RelayError> for OperationError {
    fn from(error: RelayError) -> Self {
        Self::Relay(error)
    }
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationResult::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}

impl From<Result<(), OperationError>> for OperationResult {
    fn from(result: Result<(), OperationError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(error) => Self::Error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_message_sizes() {
        let sizes: Vec<_> = (0..4)
            .map(|size_class| SmallMessage { seed: 9, size_class }.to_bytes().len())
            .collect();

        assert_eq!(sizes, vec![0, 8, 64, 256]);
    }

    #[test]
    fn small_message_is_deterministic() {
        let message = SmallMessage { seed: 250, size_class: 1 };

        assert_eq!(message.to_bytes(), vec![250, 251, 252, 253, 254, 255, 0, 1]);
    }
}
