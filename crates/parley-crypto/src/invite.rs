//! Per-invitee group invite, as delivered by the relay.

use serde::{Deserialize, Serialize};

use crate::{
    error::GroupError,
    keys::{PrivateKey, PublicKey, SharedKey},
    tree::{self, GroupCreation, KeyTree, MemberSlot},
    x3dh::{self, Initiation},
};

/// Everything one invitee needs to join a group: `{ik, ek, spk, key_tree, position}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInvite {
    /// Creator's identity public key
    pub ik: PublicKey,
    /// Creator's ephemeral key for this invitee's handshake
    pub ek: PublicKey,
    /// The invitee's signed prekey the creator used
    pub spk: PublicKey,
    /// Shared public key tree
    pub key_tree: KeyTree,
    /// 1-indexed leaf position; 0 is the creator's own slot
    pub position: u32,
}

impl GroupInvite {
    /// Complete the handshake and recover the group key.
    ///
    /// # Errors
    ///
    /// - `CreatorPosition`: the invite is addressed to position 0
    /// - `Handshake`: `own_prekey` is not the prekey the creator used
    /// - `PositionOutOfRange`, `LeafMismatch`: the tree does not hold our
    ///   leaf at `position`
    pub fn accept(
        &self,
        own_identity: &PrivateKey,
        own_prekey: &PrivateKey,
    ) -> Result<SharedKey, GroupError> {
        let slot = MemberSlot::new(self.position).ok_or(GroupError::CreatorPosition)?;

        let initiation = Initiation { ek: self.ek, spk: self.spk };
        let leaf = x3dh::recv(own_identity, &self.ik, own_prekey, &initiation)?;

        tree::recv_group(&leaf, &self.key_tree, slot)
    }
}

impl GroupCreation {
    /// Split into one invite per invitee, in bundle order.
    pub fn invites(&self, creator_ik: PublicKey) -> Vec<GroupInvite> {
        (1u32..)
            .zip(&self.initiations)
            .map(|(position, initiation)| GroupInvite {
                ik: creator_ik,
                ek: initiation.ek,
                spk: initiation.spk,
                key_tree: self.key_tree.clone(),
                position,
            })
            .collect()
    }
}
