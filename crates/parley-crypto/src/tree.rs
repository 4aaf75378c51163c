//! Group key agreement over a binary Diffie-Hellman tree.
//!
//! The creator runs one pairwise handshake per invitee and places each
//! handshake's shared key at a leaf. Siblings are combined pairwise up to the
//! root: a parent is `DH(left, public(right))`, which by DH commutativity
//! equals `DH(right, public(left))`. The root is the group key.
//!
//! Nodes are addressed in heap order: the root is 1, the children of `i` are
//! `2i` and `2i + 1`, and the `N` leaves occupy `N..2N`. The creator is leaf
//! `N + 0`; the invitee at position `p` is leaf `N + p`.
//!
//! ```text
//!                 1 (group key, never published)
//!           ┌─────┴─────┐
//!           2           3
//!        ┌──┴──┐     ┌──┴──┐
//!        4     5     6     7        N = 4
//!     creator  p1    p2  padding
//! ```
//!
//! Only public forms of nodes `2..2N` are sent to invitees, flattened
//! root-first. An invitee folds its own leaf secret with the public key of
//! the sibling at every level (its co-path), `O(log N)` combinations in all.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    env::Environment,
    error::GroupError,
    keys::{KEY_SIZE, PrivateKey, PublicKey, SharedKey},
    x3dh::{self, Initiation, KeyBundle},
};

/// Smallest power of two holding `count` leaves, never below 2.
pub fn round_up2(count: usize) -> usize {
    count.max(2).next_power_of_two()
}

/// A leaf position assigned to an invitee (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberSlot(NonZeroU32);

impl MemberSlot {
    /// Slot for a 1-indexed position. Returns `None` for position 0.
    pub fn new(position: u32) -> Option<Self> {
        NonZeroU32::new(position).map(Self)
    }

    /// Slot of the invitee whose bundle was at `index` (0-based) during
    /// group creation.
    pub fn for_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().and_then(|index| index.checked_add(1)).and_then(Self::new)
    }

    /// The 1-indexed position.
    pub fn position(self) -> u32 {
        self.0.get()
    }
}

/// A leaf of the group tree: the creator's own slot or an invitee's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeSlot {
    /// Position 0, held by the group creator
    Creator,
    /// Position assigned to an invitee, in bundle order
    Member(MemberSlot),
}

impl TreeSlot {
    /// Interpret a wire position.
    pub fn from_position(position: u32) -> Self {
        MemberSlot::new(position).map_or(Self::Creator, Self::Member)
    }

    /// Wire position of this slot.
    pub fn position(self) -> u32 {
        match self {
            Self::Creator => 0,
            Self::Member(slot) => slot.position(),
        }
    }

    /// Heap index of this leaf in a tree with `leaves` leaves.
    fn heap_index(self, leaves: usize) -> usize {
        leaves + self.position() as usize
    }
}

/// The public key tree sent to invitees.
///
/// Holds the public forms of heap nodes `2..2N`, root-first. The root is
/// never included. Construction validates the shape, so every `KeyTree`
/// describes a complete binary tree with at least two leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PublicKey>", into = "Vec<PublicKey>")]
pub struct KeyTree {
    nodes: Vec<PublicKey>,
}

impl KeyTree {
    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        (self.nodes.len() + 2) / 2
    }

    /// Flattened nodes, root-first.
    pub fn nodes(&self) -> &[PublicKey] {
        &self.nodes
    }

    /// Public key at a heap index (2 or more).
    fn node(&self, heap_index: usize) -> &PublicKey {
        &self.nodes[heap_index - 2]
    }
}

impl TryFrom<Vec<PublicKey>> for KeyTree {
    type Error = GroupError;

    fn try_from(nodes: Vec<PublicKey>) -> Result<Self, Self::Error> {
        let len = nodes.len();
        if len < 2 || !(len + 2).is_power_of_two() {
            return Err(GroupError::MalformedTree { len });
        }
        Ok(Self { nodes })
    }
}

impl From<KeyTree> for Vec<PublicKey> {
    fn from(tree: KeyTree) -> Self {
        tree.nodes
    }
}

/// Creator's result of [`create_group`].
#[derive(Debug, Clone)]
pub struct GroupCreation {
    /// The group key (tree root)
    pub shared_key: SharedKey,
    /// Public tree for invitees
    pub key_tree: KeyTree,
    /// One handshake initiation per invitee, in bundle order
    pub initiations: Vec<Initiation>,
}

/// Create a group key shared with every invitee.
///
/// Bundle order is significant: the invitee at `bundles[i]` gets position
/// `i + 1`. If any bundle fails verification the whole call fails and
/// nothing is returned.
pub fn create_group(
    env: &impl Environment,
    own_identity: &PrivateKey,
    bundles: &[KeyBundle],
) -> Result<GroupCreation, GroupError> {
    if bundles.is_empty() {
        return Err(GroupError::EmptyGroup);
    }

    let slots = (0..bundles.len())
        .map(MemberSlot::for_index)
        .collect::<Option<Vec<_>>>()
        .ok_or(GroupError::TooManyInvitees { count: bundles.len() })?;

    let mut handshakes = Vec::with_capacity(bundles.len());
    for (slot, bundle) in slots.iter().zip(bundles) {
        let handshake = x3dh::send(env, own_identity, bundle)
            .map_err(|source| GroupError::Invitee { position: slot.position(), source })?;
        handshakes.push(handshake);
    }

    let leaves = round_up2(bundles.len() + 1);

    // Heap-ordered arena; index 0 is unused.
    let mut arena = vec![PrivateKey::from_bytes([0u8; KEY_SIZE]); 2 * leaves];

    arena[TreeSlot::Creator.heap_index(leaves)] = PrivateKey::generate(env);
    for (slot, handshake) in slots.iter().zip(&handshakes) {
        arena[TreeSlot::Member(*slot).heap_index(leaves)] = handshake.shared_key.to_private_key();
    }
    for padding in &mut arena[leaves + bundles.len() + 1..] {
        *padding = PrivateKey::generate(env);
    }

    for parent in (1..leaves).rev() {
        arena[parent] = combine(&arena[2 * parent], &arena[2 * parent + 1]);
    }

    let shared_key = SharedKey::from_bytes(*arena[1].as_bytes());
    let key_tree = KeyTree { nodes: arena[2..].iter().map(PrivateKey::public_key).collect() };

    tracing::debug!(invitees = bundles.len(), leaves, "created group key tree");

    Ok(GroupCreation {
        shared_key,
        key_tree,
        initiations: handshakes.into_iter().map(|handshake| handshake.initiation).collect(),
    })
}

/// Recover the group key as the invitee at `slot`.
///
/// `leaf` is this invitee's pairwise shared key with the creator (the
/// output of [`x3dh::recv`]). Fails if the slot is outside the tree or the
/// tree's leaf at that slot is not the public form of `leaf`.
pub fn recv_group(
    leaf: &SharedKey,
    key_tree: &KeyTree,
    slot: MemberSlot,
) -> Result<SharedKey, GroupError> {
    let leaves = key_tree.leaf_count();
    let position = slot.position();
    if position as usize >= leaves {
        tracing::warn!(position, leaves, "group position outside key tree");
        return Err(GroupError::PositionOutOfRange { position, leaves });
    }

    let mut current = TreeSlot::Member(slot).heap_index(leaves);
    let mut secret = leaf.to_private_key();
    if *key_tree.node(current) != secret.public_key() {
        tracing::warn!(position, "key tree leaf does not match handshake output");
        return Err(GroupError::LeafMismatch { position });
    }

    let mut output = Zeroizing::new([0u8; KEY_SIZE]);
    while current > 1 {
        let sibling = copath(current);
        *output = secret.diffie_hellman(key_tree.node(sibling));
        secret = PrivateKey::from_bytes(*output);
        current >>= 1;
    }

    tracing::debug!(position, leaves, "recovered group key");

    Ok(SharedKey::from_bytes(*output))
}

/// Sibling needed to reconstruct the parent of `index`.
fn copath(index: usize) -> usize {
    if index % 2 == 0 { index + 1 } else { index - 1 }
}

fn combine(left: &PrivateKey, right: &PrivateKey) -> PrivateKey {
    PrivateKey::from_bytes(left.diffie_hellman(&right.public_key()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{env::testing::SeededEnv, keys::Signature};

    struct Invitee {
        identity: PrivateKey,
        prekey: PrivateKey,
    }

    impl Invitee {
        fn new(env: &SeededEnv) -> Self {
            Self { identity: PrivateKey::generate(env), prekey: PrivateKey::generate(env) }
        }

        fn bundle(&self) -> KeyBundle {
            KeyBundle::publish(&self.identity, &self.prekey)
        }

        fn join(
            &self,
            creator: &PublicKey,
            creation: &GroupCreation,
            index: usize,
        ) -> Result<SharedKey, GroupError> {
            let leaf =
                x3dh::recv(&self.identity, creator, &self.prekey, &creation.initiations[index])?;
            let slot = MemberSlot::for_index(index).unwrap();
            recv_group(&leaf, &creation.key_tree, slot)
        }
    }

    fn group(seed: u64, size: usize) -> (PrivateKey, Vec<Invitee>, GroupCreation) {
        let env = SeededEnv::new(seed);
        let creator = PrivateKey::generate(&env);
        let invitees: Vec<_> = (0..size).map(|_| Invitee::new(&env)).collect();
        let bundles: Vec<_> = invitees.iter().map(Invitee::bundle).collect();
        let creation = create_group(&env, &creator, &bundles).unwrap();
        (creator, invitees, creation)
    }

    #[test]
    fn round_up2_pads_to_power_of_two() {
        assert_eq!(round_up2(1), 2);
        assert_eq!(round_up2(2), 2);
        assert_eq!(round_up2(3), 4);
        assert_eq!(round_up2(4), 4);
        assert_eq!(round_up2(5), 8);
        assert_eq!(round_up2(6), 8);
        assert_eq!(round_up2(9), 16);
    }

    #[test]
    fn copath_is_sibling() {
        assert_eq!(copath(2), 3);
        assert_eq!(copath(3), 2);
        assert_eq!(copath(6), 7);
        assert_eq!(copath(7), 6);
    }

    #[test]
    fn two_invitees_share_creator_key() {
        let (creator, invitees, creation) = group(1, 2);

        // creator + 2 invitees = 3 leaves, padded to 4
        assert_eq!(creation.key_tree.leaf_count(), 4);
        assert_eq!(creation.key_tree.nodes().len(), 6);

        for (index, invitee) in invitees.iter().enumerate() {
            let key = invitee.join(&creator.public_key(), &creation, index).unwrap();
            assert_eq!(key, creation.shared_key, "invitee {index} diverged");
        }
    }

    #[test]
    fn single_invitee_uses_two_leaves() {
        let (creator, invitees, creation) = group(2, 1);

        assert_eq!(creation.key_tree.leaf_count(), 2);
        assert_eq!(creation.key_tree.nodes().len(), 2);

        let key = invitees[0].join(&creator.public_key(), &creation, 0).unwrap();
        assert_eq!(key, creation.shared_key);
    }

    #[test]
    fn five_participants_pad_to_eight_leaves() {
        let (creator, invitees, creation) = group(3, 5);

        // creator + 5 invitees = 6 leaves, padded to 8
        assert_eq!(creation.key_tree.leaf_count(), 8);
        assert_eq!(creation.key_tree.nodes().len(), 14);

        for (index, invitee) in invitees.iter().enumerate() {
            let key = invitee.join(&creator.public_key(), &creation, index).unwrap();
            assert_eq!(key, creation.shared_key);
        }
    }

    #[test]
    fn full_tree_without_padding() {
        let (creator, invitees, creation) = group(4, 3);

        assert_eq!(creation.key_tree.leaf_count(), 4);
        for (index, invitee) in invitees.iter().enumerate() {
            let key = invitee.join(&creator.public_key(), &creation, index).unwrap();
            assert_eq!(key, creation.shared_key);
        }
    }

    #[test]
    fn tree_never_contains_the_group_key() {
        let (_, _, creation) = group(5, 3);
        let root_public = creation.shared_key.to_private_key().public_key();

        assert!(!creation.key_tree.nodes().contains(&root_public));
    }

    #[test]
    fn empty_group_is_rejected() {
        let env = SeededEnv::new(6);
        let creator = PrivateKey::generate(&env);

        assert!(matches!(create_group(&env, &creator, &[]), Err(GroupError::EmptyGroup)));
    }

    #[test]
    fn one_bad_bundle_aborts_whole_group() {
        let env = SeededEnv::new(7);
        let creator = PrivateKey::generate(&env);
        let invitees: Vec<_> = (0..3).map(|_| Invitee::new(&env)).collect();
        let mut bundles: Vec<_> = invitees.iter().map(Invitee::bundle).collect();

        let mut sig = *bundles[1].sig.as_bytes();
        sig[63] ^= 0x80;
        bundles[1].sig = Signature::from_bytes(sig);

        let result = create_group(&env, &creator, &bundles);
        assert!(matches!(result, Err(GroupError::Invitee { position: 2, .. })));
    }

    #[test]
    fn swapped_positions_are_detected() {
        let (creator, invitees, creation) = group(8, 2);

        let leaf = x3dh::recv(
            &invitees[0].identity,
            &creator.public_key(),
            &invitees[0].prekey,
            &creation.initiations[0],
        )
        .unwrap();

        let result = recv_group(&leaf, &creation.key_tree, MemberSlot::new(2).unwrap());
        assert!(matches!(result, Err(GroupError::LeafMismatch { position: 2 })));
    }

    #[test]
    fn position_outside_tree_is_rejected() {
        let (creator, invitees, creation) = group(9, 1);

        let leaf = x3dh::recv(
            &invitees[0].identity,
            &creator.public_key(),
            &invitees[0].prekey,
            &creation.initiations[0],
        )
        .unwrap();

        let result = recv_group(&leaf, &creation.key_tree, MemberSlot::new(2).unwrap());
        assert!(matches!(result, Err(GroupError::PositionOutOfRange { position: 2, leaves: 2 })));
    }

    #[test]
    fn malformed_tree_lengths_are_rejected() {
        let env = SeededEnv::new(10);
        let node = PrivateKey::generate(&env).public_key();

        for len in [0, 1, 3, 4, 5, 7, 8, 13, 15] {
            let result = KeyTree::try_from(vec![node; len]);
            assert!(matches!(result, Err(GroupError::MalformedTree { .. })), "len {len}");
        }
        for len in [2, 6, 14, 30] {
            assert!(KeyTree::try_from(vec![node; len]).is_ok(), "len {len}");
        }
    }

    #[test]
    fn key_tree_serializes_as_hex_list() {
        let (_, _, creation) = group(11, 2);

        let json = serde_json::to_value(&creation.key_tree).unwrap();
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 6);
        assert_eq!(list[0], creation.key_tree.nodes()[0].to_hex());

        let decoded: KeyTree = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, creation.key_tree);

        let short = serde_json::json!([creation.key_tree.nodes()[0].to_hex()]);
        assert!(serde_json::from_value::<KeyTree>(short).is_err());
    }

    #[test]
    fn tree_slot_positions() {
        assert_eq!(TreeSlot::from_position(0), TreeSlot::Creator);
        assert_eq!(TreeSlot::from_position(3), TreeSlot::Member(MemberSlot::new(3).unwrap()));
        assert_eq!(TreeSlot::Creator.heap_index(4), 4);
        assert_eq!(TreeSlot::from_position(2).heap_index(4), 6);
        assert!(MemberSlot::new(0).is_none());
        assert_eq!(MemberSlot::for_index(0).unwrap().position(), 1);
    }
}
