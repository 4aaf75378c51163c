//! Simulated client.
//!
//! Holds the only copies of its private keys and group keys. Everything it
//! hands to the relay is hex or JSON.

use std::collections::BTreeMap;

use parley_crypto::{
    Envelope, Environment, GroupCreation, GroupError, GroupInvite, KeyBundle, PrivateKey,
    PublicKey, SharedKey, Signature, cipher, tree,
};

use super::operation::{ClientId, GroupId};
use crate::relay::StoredMessage;

/// Why an incoming message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Sender signature did not verify
    Signature,
    /// Envelope failed authentication
    Undecryptable,
}

/// Why an invite could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteFailure {
    /// Payload is not a valid invite
    Malformed,
    /// Handshake or tree check failed
    Group(GroupError),
}

/// Per-group state held by a client.
#[derive(Debug, Clone)]
struct GroupState {
    key: SharedKey,
    cursor: usize,
    received: Vec<Vec<u8>>,
}

/// Simulated client state.
#[derive(Debug, Clone)]
pub struct SimClient {
    id: ClientId,
    identity: PrivateKey,
    prekey: PrivateKey,
    groups: BTreeMap<GroupId, GroupState>,
    rejected_invites: Vec<(GroupId, InviteFailure)>,
    rejected_messages: Vec<(GroupId, Rejection)>,
}

impl SimClient {
    /// Create a client with a fresh identity and prekey.
    pub fn new(env: &impl Environment, id: ClientId) -> Self {
        Self {
            id,
            identity: PrivateKey::generate(env),
            prekey: PrivateKey::generate(env),
            groups: BTreeMap::new(),
            rejected_invites: Vec::new(),
            rejected_messages: Vec::new(),
        }
    }

    /// Client identifier.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Identity public key.
    pub fn public_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    /// Hex of both private keys, for opacity checks.
    pub fn secrets(&self) -> [String; 2] {
        [self.identity.to_hex(), self.prekey.to_hex()]
    }

    /// Current bundle as JSON.
    pub fn bundle_json(&self) -> String {
        let bundle = KeyBundle::publish(&self.identity, &self.prekey);
        serde_json::to_string(&bundle).unwrap_or_default()
    }

    /// Replace the signed prekey.
    pub fn rotate_prekey(&mut self, env: &impl Environment) {
        self.prekey = PrivateKey::generate(env);
    }

    /// Answer a login challenge (hex in, hex out).
    ///
    /// An unparseable challenge gets an empty response, which the relay
    /// rejects.
    pub fn answer_challenge(&self, challenge: &str) -> String {
        PublicKey::from_hex(challenge)
            .map(|point| self.identity.challenge_response(&point).to_hex())
            .unwrap_or_default()
    }

    /// Build a group over the given invitee bundles.
    pub fn create_group(
        &self,
        env: &impl Environment,
        bundles: &[KeyBundle],
    ) -> Result<GroupCreation, GroupError> {
        tree::create_group(env, &self.identity, bundles)
    }

    /// Store a group key.
    pub fn store_group_key(&mut self, group: GroupId, key: SharedKey) {
        self.groups.insert(group, GroupState { key, cursor: 0, received: Vec::new() });
    }

    /// Accept an invite payload. Failures are recorded, not returned.
    pub fn accept_invite(&mut self, group: GroupId, payload: &str) {
        let Ok(invite) = serde_json::from_str::<GroupInvite>(payload) else {
            tracing::debug!(client = self.id, group, "malformed invite");
            self.rejected_invites.push((group, InviteFailure::Malformed));
            return;
        };

        match invite.accept(&self.identity, &self.prekey) {
            Ok(key) => self.store_group_key(group, key),
            Err(error) => {
                tracing::debug!(client = self.id, group, %error, "invite rejected");
                self.rejected_invites.push((group, InviteFailure::Group(error)));
            },
        }
    }

    /// Groups this client holds a key for, in id order.
    pub fn groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.keys().copied()
    }

    /// Group key, if a member.
    pub fn group_key(&self, group: GroupId) -> Option<&SharedKey> {
        self.groups.get(&group).map(|state| &state.key)
    }

    /// Messages decrypted so far in a group.
    pub fn received(&self, group: GroupId) -> Option<&[Vec<u8>]> {
        self.groups.get(&group).map(|state| state.received.as_slice())
    }

    /// Read cursor for a group.
    pub fn cursor(&self, group: GroupId) -> Option<usize> {
        self.groups.get(&group).map(|state| state.cursor)
    }

    /// Invites that could not be accepted.
    pub fn rejected_invites(&self) -> &[(GroupId, InviteFailure)] {
        &self.rejected_invites
    }

    /// Messages that were dropped.
    pub fn rejected_messages(&self) -> &[(GroupId, Rejection)] {
        &self.rejected_messages
    }

    /// Encrypt and sign a message. Returns `(envelope, signature)` hex.
    pub fn seal(
        &self,
        env: &impl Environment,
        group: GroupId,
        plaintext: &[u8],
    ) -> Option<(String, String)> {
        let state = self.groups.get(&group)?;
        Some(self.seal_with_key(env, &state.key, plaintext))
    }

    /// Encrypt under an explicit key and sign with this client's identity.
    pub fn seal_with_key(
        &self,
        env: &impl Environment,
        key: &SharedKey,
        plaintext: &[u8],
    ) -> (String, String) {
        let envelope = cipher::encrypt(env, key, plaintext);
        let signature = envelope.sign(&self.identity);
        (envelope.to_hex(), signature.to_hex())
    }

    /// Process one stored message from the relay.
    pub fn receive(&mut self, group: GroupId, message: &StoredMessage, sender: &PublicKey) {
        let Some(state) = self.groups.get_mut(&group) else {
            return;
        };
        state.cursor += 1;

        let Ok(envelope) = Envelope::from_hex(&message.envelope) else {
            self.rejected_messages.push((group, Rejection::Undecryptable));
            return;
        };
        let verified = Signature::from_hex(&message.signature)
            .is_ok_and(|signature| envelope.verify_signature(sender, &signature));
        if !verified {
            self.rejected_messages.push((group, Rejection::Signature));
            return;
        }

        match cipher::decrypt(&state.key, &envelope) {
            Ok(plaintext) => state.received.push(plaintext),
            Err(_) => self.rejected_messages.push((group, Rejection::Undecryptable)),
        }
    }
}
