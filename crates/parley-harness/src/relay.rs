//! In-memory relay.
//!
//! The relay is untrusted: it registers public keys, runs login challenges
//! and stores and forwards opaque hex and JSON blobs. It never sees a
//! private key, a shared key or a plaintext, and the opacity invariant
//! checks exactly that against everything it holds.

use std::collections::{BTreeMap, BTreeSet};

use parley_crypto::{Challenge, Environment, KeyBundle, KeyError, PublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ClientId, GroupId};

/// Requests the relay refuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Registration for an id that already has a key
    #[error("client {0} is already registered")]
    AlreadyRegistered(ClientId),

    /// No key registered for this client
    #[error("client {0} is not registered")]
    UnknownClient(ClientId),

    /// Submitted key does not parse or is not a curve point
    #[error("invalid public key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Login response without an outstanding challenge
    #[error("no login challenge pending for client {0}")]
    NoChallenge(ClientId),

    /// Login response did not match the challenge
    #[error("login failed for client {0}")]
    LoginFailed(ClientId),

    /// Bundle is malformed, unsigned, or not for the submitting client
    #[error("bundle rejected for client {0}")]
    InvalidBundle(ClientId),

    /// No bundle published for this client
    #[error("no bundle published for client {0}")]
    NoBundle(ClientId),

    /// No such group
    #[error("group {0} not found")]
    UnknownGroup(GroupId),

    /// Sender is not a member of the group
    #[error("client {client} is not a member of group {group}")]
    NotMember {
        /// Sender
        client: ClientId,
        /// Target group
        group: GroupId,
    },
}

/// A posted message as the relay stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Sender's client id
    pub sender: ClientId,
    /// Hex-encoded envelope
    pub envelope: String,
    /// Hex-encoded sender signature over the envelope bytes
    pub signature: String,
}

/// An invite waiting in a client's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Group the invite is for
    pub group: GroupId,
    /// JSON-encoded group invite
    pub payload: String,
}

#[derive(Debug, Clone)]
struct ClientRecord {
    public_key: String,
    bundle: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct GroupRecord {
    members: BTreeSet<ClientId>,
    messages: Vec<StoredMessage>,
}

/// Relay state.
#[derive(Debug)]
pub struct Relay<E: Environment> {
    env: E,
    clients: BTreeMap<ClientId, ClientRecord>,
    challenges: BTreeMap<ClientId, Challenge>,
    sessions: BTreeSet<ClientId>,
    inboxes: BTreeMap<ClientId, Vec<Delivery>>,
    groups: BTreeMap<GroupId, GroupRecord>,
    next_group: GroupId,
}

impl<E: Environment> Relay<E> {
    /// Create an empty relay.
    pub fn new(env: E) -> Self {
        Self {
            env,
            clients: BTreeMap::new(),
            challenges: BTreeMap::new(),
            sessions: BTreeSet::new(),
            inboxes: BTreeMap::new(),
            groups: BTreeMap::new(),
            next_group: 0,
        }
    }

    /// Register a client's identity public key.
    pub fn register(&mut self, client: ClientId, public_key: &str) -> Result<(), RelayError> {
        if self.clients.contains_key(&client) {
            return Err(RelayError::AlreadyRegistered(client));
        }

        let key = PublicKey::from_hex(public_key)?;
        self.clients.insert(client, ClientRecord { public_key: key.to_hex(), bundle: None });
        Ok(())
    }

    /// Registered identity key of a client (hex).
    pub fn public_key(&self, client: ClientId) -> Result<&str, RelayError> {
        self.record(client).map(|record| record.public_key.as_str())
    }

    /// Start a login: issue a challenge and return its point as hex.
    ///
    /// A new challenge replaces any outstanding one.
    pub fn begin_login(&mut self, client: ClientId) -> Result<String, RelayError> {
        let key = PublicKey::from_hex(self.public_key(client)?)?;
        let challenge = Challenge::issue(&self.env, &key);
        let point = challenge.point().to_hex();
        self.challenges.insert(client, challenge);
        Ok(point)
    }

    /// Finish a login with the client's response (hex).
    pub fn complete_login(&mut self, client: ClientId, response: &str) -> Result<(), RelayError> {
        let challenge = self.challenges.remove(&client).ok_or(RelayError::NoChallenge(client))?;

        let accepted = PublicKey::from_hex(response).is_ok_and(|point| challenge.check(&point));
        if !accepted {
            tracing::warn!(client, "login challenge failed");
            return Err(RelayError::LoginFailed(client));
        }

        self.sessions.insert(client);
        Ok(())
    }

    /// True if the client completed a login.
    pub fn is_logged_in(&self, client: ClientId) -> bool {
        self.sessions.contains(&client)
    }

    /// Store a client's bundle (JSON), replacing any previous one.
    ///
    /// The bundle must parse, carry a valid prekey signature and name the
    /// client's registered identity key.
    pub fn publish_bundle(&mut self, client: ClientId, bundle: &str) -> Result<(), RelayError> {
        let registered = PublicKey::from_hex(self.public_key(client)?)?;

        let parsed: KeyBundle =
            serde_json::from_str(bundle).map_err(|_| RelayError::InvalidBundle(client))?;
        if parsed.ik != registered || !parsed.verify() {
            tracing::warn!(client, "bundle rejected");
            return Err(RelayError::InvalidBundle(client));
        }

        if let Some(record) = self.clients.get_mut(&client) {
            record.bundle = Some(bundle.to_owned());
        }
        Ok(())
    }

    /// Fetch a client's published bundle (JSON).
    pub fn fetch_bundle(&self, client: ClientId) -> Result<&str, RelayError> {
        self.record(client)?.bundle.as_deref().ok_or(RelayError::NoBundle(client))
    }

    /// Open a group and deliver one invite payload per invitee.
    pub fn open_group(
        &mut self,
        creator: ClientId,
        invites: Vec<(ClientId, String)>,
    ) -> Result<GroupId, RelayError> {
        self.record(creator)?;
        for (invitee, _) in &invites {
            self.record(*invitee)?;
        }

        let group = self.next_group;
        self.next_group += 1;

        let mut record = GroupRecord::default();
        record.members.insert(creator);
        for (invitee, payload) in invites {
            record.members.insert(invitee);
            self.inboxes.entry(invitee).or_default().push(Delivery { group, payload });
        }
        self.groups.insert(group, record);

        tracing::debug!(group, creator, "group opened");
        Ok(group)
    }

    /// Drain a client's invite inbox.
    pub fn take_invites(&mut self, client: ClientId) -> Vec<Delivery> {
        self.inboxes.remove(&client).unwrap_or_default()
    }

    /// Append a message to a group's log. Returns its index.
    pub fn post(
        &mut self,
        group: GroupId,
        sender: ClientId,
        envelope: String,
        signature: String,
    ) -> Result<usize, RelayError> {
        let record = self.groups.get_mut(&group).ok_or(RelayError::UnknownGroup(group))?;
        if !record.members.contains(&sender) {
            return Err(RelayError::NotMember { client: sender, group });
        }

        record.messages.push(StoredMessage { sender, envelope, signature });
        Ok(record.messages.len() - 1)
    }

    /// Messages in a group from index `since` onwards.
    pub fn messages(&self, group: GroupId, since: usize) -> Result<&[StoredMessage], RelayError> {
        let record = self.groups.get(&group).ok_or(RelayError::UnknownGroup(group))?;
        Ok(record.messages.get(since..).unwrap_or_default())
    }

    /// Fault injection: flip one bit of a stored envelope.
    ///
    /// Returns false if there is no such message.
    pub fn corrupt_envelope(&mut self, group: GroupId, index: usize) -> bool {
        let Some(message) =
            self.groups.get_mut(&group).and_then(|record| record.messages.get_mut(index))
        else {
            return false;
        };
        let Ok(mut bytes) = hex::decode(&message.envelope) else {
            return false;
        };
        let Some(last) = bytes.last_mut() else {
            return false;
        };
        *last ^= 0x01;
        message.envelope = hex::encode(bytes);
        true
    }

    /// Every string the relay holds, for opacity checks.
    pub fn blobs(&self) -> Vec<String> {
        let mut blobs = Vec::new();
        for record in self.clients.values() {
            blobs.push(record.public_key.clone());
            blobs.extend(record.bundle.clone());
        }
        for challenge in self.challenges.values() {
            blobs.push(challenge.point().to_hex());
        }
        for delivery in self.inboxes.values().flatten() {
            blobs.push(delivery.payload.clone());
        }
        for message in self.groups.values().flat_map(|record| &record.messages) {
            blobs.push(message.envelope.clone());
            blobs.push(message.signature.clone());
        }
        blobs
    }

    fn record(&self, client: ClientId) -> Result<&ClientRecord, RelayError> {
        self.clients.get(&client).ok_or(RelayError::UnknownClient(client))
    }
}

#[cfg(test)]
mod tests {
    use parley_crypto::PrivateKey;

    use super::*;
    use crate::SimEnv;

    fn relay_with(env: &SimEnv, key: &PrivateKey) -> Relay<SimEnv> {
        let mut relay = Relay::new(env.clone());
        relay.register(0, &key.public_key().to_hex()).unwrap();
        relay
    }

    #[test]
    fn login_with_owned_key() {
        let env = SimEnv::with_seed(1);
        let key = PrivateKey::generate(&env);
        let mut relay = relay_with(&env, &key);

        let point = PublicKey::from_hex(&relay.begin_login(0).unwrap()).unwrap();
        let response = key.challenge_response(&point).to_hex();

        relay.complete_login(0, &response).unwrap();
        assert!(relay.is_logged_in(0));
    }

    #[test]
    fn login_with_other_key_fails() {
        let env = SimEnv::with_seed(2);
        let key = PrivateKey::generate(&env);
        let impostor = PrivateKey::generate(&env);
        let mut relay = relay_with(&env, &key);

        let point = PublicKey::from_hex(&relay.begin_login(0).unwrap()).unwrap();
        let response = impostor.challenge_response(&point).to_hex();

        assert_eq!(relay.complete_login(0, &response), Err(RelayError::LoginFailed(0)));
        assert!(!relay.is_logged_in(0));
        assert_eq!(relay.complete_login(0, &response), Err(RelayError::NoChallenge(0)));
    }

    #[test]
    fn register_rejects_off_curve_key() {
        let env = SimEnv::with_seed(3);
        let mut relay = Relay::new(env);

        let off_curve = format!("02{}", "00".repeat(31));
        assert_eq!(
            relay.register(0, &off_curve),
            Err(RelayError::InvalidKey(KeyError::InvalidPoint))
        );
    }

    #[test]
    fn bundle_must_match_registered_identity() {
        let env = SimEnv::with_seed(4);
        let key = PrivateKey::generate(&env);
        let other = PrivateKey::generate(&env);
        let prekey = PrivateKey::generate(&env);
        let mut relay = relay_with(&env, &key);

        let foreign = serde_json::to_string(&KeyBundle::publish(&other, &prekey)).unwrap();
        assert_eq!(relay.publish_bundle(0, &foreign), Err(RelayError::InvalidBundle(0)));
        assert_eq!(relay.fetch_bundle(0), Err(RelayError::NoBundle(0)));

        let own = serde_json::to_string(&KeyBundle::publish(&key, &prekey)).unwrap();
        relay.publish_bundle(0, &own).unwrap();
        assert_eq!(relay.fetch_bundle(0).unwrap(), own);
    }

    #[test]
    fn only_members_post() {
        let env = SimEnv::with_seed(5);
        let mut relay = Relay::new(env.clone());
        for client in 0..3 {
            relay.register(client, &PrivateKey::generate(&env).public_key().to_hex()).unwrap();
        }

        let group = relay.open_group(0, vec![(1, "{}".to_owned())]).unwrap();

        assert_eq!(relay.post(group, 1, "00".into(), "00".into()), Ok(0));
        assert_eq!(
            relay.post(group, 2, "00".into(), "00".into()),
            Err(RelayError::NotMember { client: 2, group })
        );
        assert_eq!(relay.messages(group, 0).unwrap().len(), 1);
        assert!(relay.messages(group, 5).unwrap().is_empty());
        assert_eq!(relay.take_invites(1).len(), 1);
        assert!(relay.take_invites(1).is_empty());
    }
}
