//! Simulated world: one relay, many clients, one seeded environment.
//!
//! Operations drive real key agreement and encryption end to end. The
//! world also keeps the ground truth of what was sent to each group, which
//! the delivery invariant compares against what clients decrypted.

use std::collections::{BTreeMap, BTreeSet};

use parley_crypto::{Environment, KeyBundle, PublicKey, SharedKey};

use super::{
    client::SimClient,
    operation::{ClientId, GroupId, Operation, OperationError, OperationResult},
};
use crate::{
    SimEnv,
    invariants::{ClientSnapshot, GroupSnapshot, WorldSnapshot},
    relay::{Relay, RelayError},
};

/// Simulated world.
#[derive(Debug)]
pub struct SimWorld {
    env: SimEnv,
    relay: Relay<SimEnv>,
    clients: Vec<SimClient>,
    sent: BTreeMap<GroupId, Vec<Vec<u8>>>,
}

impl SimWorld {
    /// Create a world of `num_clients` clients, each registered with the
    /// relay. Client `i` draws its identity then its prekey, in id order.
    pub fn new(seed: u64, num_clients: u8) -> Self {
        let env = SimEnv::with_seed(seed);
        let clients: Vec<_> = (0..num_clients).map(|id| SimClient::new(&env, id)).collect();

        let mut relay = Relay::new(env.clone());
        for client in &clients {
            let registered = relay.register(client.id(), &client.public_key().to_hex());
            debug_assert!(
                registered.is_ok(),
                "invariant: fresh relay accepts distinct ids with valid keys"
            );
        }

        Self { env, relay, clients, sent: BTreeMap::new() }
    }

    /// Number of clients.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Get a client by ID.
    pub fn client(&self, id: ClientId) -> Option<&SimClient> {
        self.clients.get(id as usize)
    }

    /// The relay.
    pub fn relay(&self) -> &Relay<SimEnv> {
        &self.relay
    }

    /// Mutable relay access, for fault injection.
    pub fn relay_mut(&mut self) -> &mut Relay<SimEnv> {
        &mut self.relay
    }

    /// Plaintexts posted to a group, in log order.
    pub fn sent(&self, group: GroupId) -> Option<&[Vec<u8>]> {
        self.sent.get(&group).map(Vec::as_slice)
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match op {
            Operation::Login { client_id } => self.apply_login(*client_id),
            Operation::PublishBundle { client_id } => self.apply_publish(*client_id),
            Operation::RotatePrekey { client_id } => self.apply_rotate(*client_id),
            Operation::CreateGroup { creator_id, invitees } => {
                self.apply_create_group(*creator_id, invitees).map(|_| ())
            },
            Operation::SyncInvites { client_id } => self.apply_sync_invites(*client_id),
            Operation::SendMessage { client_id, group_index, content } => {
                self.apply_send(*client_id, *group_index, &content.to_bytes())
            },
            Operation::SyncMessages { client_id } => self.apply_sync_messages(*client_id),
        };

        if let Err(error) = &result {
            tracing::trace!(?op, ?error, "operation refused");
        }
        result.into()
    }

    /// Log every client in and publish its bundle.
    pub fn onboard_all(&mut self) -> Result<(), OperationError> {
        for id in 0..self.clients.len() as ClientId {
            self.apply_login(id)?;
            self.apply_publish(id)?;
        }
        Ok(())
    }

    /// Create a group and return its id.
    pub fn create_group(
        &mut self,
        creator: ClientId,
        invitees: &[ClientId],
    ) -> Result<GroupId, OperationError> {
        self.apply_create_group(creator, invitees)
    }

    /// Fault injection: post a message from `sender` that is correctly
    /// signed but encrypted under a key no member holds.
    ///
    /// The plaintext is not recorded as sent, so no member may ever
    /// decrypt it.
    pub fn post_under_wrong_key(
        &mut self,
        sender: ClientId,
        group: GroupId,
        plaintext: &[u8],
    ) -> Result<(), OperationError> {
        let client = self.logged_in(sender)?;
        if client.group_key(group).is_none() {
            return Err(OperationError::NotMember);
        }

        let wrong_key = SharedKey::from_bytes(self.env.random_key_bytes());
        let (envelope, signature) = client.seal_with_key(&self.env, &wrong_key, plaintext);
        self.relay.post(group, sender, envelope, signature)?;
        Ok(())
    }

    /// Extract the observable state for invariant checks.
    pub fn snapshot(&self) -> WorldSnapshot {
        let clients = self
            .clients
            .iter()
            .map(|client| ClientSnapshot {
                id: client.id(),
                secrets: client.secrets().to_vec(),
                groups: client
                    .groups()
                    .filter_map(|group| {
                        let key = client.group_key(group)?.to_hex();
                        let received = client.received(group)?.to_vec();
                        Some((group, GroupSnapshot { key, received }))
                    })
                    .collect(),
            })
            .collect();

        WorldSnapshot { clients, relay_blobs: self.relay.blobs(), sent: self.sent.clone() }
    }

    fn logged_in(&self, id: ClientId) -> Result<&SimClient, OperationError> {
        let client = self.clients.get(id as usize).ok_or(OperationError::InvalidClient)?;
        if !self.relay.is_logged_in(id) {
            return Err(OperationError::NotLoggedIn);
        }
        Ok(client)
    }

    fn apply_login(&mut self, id: ClientId) -> Result<(), OperationError> {
        let client = self.clients.get(id as usize).ok_or(OperationError::InvalidClient)?;
        let challenge = self.relay.begin_login(id)?;
        let response = client.answer_challenge(&challenge);
        self.relay.complete_login(id, &response)?;
        Ok(())
    }

    fn apply_publish(&mut self, id: ClientId) -> Result<(), OperationError> {
        let bundle = self.logged_in(id)?.bundle_json();
        self.relay.publish_bundle(id, &bundle)?;
        Ok(())
    }

    fn apply_rotate(&mut self, id: ClientId) -> Result<(), OperationError> {
        self.logged_in(id)?;
        if let Some(client) = self.clients.get_mut(id as usize) {
            client.rotate_prekey(&self.env);
        }
        self.apply_publish(id)
    }

    fn apply_create_group(
        &mut self,
        creator_id: ClientId,
        invitees: &[ClientId],
    ) -> Result<GroupId, OperationError> {
        let creator = self.logged_in(creator_id)?;

        let mut seen = BTreeSet::new();
        let invitees: Vec<_> = invitees
            .iter()
            .copied()
            .filter(|&id| id != creator_id && (id as usize) < self.clients.len() && seen.insert(id))
            .collect();
        if invitees.is_empty() {
            return Err(OperationError::NoInvitees);
        }

        let mut bundles = Vec::with_capacity(invitees.len());
        for &id in &invitees {
            let json = self.relay.fetch_bundle(id).map_err(|_| OperationError::NoBundle(id))?;
            let bundle: KeyBundle =
                serde_json::from_str(json).map_err(|_| OperationError::NoBundle(id))?;
            bundles.push(bundle);
        }

        let creation = creator.create_group(&self.env, &bundles).map_err(OperationError::Group)?;

        let invites = invitees
            .iter()
            .zip(creation.invites(creator.public_key()))
            .map(|(&id, invite)| (id, serde_json::to_string(&invite).unwrap_or_default()))
            .collect();

        let group = self.relay.open_group(creator_id, invites)?;
        if let Some(creator) = self.clients.get_mut(creator_id as usize) {
            creator.store_group_key(group, creation.shared_key);
        }
        self.sent.insert(group, Vec::new());

        tracing::debug!(group, creator = creator_id, invitees = invitees.len(), "group created");
        Ok(group)
    }

    fn apply_sync_invites(&mut self, id: ClientId) -> Result<(), OperationError> {
        self.logged_in(id)?;
        let deliveries = self.relay.take_invites(id);
        if let Some(client) = self.clients.get_mut(id as usize) {
            for delivery in deliveries {
                client.accept_invite(delivery.group, &delivery.payload);
            }
        }
        Ok(())
    }

    fn apply_send(
        &mut self,
        id: ClientId,
        group_index: u8,
        plaintext: &[u8],
    ) -> Result<(), OperationError> {
        let client = self.logged_in(id)?;

        let groups: Vec<_> = client.groups().collect();
        if groups.is_empty() {
            return Err(OperationError::NotMember);
        }
        let group = groups[group_index as usize % groups.len()];

        let (envelope, signature) =
            client.seal(&self.env, group, plaintext).ok_or(OperationError::NotMember)?;
        self.relay.post(group, id, envelope, signature)?;
        self.sent.entry(group).or_default().push(plaintext.to_vec());
        Ok(())
    }

    fn apply_sync_messages(&mut self, id: ClientId) -> Result<(), OperationError> {
        let client = self.logged_in(id)?;
        let cursors: Vec<_> =
            client.groups().filter_map(|group| Some((group, client.cursor(group)?))).collect();

        for (group, cursor) in cursors {
            let messages = self.relay.messages(group, cursor)?.to_vec();
            for message in messages {
                let sender = PublicKey::from_hex(self.relay.public_key(message.sender)?)
                    .map_err(RelayError::from)?;
                if let Some(client) = self.clients.get_mut(id as usize) {
                    client.receive(group, &message, &sender);
                }
            }
        }
        Ok(())
    }
}
