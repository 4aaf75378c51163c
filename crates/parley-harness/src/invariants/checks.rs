//! Standard invariant checks.

use std::collections::BTreeMap;

use super::{Invariant, InvariantResult, Violation, WorldSnapshot};
use crate::model::{ClientId, GroupId};

/// Plaintexts shorter than this are too likely to appear in random hex by
/// chance and are skipped by [`RelayOpacity`].
const MIN_TRACKED_PLAINTEXT: usize = 8;

/// Every member of a group holds the same group key.
pub struct GroupKeyAgreement;

impl Invariant for GroupKeyAgreement {
    fn name(&self) -> &'static str {
        "group_key_agreement"
    }

    fn check(&self, state: &WorldSnapshot) -> InvariantResult {
        let mut first: BTreeMap<GroupId, (ClientId, &str)> = BTreeMap::new();

        for client in &state.clients {
            for (group, view) in &client.groups {
                let (holder, key) = *first.entry(*group).or_insert((client.id, view.key.as_str()));
                if key != view.key {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "group {group}: client {} and client {holder} hold different keys",
                            client.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The relay never holds a private key, a group key or a plaintext.
pub struct RelayOpacity;

impl Invariant for RelayOpacity {
    fn name(&self) -> &'static str {
        "relay_opacity"
    }

    fn check(&self, state: &WorldSnapshot) -> InvariantResult {
        let mut secrets: Vec<(String, String)> = Vec::new();
        for client in &state.clients {
            for secret in &client.secrets {
                secrets.push((format!("private key of client {}", client.id), secret.clone()));
            }
            for (group, view) in &client.groups {
                secrets.push((format!("key of group {group}"), view.key.clone()));
            }
        }
        for (group, plaintexts) in &state.sent {
            for plaintext in plaintexts.iter().filter(|p| p.len() >= MIN_TRACKED_PLAINTEXT) {
                secrets.push((format!("plaintext in group {group}"), hex::encode(plaintext)));
            }
        }

        for blob in &state.relay_blobs {
            let blob = blob.to_ascii_lowercase();
            if let Some((what, _)) = secrets.iter().find(|(_, secret)| blob.contains(secret.as_str()))
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("relay holds {what}"),
                });
            }
        }
        Ok(())
    }
}

/// Each client decrypts a group's messages in log order, with nothing
/// altered or invented: what it received is a prefix of what was sent.
pub struct InOrderDelivery;

impl Invariant for InOrderDelivery {
    fn name(&self) -> &'static str {
        "in_order_delivery"
    }

    fn check(&self, state: &WorldSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (group, view) in &client.groups {
                let sent = state.sent.get(group).map_or(&[][..], Vec::as_slice);
                if !sent.starts_with(&view.received) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {} group {group}: received {} messages not matching the log",
                            client.id,
                            view.received.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}
