//! Observable state snapshots for invariant checking.
//!
//! Invariants operate on snapshots rather than live state so every check
//! sees one consistent view.

use std::collections::BTreeMap;

use crate::model::{ClientId, GroupId};

/// Snapshot of the whole world.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    /// Per-client state.
    pub clients: Vec<ClientSnapshot>,
    /// Every string stored by the relay.
    pub relay_blobs: Vec<String>,
    /// Plaintexts posted to each group, in log order.
    pub sent: BTreeMap<GroupId, Vec<Vec<u8>>>,
}

impl WorldSnapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Snapshot of one client.
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    /// Client identifier.
    pub id: ClientId,
    /// Hex of every private key the client holds.
    pub secrets: Vec<String>,
    /// Groups the client holds a key for.
    pub groups: BTreeMap<GroupId, GroupSnapshot>,
}

/// Snapshot of a client's view of one group.
#[derive(Debug, Clone, Default)]
pub struct GroupSnapshot {
    /// Group key (hex).
    pub key: String,
    /// Plaintexts decrypted so far.
    pub received: Vec<Vec<u8>>,
}
