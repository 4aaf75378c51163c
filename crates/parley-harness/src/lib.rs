//! Deterministic simulation harness for Parley.
//!
//! Runs many clients against an in-memory relay with every random draw
//! taken from one seeded [`SimEnv`], so any failing run replays exactly
//! from its seed.
//!
//! # Model-Based Testing
//!
//! The `model` module drives real key agreement, encryption and login
//! challenges through [`Operation`]s generated by proptest.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks what must hold after every operation:
//! group members agree on the key, the relay never sees a secret, and
//! clients decrypt the group log in order. Use
//! [`InvariantRegistry::standard()`] for all of them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod relay;
pub mod sim_env;

pub use invariants::{
    ClientSnapshot, GroupKeyAgreement, GroupSnapshot, InOrderDelivery, Invariant,
    InvariantRegistry, InvariantResult, RelayOpacity, Violation, WorldSnapshot,
};
pub use model::{
    ClientId, GroupId, InviteFailure, Operation, OperationError, OperationResult, Rejection,
    SimClient, SimWorld, SmallMessage,
};
pub use relay::{Delivery, Relay, RelayError, StoredMessage};
pub use sim_env::SimEnv;
