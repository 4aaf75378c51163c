//! Model for simulation testing.
//!
//! Operations are applied to a [`SimWorld`] of real clients talking through
//! an in-memory relay. Invariants are checked against its snapshots.

mod client;
mod operation;
mod world;

pub use client::{InviteFailure, Rejection, SimClient};
pub use operation::{ClientId, GroupId, Operation, OperationError, OperationResult, SmallMessage};
pub use world::SimWorld;
