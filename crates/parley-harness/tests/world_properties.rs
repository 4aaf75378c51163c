//! Model-based property tests.
//!
//! Random operation sequences are applied to a seeded world and the
//! standard invariants are checked after every step.
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!                          ▼
//!                  SimWorld::apply ──▶ snapshot ──▶ InvariantRegistry
//! ```

use parley_harness::{
    ClientId, InvariantRegistry, Operation, OperationResult, SimWorld, SmallMessage,
};
use proptest::prelude::*;

const NUM_CLIENTS: u8 = 5;

/// Strategy for generating SmallMessage.
fn small_message_strategy() -> impl Strategy<Value = SmallMessage> {
    (any::<u8>(), any::<u8>()).prop_map(|(seed, size_class)| SmallMessage { seed, size_class })
}

/// Strategy for generating operations with valid client IDs.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let client_id = 0..NUM_CLIENTS;
    let invitees = prop::collection::vec(0..NUM_CLIENTS, 0..5);

    prop_oneof![
        2 => client_id.clone().prop_map(|client_id| Operation::Login { client_id }),
        2 => client_id.clone().prop_map(|client_id| Operation::PublishBundle { client_id }),
        1 => client_id.clone().prop_map(|client_id| Operation::RotatePrekey { client_id }),
        2 => (client_id.clone(), invitees).prop_map(|(creator_id, invitees)| {
            Operation::CreateGroup { creator_id, invitees }
        }),
        3 => client_id.clone().prop_map(|client_id| Operation::SyncInvites { client_id }),
        4 => (client_id.clone(), any::<u8>(), small_message_strategy()).prop_map(
            |(client_id, group_index, content)| Operation::SendMessage {
                client_id,
                group_index,
                content,
            }
        ),
        3 => client_id.prop_map(|client_id| Operation::SyncMessages { client_id }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Invariants hold after every operation of any sequence.
    #[test]
    fn prop_invariants_hold(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(), 1..40),
    ) {
        let registry = InvariantRegistry::standard();
        let mut world = SimWorld::new(seed, NUM_CLIENTS);

        for (step, op) in ops.iter().enumerate() {
            world.apply(op);
            let result = registry.check_all(&world.snapshot());
            prop_assert!(result.is_ok(), "step {step} {op:?}: {result:?}");
        }
    }

    /// Once everyone is onboarded, a group over any invitee subset
    /// converges and every member reads every message.
    #[test]
    fn prop_onboarded_group_converges(
        seed in any::<u64>(),
        creator in 0..NUM_CLIENTS,
        invitees in prop::collection::btree_set(0..NUM_CLIENTS, 1..5),
        messages in prop::collection::vec(small_message_strategy(), 0..6),
    ) {
        let invitees: Vec<ClientId> = invitees.into_iter().filter(|&id| id != creator).collect();
        prop_assume!(!invitees.is_empty());

        let mut world = SimWorld::new(seed, NUM_CLIENTS);
        world.onboard_all().unwrap();
        let group = world.create_group(creator, &invitees).unwrap();

        for &client_id in &invitees {
            prop_assert_eq!(world.apply(&Operation::SyncInvites { client_id }), OperationResult::Ok);
        }
        let expected = world.client(creator).unwrap().group_key(group).unwrap().clone();
        for &id in &invitees {
            prop_assert_eq!(world.client(id).unwrap().group_key(group), Some(&expected));
        }

        for content in messages {
            let op = Operation::SendMessage { client_id: creator, group_index: 0, content };
            prop_assert_eq!(world.apply(&op), OperationResult::Ok);
        }
        let sent = world.sent(group).unwrap().to_vec();
        for &client_id in &invitees {
            prop_assert_eq!(world.apply(&Operation::SyncMessages { client_id }), OperationResult::Ok);
            prop_assert_eq!(world.client(client_id).unwrap().received(group).unwrap(), sent.as_slice());
        }
    }
}
