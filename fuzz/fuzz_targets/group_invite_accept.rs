//! Fuzz target for group invites
//!
//! Builds a real group from a seed, then lets the fuzzer tamper with one
//! invite before the invitee accepts it.
//!
//! # Invariants
//!
//! - Accepting never panics, however the tree or position is mangled
//! - An untouched invite yields the creator's group key

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_crypto::{GroupInvite, KeyBundle, PrivateKey, create_group};
use parley_harness::SimEnv;

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    invitees: u8,
    target: u8,
    tamper: Tamper,
}

#[derive(Debug, Arbitrary)]
enum Tamper {
    None,
    Position(u32),
    DropNode(u16),
    SwapNodes(u16, u16),
    RawJson(String),
}

fuzz_target!(|scenario: Scenario| {
    let env = SimEnv::with_seed(scenario.seed);
    let size = usize::from(scenario.invitees % 16) + 1;

    let creator = PrivateKey::generate(&env);
    let members: Vec<_> =
        (0..size).map(|_| (PrivateKey::generate(&env), PrivateKey::generate(&env))).collect();
    let bundles: Vec<_> =
        members.iter().map(|(identity, prekey)| KeyBundle::publish(identity, prekey)).collect();

    let Ok(creation) = create_group(&env, &creator, &bundles) else {
        return;
    };
    let target = usize::from(scenario.target) % size;
    let invite = &creation.invites(creator.public_key())[target];
    let (identity, prekey) = &members[target];

    let Ok(mut json) = serde_json::to_value(invite) else {
        return;
    };
    match scenario.tamper {
        Tamper::None => {},
        Tamper::Position(position) => json["position"] = position.into(),
        Tamper::DropNode(index) => {
            if let Some(nodes) = json["key_tree"].as_array_mut() {
                if !nodes.is_empty() {
                    nodes.remove(usize::from(index) % nodes.len());
                }
            }
        },
        Tamper::SwapNodes(a, b) => {
            if let Some(nodes) = json["key_tree"].as_array_mut() {
                if !nodes.is_empty() {
                    let len = nodes.len();
                    nodes.swap(usize::from(a) % len, usize::from(b) % len);
                }
            }
        },
        Tamper::RawJson(raw) => match serde_json::from_str(&raw) {
            Ok(value) => json = value,
            Err(_) => return,
        },
    }

    let Ok(tampered) = serde_json::from_value::<GroupInvite>(json) else {
        return;
    };
    if let Ok(key) = tampered.accept(identity, prekey) {
        if tampered == *invite {
            assert_eq!(key, creation.shared_key);
        }
    }
});
