//! Parley Cryptographic Core
//!
//! End-to-end encryption primitives for Parley chats. The relay stores and
//! forwards opaque hex blobs; every key, secret and plaintext lives only on
//! the clients. Functions that need randomness take an [`Environment`] so
//! tests can run from a fixed seed.
//!
//! # Key Lifecycle
//!
//! Each user holds one long-term identity key and one signed prekey. The
//! identity key is backed up as a 24-word recovery phrase. Conversations get
//! a shared key from an offline handshake (two parties) or a Diffie-Hellman
//! tree (groups), and messages are sealed under that key.
//!
//! ```text
//! identity key ──▶ recovery phrase (backup)
//!      │
//!      ├── signs ──▶ prekey ──▶ KeyBundle (published)
//!      │
//!      ▼
//! X3DH per invitee ──▶ leaf secrets ──▶ DH tree ──▶ group key
//!                                                     │
//!                                                     ▼
//!                                           AES-256-GCM envelopes
//! ```
//!
//! # Security
//!
//! Authenticity:
//! - A bundle's prekey must carry a valid signature by its identity key
//! - Group creation is all-or-nothing: one bad bundle aborts the group
//! - Envelopes carry a GCM tag; any failed tag is an undecryptable message
//!
//! Secrecy:
//! - The group key (tree root) is never transmitted, only public nodes
//! - Private keys and shared keys are zeroized on drop
//!
//! Not provided: forward secrecy within a conversation, or post-compromise
//! recovery. A shared key stays valid for the life of its conversation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod challenge;
pub mod cipher;
pub mod env;
pub mod error;
pub mod invite;
pub mod kdf;
pub mod keys;
pub mod recovery;
pub mod tree;
pub mod x3dh;

pub use challenge::Challenge;
pub use cipher::{Envelope, NONCE_SIZE, TAG_SIZE, decrypt, encrypt};
pub use env::{Environment, SystemEnv};
pub use error::{CipherError, GroupError, KeyError, RecoveryError, X3dhError};
pub use invite::GroupInvite;
pub use kdf::kdf;
pub use keys::{KEY_SIZE, PrivateKey, PublicKey, SIGNATURE_SIZE, SharedKey, Signature};
pub use recovery::{PHRASE_WORDS, RecoveryPhrase, key_to_recovery, recovery_to_key};
pub use tree::{GroupCreation, KeyTree, MemberSlot, TreeSlot, create_group, recv_group, round_up2};
pub use x3dh::{Handshake, Initiation, KeyBundle};
