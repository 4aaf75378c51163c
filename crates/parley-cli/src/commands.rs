//! Subcommands and their execution.
//!
//! Every argument and result is hex or JSON. Results are written to the
//! given writer as one pretty-printed JSON object.

use std::io::Write;

use clap::Subcommand;
use parley_crypto::{
    Challenge, Envelope, Environment, GroupInvite, Initiation, KeyBundle, PrivateKey, PublicKey,
    SharedKey, Signature, create_group, decrypt, encrypt, key_to_recovery, recovery_to_key, x3dh,
};
use serde_json::{Value, json};

use crate::CliError;

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a new private key
    Keygen,

    /// Derive the public key of a private key
    PublicKey {
        /// Private key (hex)
        #[arg(long)]
        key: String,
    },

    /// Publish a signed key bundle
    Bundle {
        /// Identity private key (hex)
        #[arg(long)]
        identity: String,
        /// Signed prekey private key (hex)
        #[arg(long)]
        prekey: String,
    },

    /// Check a published bundle's prekey signature
    VerifyBundle {
        /// Bundle JSON `{ik, spk, sig}`
        #[arg(long)]
        bundle: String,
    },

    /// Pairwise key agreement
    #[command(subcommand)]
    Handshake(HandshakeCommand),

    /// Recovery phrases
    #[command(subcommand)]
    Recovery(RecoveryCommand),

    /// Group key agreement
    #[command(subcommand)]
    Group(GroupCommand),

    /// Encrypt a message under a shared key
    Encrypt {
        /// Shared key (hex)
        #[arg(long)]
        key: String,
        /// Message text
        #[arg(long)]
        plaintext: String,
        /// Identity private key to sign the envelope with (hex)
        #[arg(long)]
        sign_with: Option<String>,
    },

    /// Decrypt an envelope
    Decrypt {
        /// Shared key (hex)
        #[arg(long)]
        key: String,
        /// Envelope (hex)
        #[arg(long)]
        envelope: String,
        /// Sender identity public key (hex); requires `--signature`
        #[arg(long, requires = "signature")]
        sender: Option<String>,
        /// Sender signature over the envelope (hex)
        #[arg(long, requires = "sender")]
        signature: Option<String>,
    },

    /// Login challenges
    #[command(subcommand)]
    Challenge(ChallengeCommand),

    /// Derive the key used to encrypt one's own private storage
    PersonalKey {
        /// Private key (hex)
        #[arg(long)]
        key: String,
    },
}

/// Pairwise handshake subcommands.
#[derive(Subcommand, Debug)]
pub enum HandshakeCommand {
    /// Start a handshake against a published bundle
    Initiate {
        /// Own identity private key (hex)
        #[arg(long)]
        identity: String,
        /// Peer bundle JSON `{ik, spk, sig}`
        #[arg(long)]
        bundle: String,
    },
    /// Complete a handshake from an initiation
    Respond {
        /// Own identity private key (hex)
        #[arg(long)]
        identity: String,
        /// Own signed prekey private key (hex)
        #[arg(long)]
        prekey: String,
        /// Initiator identity public key (hex)
        #[arg(long)]
        peer: String,
        /// Initiation JSON `{ek, spk}`
        #[arg(long)]
        initiation: String,
    },
}

/// Recovery phrase subcommands.
#[derive(Subcommand, Debug)]
pub enum RecoveryCommand {
    /// Encode a private key as 24 words
    Encode {
        /// Private key (hex)
        #[arg(long)]
        key: String,
    },
    /// Decode 24 words back to the private key
    Decode {
        /// The phrase, words separated by spaces
        #[arg(long)]
        phrase: String,
    },
}

/// Group subcommands.
#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Create a group; bundle order assigns positions 1, 2, ...
    Create {
        /// Creator identity private key (hex)
        #[arg(long)]
        identity: String,
        /// Invitee bundle JSON, repeated once per invitee
        #[arg(long = "bundle", required = true)]
        bundles: Vec<String>,
    },
    /// Accept a group invite
    Accept {
        /// Own identity private key (hex)
        #[arg(long)]
        identity: String,
        /// Own signed prekey private key (hex)
        #[arg(long)]
        prekey: String,
        /// Invite JSON `{ik, ek, spk, key_tree, position}`
        #[arg(long)]
        invite: String,
    },
}

/// Login challenge subcommands.
#[derive(Subcommand, Debug)]
pub enum ChallengeCommand {
    /// Issue a challenge point for a registered public key
    Issue {
        /// User public key (hex)
        #[arg(long)]
        public: String,
    },
    /// Answer a challenge with a private key
    Respond {
        /// Private key (hex)
        #[arg(long)]
        key: String,
        /// Challenge point (hex)
        #[arg(long)]
        challenge: String,
    },
}

/// Execute a command and write its JSON result to `out`.
pub fn run(command: Command, env: &impl Environment, out: &mut impl Write) -> Result<(), CliError> {
    let output = execute(command, env)?;
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}

fn execute(command: Command, env: &impl Environment) -> Result<Value, CliError> {
    match command {
        Command::Keygen => {
            let key = PrivateKey::generate(env);
            Ok(json!({ "private_key": key.to_hex(), "public_key": key.public_key().to_hex() }))
        },
        Command::PublicKey { key } => {
            let key = PrivateKey::from_hex(&key)?;
            Ok(json!({ "public_key": key.public_key().to_hex() }))
        },
        Command::Bundle { identity, prekey } => {
            let bundle =
                KeyBundle::publish(&PrivateKey::from_hex(&identity)?, &PrivateKey::from_hex(&prekey)?);
            Ok(serde_json::to_value(bundle)?)
        },
        Command::VerifyBundle { bundle } => {
            let bundle: KeyBundle = serde_json::from_str(&bundle)?;
            if !bundle.verify() {
                return Err(CliError::InvalidBundle);
            }
            Ok(json!({ "valid": true, "ik": bundle.ik.to_hex() }))
        },
        Command::Handshake(HandshakeCommand::Initiate { identity, bundle }) => {
            let bundle: KeyBundle = serde_json::from_str(&bundle)?;
            let handshake = x3dh::send(env, &PrivateKey::from_hex(&identity)?, &bundle)?;
            Ok(json!({
                "shared_key": handshake.shared_key.to_hex(),
                "initiation": handshake.initiation,
            }))
        },
        Command::Handshake(HandshakeCommand::Respond { identity, prekey, peer, initiation }) => {
            let initiation: Initiation = serde_json::from_str(&initiation)?;
            let shared_key = x3dh::recv(
                &PrivateKey::from_hex(&identity)?,
                &PublicKey::from_hex(&peer)?,
                &PrivateKey::from_hex(&prekey)?,
                &initiation,
            )?;
            Ok(json!({ "shared_key": shared_key.to_hex() }))
        },
        Command::Recovery(RecoveryCommand::Encode { key }) => {
            let phrase = key_to_recovery(&PrivateKey::from_hex(&key)?);
            Ok(json!({ "phrase": phrase.as_str() }))
        },
        Command::Recovery(RecoveryCommand::Decode { phrase }) => {
            let key = recovery_to_key(&phrase)?;
            Ok(json!({ "private_key": key.to_hex(), "public_key": key.public_key().to_hex() }))
        },
        Command::Group(GroupCommand::Create { identity, bundles }) => {
            let identity = PrivateKey::from_hex(&identity)?;
            let bundles = bundles
                .iter()
                .map(|bundle| serde_json::from_str::<KeyBundle>(bundle))
                .collect::<Result<Vec<_>, _>>()?;

            let creation = create_group(env, &identity, &bundles)?;
            tracing::info!(invitees = bundles.len(), "group created");

            Ok(json!({
                "shared_key": creation.shared_key.to_hex(),
                "invites": creation.invites(identity.public_key()),
            }))
        },
        Command::Group(GroupCommand::Accept { identity, prekey, invite }) => {
            let invite: GroupInvite = serde_json::from_str(&invite)?;
            let key =
                invite.accept(&PrivateKey::from_hex(&identity)?, &PrivateKey::from_hex(&prekey)?)?;
            Ok(json!({ "shared_key": key.to_hex(), "position": invite.position }))
        },
        Command::Encrypt { key, plaintext, sign_with } => {
            let envelope = encrypt(env, &SharedKey::from_hex(&key)?, plaintext.as_bytes());
            let mut output = json!({ "envelope": envelope.to_hex() });
            if let Some(identity) = sign_with {
                let signature = envelope.sign(&PrivateKey::from_hex(&identity)?);
                output["signature"] = Value::String(signature.to_hex());
            }
            Ok(output)
        },
        Command::Decrypt { key, envelope, sender, signature } => {
            let envelope = Envelope::from_hex(&envelope)?;
            if let (Some(sender), Some(signature)) = (sender, signature) {
                let sender = PublicKey::from_hex(&sender)?;
                let signature = Signature::from_hex(&signature)?;
                if !envelope.verify_signature(&sender, &signature) {
                    return Err(CliError::InvalidSignature);
                }
            }
            let plaintext = decrypt(&SharedKey::from_hex(&key)?, &envelope)?;
            Ok(json!({ "plaintext": String::from_utf8_lossy(&plaintext) }))
        },
        Command::Challenge(ChallengeCommand::Issue { public }) => {
            let challenge = Challenge::issue(env, &PublicKey::from_hex(&public)?);
            Ok(json!({ "challenge": challenge.point().to_hex() }))
        },
        Command::Challenge(ChallengeCommand::Respond { key, challenge }) => {
            let key = PrivateKey::from_hex(&key)?;
            let response = key.challenge_response(&PublicKey::from_hex(&challenge)?);
            Ok(json!({ "response": response.to_hex() }))
        },
        Command::PersonalKey { key } => {
            let key = PrivateKey::from_hex(&key)?;
            Ok(json!({ "personal_key": key.personal_key().to_hex() }))
        },
    }
}
