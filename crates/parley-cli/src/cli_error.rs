//! CLI error types.
//!
//! Wraps the core's typed errors with the boundary failures of the tool
//! itself (malformed JSON, I/O on stdout).

use std::fmt;

use parley_crypto::{CipherError, GroupError, KeyError, RecoveryError, X3dhError};

/// Errors a command can end with.
#[derive(Debug)]
pub enum CliError {
    /// A key argument is malformed.
    ///
    /// Bad hex, wrong width, or a public key that is not a curve point.
    Key(KeyError),

    /// A pairwise handshake failed.
    Handshake(X3dhError),

    /// Group creation or invite acceptance failed.
    Group(GroupError),

    /// An envelope failed to decrypt or decode.
    Cipher(CipherError),

    /// A recovery phrase was rejected.
    ///
    /// The cause is deliberately not reported.
    Recovery(RecoveryError),

    /// A published bundle does not carry a valid prekey signature.
    InvalidBundle,

    /// A signature does not verify.
    InvalidSignature,

    /// JSON argument or output failed to (de)serialize.
    Json(serde_json::Error),

    /// Writing the result failed.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(err) => write!(f, "key error: {err}"),
            Self::Handshake(err) => write!(f, "handshake error: {err}"),
            Self::Group(err) => write!(f, "group error: {err}"),
            Self::Cipher(err) => write!(f, "cipher error: {err}"),
            Self::Recovery(err) => write!(f, "{err}"),
            Self::InvalidBundle => write!(f, "bundle signature does not verify"),
            Self::InvalidSignature => write!(f, "signature does not verify"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Key(err) => Some(err),
            Self::Handshake(err) => Some(err),
            Self::Group(err) => Some(err),
            Self::Cipher(err) => Some(err),
            Self::Recovery(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::InvalidBundle | Self::InvalidSignature => None,
        }
    }
}

impl From<KeyError> for CliError {
    fn from(err: KeyError) -> Self {
        Self::Key(err)
    }
}

impl From<X3dhError> for CliError {
    fn from(err: X3dhError) -> Self {
        Self::Handshake(err)
    }
}

impl From<GroupError> for CliError {
    fn from(err: GroupError) -> Self {
        Self::Group(err)
    }
}

impl From<CipherError> for CliError {
    fn from(err: CipherError) -> Self {
        Self::Cipher(err)
    }
}

impl From<RecoveryError> for CliError {
    fn from(err: RecoveryError) -> Self {
        Self::Recovery(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
