//! Parley operator tool.
//!
//! Thin command layer over `parley-crypto`. Every input is hex or JSON on
//! the command line and every result is a single JSON object, so the tool
//! composes with shell pipelines and with the relay's blob format.
//!
//! Private keys are passed and printed in hex. Treat the terminal and
//! shell history accordingly.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli_error;
pub mod commands;

pub use cli_error::CliError;
pub use commands::{ChallengeCommand, Command, GroupCommand, HandshakeCommand, RecoveryCommand, run};
