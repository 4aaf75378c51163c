//! Parley command-line binary.
//!
//! # Usage
//!
//! ```bash
//! # New identity and prekey, then a published bundle
//! parley keygen
//! parley bundle --identity <hex> --prekey <hex>
//!
//! # Back up and restore an identity
//! parley recovery encode --key <hex>
//! parley recovery decode --phrase "word word ..."
//! ```

use std::io::Write;

use clap::Parser;
use parley_cli::{Command, run};
use parley_crypto::SystemEnv;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley key and message tool
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "End-to-end encrypted group messaging primitives")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut stdout = std::io::stdout().lock();
    run(args.command, &SystemEnv::new(), &mut stdout)?;
    stdout.flush()?;

    Ok(())
}
