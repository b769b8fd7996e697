//! Command-line entry points (spec §4.11, §6.4): `key generate` and
//! `start --port --rule`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "evm-signer", about = "Network-attached EVM signing service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a freshly generated secp256k1 key pair and exit.
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Start the signing service.
    Start {
        /// Defers to the configured `listen.port` unless set to something
        /// other than the default 80 (spec §6.4).
        #[arg(long, default_value_t = 80)]
        port: u16,
        #[arg(long, default_value = "rule.json")]
        rule: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeyAction {
    Generate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
