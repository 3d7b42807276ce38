//! BioVault command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};

/// BioVault - biometric-gated secure value storage
#[derive(Parser)]
#[command(name = "biovault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Service namespace for stored values
    #[arg(long, env = "BIOVAULT_SERVICE", default_value = "biovault")]
    pub service: String,

    /// Label attached to stored entries
    #[arg(long, env = "BIOVAULT_LABEL", default_value = "BioVault")]
    pub label: String,

    /// Access group for cross-application sharing
    #[arg(long, env = "BIOVAULT_ACCESS_GROUP")]
    pub access_group: Option<String>,

    /// Store values unprotected even when biometrics are configured
    #[arg(long)]
    pub no_biometrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show biometric availability and validation state
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a value under a key
    Set {
        /// Key to store under
        key: String,

        /// Value to store (if omitted, prompts for hidden input)
        #[arg(long)]
        value: Option<String>,
    },

    /// Retrieve a stored value
    Get {
        /// Key to look up
        key: String,

        /// Write the raw bytes instead of requiring UTF-8
        #[arg(long)]
        raw: bool,
    },

    /// Remove a stored value
    Rm {
        /// Key to remove
        key: String,
    },

    /// Check whether a biometric-validated write is on record
    Check,
}

/// Run the parsed command.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    commands::run(cli).await
}
