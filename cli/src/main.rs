//! StealthFlow CLI - stealth payments on Starknet with gasless claims

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod ledger;
mod secure_storage;

#[cfg(test)]
mod tests;

use commands::*;
use config::NetworkConfig;

#[derive(Parser)]
#[command(name = "stealthflow")]
#[command(author = "StealthFlow Team")]
#[command(version = "0.1.0")]
#[command(about = "Stealth payments on Starknet - one-time accounts with gasless claims")]
#[command(long_about = r#"
StealthFlow gives every payment a fresh Starknet account that only the
recipient can link to their identity. Share your meta-address publicly,
receive payments privately, and claim them without holding gas.

Quick Start:
  1. stealthflow keygen                      Generate your stealth keys
  2. stealthflow address                     Show the meta-address to share
  3. stealthflow scan -f announcements.json  Find incoming payments
  4. stealthflow claim -f announcements.json --index 0 --to 0x...
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Starknet RPC URL (overrides config and STEALTHFLOW_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate new stealth key pairs (view + spend keys)
    Keygen {
        /// Force overwrite existing keys
        #[arg(short, long)]
        force: bool,

        /// Skip the recovery phrase
        #[arg(long)]
        no_mnemonic: bool,

        /// Import from existing recovery phrase
        #[arg(long)]
        import_mnemonic: Option<String>,

        /// Passphrase for mnemonic (optional extra security)
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Show your stealth meta-address
    Address,

    /// Derive a one-time account for a recipient's meta-address
    Send {
        /// Recipient's meta-address (st:starknet:0x...)
        #[arg(short, long)]
        to: String,

        /// Append the announcement to this JSON file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Scan announcements for incoming stealth payments
    Scan {
        /// JSON file with published announcements
        #[arg(short, long)]
        file: PathBuf,

        /// Print recovered one-time private keys
        #[arg(long)]
        show_keys: bool,
    },

    /// Claim a stealth payment through the relayer (no gas needed)
    Claim {
        /// JSON file with published announcements
        #[arg(short = 'f', long)]
        announcements: PathBuf,

        /// Index of the announcement to claim (from scan results)
        #[arg(short, long)]
        index: usize,

        /// Destination address
        #[arg(short, long)]
        to: String,

        /// Amount in the token's smallest unit (default: sweep the balance minus the fee)
        #[arg(short, long)]
        amount: Option<String>,
    },

    /// Show configuration and key info
    Info,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "stealthflow=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut network = NetworkConfig::load()?;
    if let Some(url) = cli.rpc_url {
        network.rpc_url = url;
    }

    match cli.command {
        Commands::Keygen {
            force,
            no_mnemonic,
            import_mnemonic,
            passphrase,
        } => {
            keygen::run(keygen::KeygenOptions {
                force,
                with_mnemonic: !no_mnemonic,
                import_mnemonic,
                passphrase,
            })?;
        }
        Commands::Address => {
            address::run()?;
        }
        Commands::Send { to, out } => {
            send::run(&network, &to, out.as_deref())?;
        }
        Commands::Scan { file, show_keys } => {
            scan::run(&network, &file, show_keys)?;
        }
        Commands::Claim {
            announcements,
            index,
            to,
            amount,
        } => {
            claim::run(
                &network,
                claim::ClaimOptions {
                    announcements: &announcements,
                    index,
                    recipient: &to,
                    amount: amount.as_deref(),
                },
            )
            .await?;
        }
        Commands::Info => {
            info::run(&network)?;
        }
    }

    Ok(())
}
