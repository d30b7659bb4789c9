//! Derive a one-time stealth account for a recipient
//!
//! Prints the Starknet address to fund and the announcement the recipient
//! needs to find it. Funding itself is a plain token transfer from any wallet.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use stealthflow::starknet::felt_to_hex;
use stealthflow::{generate_stealth_address, ClaimProtocol, MetaAddress};

use crate::commands::{load_announcements, save_announcements};
use crate::config::NetworkConfig;

pub fn run(config: &NetworkConfig, recipient: &str, out: Option<&Path>) -> Result<()> {
    println!("{}", "Preparing stealth payment...".cyan());

    let meta: MetaAddress = recipient.parse().context("Invalid meta-address format")?;

    let computation = generate_stealth_address(&meta.view_pubkey, &meta.spend_pubkey)
        .context("Failed to compute stealth address")?;
    let announcement = computation.into_announcement();

    let protocol = ClaimProtocol::new(config.address_config()?);
    let account = protocol.stealth_address(&announcement.stealth_pubkey)?;

    println!();
    println!("{}:", "Stealth account (send tokens here)".yellow());
    println!("  {}", felt_to_hex(&account));
    println!();
    println!("{}:", "Announcement (publish for the recipient)".yellow());
    println!("{}", serde_json::to_string_pretty(&announcement)?);
    println!();

    if let Some(path) = out {
        let mut announcements = load_announcements(path)?;
        announcements.push(announcement);
        save_announcements(path, &announcements)?;
        println!(
            "{}",
            format!("Announcement appended to {} ({} total)", path.display(), announcements.len())
                .dimmed()
        );
    }

    println!(
        "{}",
        "The account is deployed by the recipient's first claim; no action needed before funding."
            .dimmed()
    );
    Ok(())
}
