//! Display stealth meta-address

use anyhow::{Context, Result};
use colored::Colorize;

use stealthflow::MetaAddress;

use crate::config::read_key_info;

/// Reads only the public part of the keys file; no password prompt
pub fn run() -> Result<()> {
    let meta: MetaAddress = read_key_info()?
        .meta_address
        .parse()
        .context("Keys file holds an invalid meta-address")?;

    println!();
    println!("{}", "Your Stealth Meta-Address".yellow().bold());
    println!();
    println!("{}", meta);
    println!();
    println!("{}:", "Components".dimmed());
    if let (Some(view), Some(spend)) = (meta.view_pubkey.to_bytes(), meta.spend_pubkey.to_bytes()) {
        println!("  View pubkey:  04{}", hex::encode(view));
        println!("  Spend pubkey: 04{}", hex::encode(spend));
    }
    println!();
    println!(
        "{}",
        "Share the meta-address above to receive private payments.".dimmed()
    );

    Ok(())
}
