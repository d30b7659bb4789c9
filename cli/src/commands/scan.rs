//! Scan announcements for incoming stealth payments

use std::path::Path;

use anyhow::{bail, Result};
use colored::Colorize;

use stealthflow::starknet::felt_to_hex;
use stealthflow::{scan_announcements, ClaimProtocol};

use crate::commands::load_announcements;
use crate::config::{load_keys, NetworkConfig};

pub fn run(config: &NetworkConfig, file: &Path, show_keys: bool) -> Result<()> {
    println!("{}", "Scanning for incoming stealth payments...".cyan());

    if !file.exists() {
        bail!("Announcements file {} does not exist", file.display());
    }

    let keys = load_keys()?;
    let announcements = load_announcements(file)?;
    let protocol = ClaimProtocol::new(config.address_config()?);

    let report = scan_announcements(&keys, &announcements)?;

    println!(
        "Scanned {} announcements ({} filtered by view tag)",
        report.scanned, report.tag_rejections
    );
    if report.key_mismatches > 0 {
        println!(
            "{}",
            format!(
                "{} announcements matched the view tag but not the key - check the sender's software",
                report.key_mismatches
            )
            .yellow()
        );
    }
    println!();

    if report.payments.is_empty() {
        println!("{}", "No payments found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} payment(s):", report.payments.len()).green().bold());
    println!();
    for payment in &report.payments {
        let account = protocol.stealth_address(&payment.announcement.stealth_pubkey)?;
        println!("  [{}] {}", payment.index, felt_to_hex(&account));
        if show_keys {
            println!("      key: {}", payment.stealth_key.to_hex().red());
        }
    }
    println!();
    println!(
        "{}",
        "Claim with: stealthflow claim --announcements <file> --index <N> --to <address>".dimmed()
    );

    Ok(())
}
