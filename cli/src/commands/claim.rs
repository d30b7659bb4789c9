//! Gasless claim from a stealth account
//!
//! The stealth key is recovered by re-scanning the chosen announcement, so the
//! key never has to be copied around by hand.

use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use num_bigint::BigUint;

use stealthflow::claim::{ClaimAmount, ClaimRequest};
use stealthflow::starknet::{felt_from_hex, felt_to_hex};
use stealthflow::{scan_announcement, ClaimProtocol, StealthError};

use crate::commands::load_announcements;
use crate::config::{load_keys, NetworkConfig};
use crate::ledger::RpcLedger;

pub struct ClaimOptions<'a> {
    pub announcements: &'a Path,
    pub index: usize,
    pub recipient: &'a str,
    /// Smallest token unit; zero sweeps the balance
    pub amount: Option<&'a str>,
}

pub async fn run(config: &NetworkConfig, options: ClaimOptions<'_>) -> Result<()> {
    let announcements = load_announcements(options.announcements)?;
    let announcement = announcements
        .get(options.index)
        .with_context(|| {
            format!(
                "No announcement at index {} ({} in file)",
                options.index,
                announcements.len()
            )
        })?;

    let keys = load_keys()?;
    let stealth_key = match scan_announcement(&keys, announcement)? {
        Some(key) => key,
        None => bail!("Announcement {} is not addressed to your keys", options.index),
    };

    let requested = match options.amount {
        Some(text) => BigUint::parse_bytes(text.trim().as_bytes(), 10)
            .context("Amount must be a decimal integer in the token's smallest unit")?,
        None => BigUint::default(),
    };

    let request = ClaimRequest {
        recipient: felt_from_hex(options.recipient).context("Invalid recipient address")?,
        amount: ClaimAmount::from_requested(requested),
        expected_stealth_pubkey: Some(announcement.stealth_pubkey.clone()),
    };

    let claim_config = config.claim_config()?;
    if config.relayer_url.is_none() {
        bail!("No relayer endpoint configured. Set STEALTHFLOW_RELAYER_URL or add relayer_url to config.json");
    }
    let ledger = RpcLedger::new(&config.rpc_url, config.relayer_url.as_deref())?;
    let protocol = ClaimProtocol::new(claim_config);

    let account = protocol.stealth_address(&announcement.stealth_pubkey)?;
    println!("{}", "Claiming stealth payment...".cyan());
    println!("  Account:   {}", felt_to_hex(&account));
    println!("  Recipient: {}", felt_to_hex(&request.recipient));
    println!("  Fee:       {}", protocol.config().reimbursement_fee);
    println!();

    match protocol.gasless_claim(&ledger, &stealth_key, &request).await {
        Ok(receipt) => {
            println!("{}", "Claim confirmed!".green().bold());
            println!("  Transaction: {}", felt_to_hex(&receipt.tx_hash));
            println!("  Amount:      {}", receipt.amount);
            if receipt.deployed_account {
                println!("  {}", "Stealth account deployed in the same transaction".dimmed());
            }
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            Err(err.into())
        }
    }
}

/// Tell the user whether retrying is safe
fn report_failure(err: &StealthError) {
    println!("{}", "Claim failed.".red().bold());
    if let Some(tx) = err.submitted_transaction() {
        println!(
            "{}",
            format!("A transaction was submitted ({}). Check its status before retrying.", tx).yellow()
        );
    } else if err.is_retry_safe() {
        println!("{}", "Nothing was submitted. It is safe to retry.".yellow());
    }
}
