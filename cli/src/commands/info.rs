//! Show configuration and key info

use anyhow::Result;
use colored::Colorize;

use crate::config::{config_file, keys_file, read_key_info, stealth_dir, NetworkConfig};

pub fn run(config: &NetworkConfig) -> Result<()> {
    println!();
    println!("{}", "StealthFlow Configuration".yellow().bold());
    println!();

    println!("{}:", "Keys Directory".cyan());
    println!("  {}", stealth_dir()?.display());
    println!();

    match read_key_info() {
        Ok(stored) => {
            println!("{}", "Stealth Keys: CONFIGURED".green());
            println!("  Created: {}", stored.created_at);
            println!("  Meta-address: {}", stored.meta_address);
        }
        Err(_) => {
            println!("{}", "Stealth Keys: NOT CONFIGURED".red());
            println!("  Run 'stealthflow keygen' to generate keys");
        }
    }
    println!();

    println!("{}:", "Network".cyan());
    println!("  RPC:           {}", config.rpc_url);
    println!(
        "  Relayer:       {}",
        config.relayer_url.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "  Sponsor:       {}",
        config.sponsor_address.as_deref().unwrap_or("(not configured)")
    );
    println!("  Account class: {}", config.account_class_hash);
    println!("  Token:         {}", config.token);
    println!("  Fee:           {}", config.reimbursement_fee);
    println!();

    println!("{}:", "File Locations".cyan());
    println!("  Keys:   {}", keys_file()?.display());
    println!("  Config: {}", config_file()?.display());

    Ok(())
}
