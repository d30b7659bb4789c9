//! Key generation command with mnemonic support

use anyhow::{bail, Result};
use colored::Colorize;

use stealthflow::StealthKeys;

use crate::config::{keys_exist, keys_file, save_keys};

/// Options for key generation
pub struct KeygenOptions {
    /// Force overwrite existing keys
    pub force: bool,
    /// Use mnemonic for key generation (allows recovery)
    pub with_mnemonic: bool,
    /// Import from existing mnemonic
    pub import_mnemonic: Option<String>,
    /// Passphrase for mnemonic (optional extra security)
    pub passphrase: Option<String>,
}

pub fn run(options: KeygenOptions) -> Result<()> {
    if keys_exist() && !options.force {
        bail!(
            "Stealth keys already exist. Use --force to overwrite.\n\
             Warning: Overwriting keys will make any existing stealth payments unrecoverable!"
        );
    }

    println!("{}", "=== StealthFlow Key Generation ===".cyan().bold());
    println!();

    let (keys, mnemonic) = if let Some(ref phrase) = options.import_mnemonic {
        println!("{}", "Importing keys from mnemonic phrase...".cyan());
        let passphrase = options.passphrase.as_deref().unwrap_or("");
        (StealthKeys::from_mnemonic(phrase, passphrase)?, None)
    } else if options.with_mnemonic {
        println!("{}", "Generating keys with recovery phrase...".cyan());
        let (keys, phrase) = StealthKeys::generate_with_mnemonic()?;
        (keys, Some(phrase))
    } else {
        println!("{}", "Generating random keys (no recovery phrase)...".cyan());
        (StealthKeys::generate()?, None)
    };

    println!();
    println!("{}", "Choose a password. It encrypts your keys on disk.".cyan());
    save_keys(&keys)?;

    println!();
    println!("{}", "Keys generated successfully!".green().bold());
    println!();

    if let Some(ref phrase) = mnemonic {
        print_recovery_phrase(phrase);
    }

    let meta = keys.meta_address();
    println!("{}:", "Meta-Address (share this to receive payments)".yellow());
    println!("  {}", meta);
    println!();
    if let Ok(path) = keys_file() {
        println!("{}", format!("Encrypted keys saved to: {}", path.display()).dimmed());
    }
    println!();

    if mnemonic.is_none() && options.import_mnemonic.is_none() {
        println!("{}", "IMPORTANT: You did not use a recovery phrase.".red().bold());
        println!(
            "{}",
            "If you lose the keys file, payments to this meta-address are PERMANENTLY LOST.".red()
        );
    }

    Ok(())
}

fn print_recovery_phrase(phrase: &str) {
    println!("{}", "=== RECOVERY PHRASE - WRITE THIS DOWN! ===".red().bold());
    println!();
    println!("{}", "┌────────────────────────────────────────────────────────────┐".yellow());

    let words: Vec<&str> = phrase.split_whitespace().collect();
    for (i, chunk) in words.chunks(4).enumerate() {
        let line: String = chunk
            .iter()
            .enumerate()
            .map(|(j, word)| format!("{:2}. {:<12}", i * 4 + j + 1, word))
            .collect::<Vec<_>>()
            .join(" ");
        println!("│ {} │", format!("{:<58}", line).yellow());
    }

    println!("{}", "└────────────────────────────────────────────────────────────┘".yellow());
    println!();
    println!("{}", "CRITICAL: Store this phrase securely OFFLINE!".red().bold());
    println!("{}", "You will NOT be shown this phrase again.".red());
    println!();
}
