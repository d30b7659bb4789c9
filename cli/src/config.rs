//! Configuration and key storage for the StealthFlow CLI
//!
//! Layout:
//! - `~/.stealthflow/config.json`  network settings (optional, env overrides)
//! - `~/.stealthflow/keys.enc`     encrypted view/spend secrets, mode 0600

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use stealthflow::claim::{
    ClaimConfig, DEFAULT_REIMBURSEMENT_FEE, SEPOLIA_ACCOUNT_CLASS_HASH, STRK_TOKEN, UDC_ADDRESS,
};
use stealthflow::starknet::felt_from_hex;
use stealthflow::StealthKeys;

use crate::secure_storage::{prompt_new_password, prompt_password, EncryptedKeyFile, SecureKeyStorage};

/// Default directory for stealth keys and config
const STEALTH_DIR: &str = ".stealthflow";
const KEYS_FILE: &str = "keys.enc";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_RPC_URL: &str = "https://starknet-sepolia.public.blastapi.io/rpc/v0_7";

const ENV_RPC_URL: &str = "STEALTHFLOW_RPC_URL";
const ENV_RELAYER_URL: &str = "STEALTHFLOW_RELAYER_URL";
const ENV_SPONSOR_ADDRESS: &str = "STEALTHFLOW_SPONSOR_ADDRESS";

// ============================================================================
// Paths
// ============================================================================

pub fn stealth_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(STEALTH_DIR))
}

pub fn keys_file() -> Result<PathBuf> {
    Ok(stealth_dir()?.join(KEYS_FILE))
}

pub fn config_file() -> Result<PathBuf> {
    Ok(stealth_dir()?.join(CONFIG_FILE))
}

// ============================================================================
// Network Config
// ============================================================================

/// Network settings; every field has a Sepolia default
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// HTTP endpoint of the relayer that signs and pays for claims
    pub relayer_url: Option<String>,
    /// Relayer account credited with the reimbursement fee
    pub sponsor_address: Option<String>,
    pub account_class_hash: String,
    pub token: String,
    pub deployer_contract: String,
    /// Decimal, in the token's smallest unit
    pub reimbursement_fee: String,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            relayer_url: None,
            sponsor_address: None,
            account_class_hash: SEPOLIA_ACCOUNT_CLASS_HASH.to_string(),
            token: STRK_TOKEN.to_string(),
            deployer_contract: UDC_ADDRESS.to_string(),
            reimbursement_fee: DEFAULT_REIMBURSEMENT_FEE.to_string(),
            confirmation_timeout_secs: 120,
            poll_interval_secs: 3,
        }
    }
}

impl NetworkConfig {
    /// Load from the default location, falling back to defaults, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_file()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&json).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Environment wins over the file
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc_url = url;
        }
        if let Some(url) = lookup(ENV_RELAYER_URL) {
            self.relayer_url = Some(url);
        }
        if let Some(address) = lookup(ENV_SPONSOR_ADDRESS) {
            self.sponsor_address = Some(address);
        }
    }

    /// Build the claim configuration; requires a sponsor address
    pub fn claim_config(&self) -> Result<ClaimConfig> {
        let sponsor = self.sponsor_address.as_deref().with_context(|| {
            format!("No sponsor address configured. Set {} or add it to config.json", ENV_SPONSOR_ADDRESS)
        })?;

        let reimbursement_fee = BigUint::parse_bytes(self.reimbursement_fee.trim().as_bytes(), 10)
            .context("reimbursement_fee must be a decimal integer")?;

        let mut config = ClaimConfig::sepolia(felt_from_hex(sponsor).context("Invalid sponsor address")?);
        config.account_class_hash =
            felt_from_hex(&self.account_class_hash).context("Invalid account class hash")?;
        config.token = felt_from_hex(&self.token).context("Invalid token address")?;
        config.deployer_contract =
            felt_from_hex(&self.deployer_contract).context("Invalid deployer address")?;
        config.reimbursement_fee = reimbursement_fee;
        config.confirmation_timeout = Duration::from_secs(self.confirmation_timeout_secs);
        config.poll_interval = Duration::from_secs(self.poll_interval_secs.max(1));
        Ok(config)
    }

    /// Claim configuration for address prediction only (no relayer needed)
    pub fn address_config(&self) -> Result<ClaimConfig> {
        let mut config = ClaimConfig::sepolia(stealthflow::Felt::ZERO);
        config.account_class_hash =
            felt_from_hex(&self.account_class_hash).context("Invalid account class hash")?;
        config.token = felt_from_hex(&self.token).context("Invalid token address")?;
        Ok(config)
    }
}

// ============================================================================
// Key Storage
// ============================================================================

pub fn key_storage() -> Result<SecureKeyStorage> {
    Ok(SecureKeyStorage::new(keys_file()?))
}

pub fn keys_exist() -> bool {
    keys_file().map(|path| path.exists()).unwrap_or(false)
}

/// Ask for a new password and write the encrypted keys file
pub fn save_keys(keys: &StealthKeys) -> Result<()> {
    let password = prompt_new_password("Password to encrypt your keys: ")?;
    key_storage()?.save(keys, &password)
}

/// Meta-address and creation time; no password needed
pub fn read_key_info() -> Result<EncryptedKeyFile> {
    key_storage()?.read()
}

/// Ask for the password and decrypt the keys file
pub fn load_keys() -> Result<StealthKeys> {
    let storage = key_storage()?;
    let file = storage.read()?;
    let password = prompt_password("Keys password: ")?;
    file.decrypt(&password)
}
