//! Secure key storage with encryption at rest
//!
//! The view and spend secrets are sealed with AES-256-GCM under a key derived
//! from the user's password with Argon2id. Only the meta-address and the
//! creation time are readable without the password.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{bail, Context, Result};
use argon2::{password_hash::rand_core::RngCore, password_hash::SaltString, Argon2};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use stealthflow::{SecretScalar, StealthKeys};

const FILE_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;

/// Argon2id cost parameters, stored alongside the ciphertext
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory in KiB
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536, // 64 MB
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    fn derive_key(&self, password: &str, salt: &str) -> Result<[u8; 32]> {
        let params = argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, Some(32))
            .map_err(|e| anyhow::anyhow!("Argon2 params error: {}", e))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut key = [0u8; 32];
        argon2
            .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut key)
            .map_err(|e| anyhow::anyhow!("Key derivation failed: {}", e))?;
        Ok(key)
    }
}

/// Encrypted key file format
#[derive(Serialize, Deserialize)]
pub struct EncryptedKeyFile {
    pub version: u8,
    pub kdf: KdfParams,
    /// Argon2 salt (PHC base64 alphabet)
    pub salt: String,
    /// AES-GCM nonce (base64)
    pub nonce: String,
    /// Sealed [`KeyData`] (base64)
    pub ciphertext: String,
    /// Public; lets `info` and `address` work without the password
    pub meta_address: String,
    pub created_at: String,
}

/// Plaintext secrets, only ever held in memory
#[derive(Serialize, Deserialize)]
struct KeyData {
    view_secret: [u8; 32],
    spend_secret: [u8; 32],
}

impl Drop for KeyData {
    fn drop(&mut self) {
        self.view_secret.zeroize();
        self.spend_secret.zeroize();
    }
}

impl EncryptedKeyFile {
    /// Seal a key set under `password`
    pub fn encrypt(keys: &StealthKeys, password: &str, kdf: KdfParams) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let mut key_bytes = kdf.derive_key(password, salt.as_str())?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| anyhow::anyhow!("Cipher creation failed: {}", e))?;
        key_bytes.zeroize();

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let data = KeyData {
            view_secret: *keys.view_secret().as_bytes(),
            spend_secret: *keys.spend_secret().as_bytes(),
        };
        let mut plaintext = serde_json::to_vec(&data)?;
        let ciphertext = cipher.encrypt(&nonce, plaintext.as_ref());
        plaintext.zeroize();
        let ciphertext = ciphertext.map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        Ok(Self {
            version: FILE_VERSION,
            kdf,
            salt: salt.as_str().to_string(),
            nonce: b64::encode(&nonce_bytes),
            ciphertext: b64::encode(&ciphertext),
            meta_address: keys.meta_address().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Open the file and check the secrets still match the stored meta-address
    pub fn decrypt(&self, password: &str) -> Result<StealthKeys> {
        if self.version != FILE_VERSION {
            bail!("Unsupported key file version {}", self.version);
        }

        let nonce_bytes = b64::decode(&self.nonce).context("Invalid nonce encoding")?;
        let ciphertext = b64::decode(&self.ciphertext).context("Invalid ciphertext encoding")?;
        let nonce_array: [u8; NONCE_LEN] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid nonce length"))?;

        let mut key_bytes = self.kdf.derive_key(password, &self.salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| anyhow::anyhow!("Cipher creation failed: {}", e))?;
        key_bytes.zeroize();

        let mut plaintext = cipher
            .decrypt(&Nonce::from(nonce_array), ciphertext.as_ref())
            .map_err(|_| anyhow::anyhow!("Decryption failed - wrong password or corrupted data"))?;
        let data: Result<KeyData> =
            serde_json::from_slice(&plaintext).context("Failed to parse decrypted key data");
        plaintext.zeroize();
        let data = data?;

        let keys = StealthKeys::from_secrets(
            SecretScalar::from_bytes(data.view_secret).context("Corrupt view secret")?,
            SecretScalar::from_bytes(data.spend_secret).context("Corrupt spend secret")?,
        )?;

        if keys.meta_address().to_string() != self.meta_address {
            bail!("Keys file is inconsistent: secrets do not match the stored meta-address");
        }
        Ok(keys)
    }
}

/// Secure key storage manager
pub struct SecureKeyStorage {
    path: PathBuf,
    kdf: KdfParams,
}

impl SecureKeyStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            kdf: KdfParams::default(),
        }
    }

    /// Override the Argon2 costs used for new files
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Encrypt and write keys, mode 0600 on Unix
    pub fn save(&self, keys: &StealthKeys, password: &str) -> Result<()> {
        let encrypted = EncryptedKeyFile::encrypt(keys, password, self.kdf)?;
        let json = serde_json::to_string_pretty(&encrypted)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create stealth directory")?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::write(&self.path, &json)?;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, &json)?;
        }

        Ok(())
    }

    /// Read the file without decrypting it
    pub fn read(&self) -> Result<EncryptedKeyFile> {
        if !self.exists() {
            bail!("No stealth keys found. Run 'stealthflow keygen' first.");
        }
        let json = fs::read_to_string(&self.path).context("Failed to read encrypted key file")?;
        serde_json::from_str(&json).context("Failed to parse encrypted key file")
    }

    pub fn load(&self, password: &str) -> Result<StealthKeys> {
        self.read()?.decrypt(password)
    }

    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let keys = self.load(old_password)?;
        self.save(&keys, new_password)
    }
}

/// Password strength validation
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_numeric());

    if !has_upper || !has_lower || !has_digit {
        bail!("Password must contain uppercase, lowercase, and numeric characters");
    }

    Ok(())
}

/// Prompt for password securely (hides input)
pub fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

/// Prompt for a new password with confirmation
pub fn prompt_new_password(prompt: &str) -> Result<String> {
    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password: ")?;

    if password != confirm {
        bail!("Passwords do not match");
    }

    validate_password_strength(&password)?;

    Ok(password)
}

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};

    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(s: &str) -> anyhow::Result<Vec<u8>> {
        STANDARD.decode(s).map_err(|e| anyhow::anyhow!("Base64 decode error: {}", e))
    }
}

/// Cheap Argon2 costs so tests stay fast
#[cfg(test)]
pub(crate) const TEST_KDF: KdfParams = KdfParams {
    m_cost: 64,
    t_cost: 1,
    p_cost: 1,
};
