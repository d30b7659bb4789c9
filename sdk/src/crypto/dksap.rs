//! DKSAP - Dual-Key Stealth Address Protocol over secp256k1
//!
//! ## Protocol Overview
//!
//! ### Recipient Setup
//! 1. Generate view key pair: (v, V) where V = v·G
//! 2. Generate spend key pair: (b, B) where B = b·G
//! 3. Publish meta-address: (V, B)
//!
//! ### Sender Flow
//! 1. Generate ephemeral key pair: (r, R) where R = r·G
//! 2. Compute shared hash: h = keccak256((r·V).x)
//! 3. View tag = h[0] (before reduction)
//! 4. Derive stealth pubkey: P = B + (h mod n)·G
//! 5. Publish (P, R, view tag)
//!
//! ### Recipient Scanning
//! 1. h = keccak256((v·R).x), identical to the sender's h
//! 2. If h[0] != view tag, reject without any further curve work
//! 3. Otherwise p = (b + h) mod n, accepted only if p·G == P

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroize;

use super::curve::{secp256k1, Point};
use super::keys::{
    generate_keypair_with_rng, keccak256, parse_hex_biguint, public_key_from_bytes,
    public_key_from_coordinates, shared_secret, KeyPair, SecretScalar, MAX_SAMPLING_ATTEMPTS,
};
use crate::error::{Result, StealthError};

/// Prefix of the textual meta-address
pub const META_ADDRESS_PREFIX: &str = "st:starknet:";

const VIEW_KEY_DOMAIN: &[u8] = b"stealthflow/view";
const SPEND_KEY_DOMAIN: &[u8] = b"stealthflow/spend";

// ============================================================================
// Stealth Keys
// ============================================================================

/// Complete stealth key set for a recipient
///
/// Clone is NOT derived to prevent accidental secret duplication.
pub struct StealthKeys {
    view_secret: SecretScalar,
    spend_secret: SecretScalar,
    /// V = v·G
    pub view_pubkey: Point,
    /// B = b·G
    pub spend_pubkey: Point,
}

impl StealthKeys {
    /// Generate new random stealth keys from OS entropy
    pub fn generate() -> Result<Self> {
        let mut rng = OsRng;
        let view = generate_keypair_with_rng(&mut rng)?;
        let spend = generate_keypair_with_rng(&mut rng)?;
        Ok(Self::from_pairs(view, spend))
    }

    /// Reconstruct keys from stored secrets
    pub fn from_secrets(view_secret: SecretScalar, spend_secret: SecretScalar) -> Result<Self> {
        let view = KeyPair::from_secret(view_secret)?;
        let spend = KeyPair::from_secret(spend_secret)?;
        Ok(Self::from_pairs(view, spend))
    }

    /// Derive keys from a BIP-39 mnemonic phrase
    ///
    /// Derivation:
    /// - view_secret  = keccak256("stealthflow/view"  || seed || ctr) mod-checked into [1, n)
    /// - spend_secret = keccak256("stealthflow/spend" || seed || ctr)
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self> {
        let mnemonic: bip39::Mnemonic = phrase
            .parse()
            .map_err(|e: bip39::Error| StealthError::InvalidMnemonic(e.to_string()))?;

        let mut seed = mnemonic.to_seed(passphrase);
        let view_secret = derive_secret(VIEW_KEY_DOMAIN, &seed);
        let spend_secret = derive_secret(SPEND_KEY_DOMAIN, &seed);
        seed.zeroize();

        Self::from_secrets(view_secret?, spend_secret?)
    }

    /// Generate a fresh 24-word mnemonic and derive keys from it
    pub fn generate_with_mnemonic() -> Result<(Self, String)> {
        let mut entropy = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut entropy)
            .map_err(|_| StealthError::InsecureRandomSource)?;

        let mnemonic = bip39::Mnemonic::from_entropy(&entropy)
            .map_err(|e| StealthError::InvalidMnemonic(e.to_string()));
        entropy.zeroize();

        let phrase = mnemonic?.to_string();
        let keys = Self::from_mnemonic(&phrase, "")?;
        Ok((keys, phrase))
    }

    fn from_pairs(view: KeyPair, spend: KeyPair) -> Self {
        Self {
            view_secret: view.secret,
            spend_secret: spend.secret,
            view_pubkey: view.public,
            spend_pubkey: spend.public,
        }
    }

    pub fn meta_address(&self) -> MetaAddress {
        MetaAddress {
            view_pubkey: self.view_pubkey.clone(),
            spend_pubkey: self.spend_pubkey.clone(),
        }
    }

    /// WARNING: Handle these with extreme care!
    pub fn view_secret(&self) -> &SecretScalar {
        &self.view_secret
    }

    /// WARNING: Handle these with extreme care!
    pub fn spend_secret(&self) -> &SecretScalar {
        &self.spend_secret
    }
}

fn derive_secret(domain: &[u8], seed: &[u8]) -> Result<SecretScalar> {
    for counter in 0..MAX_SAMPLING_ATTEMPTS as u32 {
        let mut preimage = Vec::with_capacity(domain.len() + seed.len() + 4);
        preimage.extend_from_slice(domain);
        preimage.extend_from_slice(seed);
        preimage.extend_from_slice(&counter.to_be_bytes());
        let digest = keccak256(&preimage);
        preimage.zeroize();

        if let Ok(secret) = SecretScalar::from_bytes(digest) {
            return Ok(secret);
        }
    }
    Err(StealthError::InvalidScalar)
}

// ============================================================================
// Meta-Address
// ============================================================================

/// The public half of a recipient identity: (V, B)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaAddress {
    pub view_pubkey: Point,
    pub spend_pubkey: Point,
}

impl fmt::Display for MetaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.view_pubkey.to_bytes().unwrap_or([0u8; 64]);
        let spend = self.spend_pubkey.to_bytes().unwrap_or([0u8; 64]);
        write!(
            f,
            "{}0x{}{}",
            META_ADDRESS_PREFIX,
            hex::encode(view),
            hex::encode(spend)
        )
    }
}

impl FromStr for MetaAddress {
    type Err = StealthError;

    fn from_str(input: &str) -> Result<Self> {
        let encoded = input.trim();
        let encoded = encoded.strip_prefix(META_ADDRESS_PREFIX).unwrap_or(encoded);
        let encoded = encoded.strip_prefix("0x").unwrap_or(encoded);
        let bytes = hex::decode(encoded)
            .map_err(|e| StealthError::InvalidMetaAddress(e.to_string()))?;

        if bytes.len() != 128 {
            return Err(StealthError::InvalidMetaAddress(format!(
                "expected 128 bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self {
            view_pubkey: public_key_from_bytes(&bytes[..64])?,
            spend_pubkey: public_key_from_bytes(&bytes[64..])?,
        })
    }
}

// ============================================================================
// Announcements
// ============================================================================

/// What a sender publishes for each payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AnnouncementRecord", into = "AnnouncementRecord")]
pub struct StealthAnnouncement {
    /// P = B + h·G
    pub stealth_pubkey: Point,
    /// R = r·G
    pub ephemeral_pubkey: Point,
    pub view_tag: u8,
}

/// JSON shape of an announcement: hex coordinates
#[derive(Serialize, Deserialize)]
struct AnnouncementRecord {
    stealth_x: String,
    stealth_y: String,
    ephemeral_x: String,
    ephemeral_y: String,
    view_tag: u8,
}

impl TryFrom<AnnouncementRecord> for StealthAnnouncement {
    type Error = StealthError;

    fn try_from(record: AnnouncementRecord) -> Result<Self> {
        let coordinate = |value: &str| parse_hex_biguint(value).ok_or(StealthError::InvalidPoint);
        Ok(Self {
            stealth_pubkey: public_key_from_coordinates(
                coordinate(&record.stealth_x)?,
                coordinate(&record.stealth_y)?,
            )?,
            ephemeral_pubkey: public_key_from_coordinates(
                coordinate(&record.ephemeral_x)?,
                coordinate(&record.ephemeral_y)?,
            )?,
            view_tag: record.view_tag,
        })
    }
}

impl From<StealthAnnouncement> for AnnouncementRecord {
    fn from(announcement: StealthAnnouncement) -> Self {
        let hex_of = |value: Option<&BigUint>| match value {
            Some(v) => format!("{:#066x}", v),
            None => "0x0".to_string(),
        };
        Self {
            stealth_x: hex_of(announcement.stealth_pubkey.x()),
            stealth_y: hex_of(announcement.stealth_pubkey.y()),
            ephemeral_x: hex_of(announcement.ephemeral_pubkey.x()),
            ephemeral_y: hex_of(announcement.ephemeral_pubkey.y()),
            view_tag: announcement.view_tag,
        }
    }
}

/// Parse an ephemeral key emitted as an event array.
///
/// Accepts `[x, y]` as full u256 words or the split form
/// `[x_low, x_high, y_low, y_high]`.
pub fn parse_ephemeral_pubkey(words: &[BigUint]) -> Result<Point> {
    match words {
        [x, y] => public_key_from_coordinates(x.clone(), y.clone()),
        [x_low, x_high, y_low, y_high] => {
            if [x_low, x_high, y_low, y_high].iter().any(|w| w.bits() > 128) {
                return Err(StealthError::InvalidPoint);
            }
            public_key_from_coordinates(x_low + (x_high << 128), y_low + (y_high << 128))
        }
        _ => Err(StealthError::InvalidPoint),
    }
}

// ============================================================================
// Stealth Address Computation (Sender Side)
// ============================================================================

/// Result of computing a stealth address (sender side)
pub struct StealthAddressComputation {
    pub announcement: StealthAnnouncement,
    /// Zeroized on drop; never needed after publication
    ephemeral_secret: SecretScalar,
}

impl StealthAddressComputation {
    pub fn ephemeral_secret(&self) -> &SecretScalar {
        &self.ephemeral_secret
    }

    /// Keep only the public announcement, discarding the ephemeral secret
    pub fn into_announcement(self) -> StealthAnnouncement {
        self.announcement
    }
}

/// Compute a one-time stealth public key for a recipient
pub fn generate_stealth_address(
    view_pubkey: &Point,
    spend_pubkey: &Point,
) -> Result<StealthAddressComputation> {
    generate_stealth_address_with_rng(&mut OsRng, view_pubkey, spend_pubkey)
}

pub fn generate_stealth_address_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    view_pubkey: &Point,
    spend_pubkey: &Point,
) -> Result<StealthAddressComputation> {
    let curve = secp256k1();
    let ephemeral = generate_keypair_with_rng(rng)?;

    let shared = shared_secret(&ephemeral.secret, view_pubkey)?;
    let tweak = curve.mul_generator(&shared.scalar())?;
    let stealth_pubkey = curve.add(spend_pubkey, &tweak)?;

    if stealth_pubkey.is_infinity() {
        return Err(StealthError::InvalidPoint);
    }

    Ok(StealthAddressComputation {
        announcement: StealthAnnouncement {
            stealth_pubkey,
            ephemeral_pubkey: ephemeral.public,
            view_tag: shared.view_tag(),
        },
        ephemeral_secret: ephemeral.secret,
    })
}

// ============================================================================
// Payment Scanning (Recipient Side)
// ============================================================================

/// Cheap filter: returns the reduced shared scalar when the view tag matches.
///
/// A match here is only a candidate; roughly 1 in 256 unrelated announcements
/// pass. Callers must finish with `recover_stealth_key` or an equivalent
/// full public-key comparison.
pub fn check_stealth_payment(
    view_secret: &SecretScalar,
    ephemeral_pubkey: &Point,
    view_tag: u8,
) -> Result<Option<BigUint>> {
    let shared = shared_secret(view_secret, ephemeral_pubkey)?;
    if shared.view_tag() != view_tag {
        return Ok(None);
    }
    Ok(Some(shared.scalar()))
}

/// p = (b + h) mod n, accepted only when p·G equals the expected stealth key
pub fn recover_stealth_key(
    spend_secret: &SecretScalar,
    shared_scalar: &BigUint,
    expected_stealth_pubkey: &Point,
) -> Result<SecretScalar> {
    let curve = secp256k1();
    let stealth_scalar = (spend_secret.to_biguint() + shared_scalar) % &curve.n;
    let secret = SecretScalar::from_biguint(&stealth_scalar)?;

    if !points_equal(&secret.public_point()?, expected_stealth_pubkey) {
        return Err(StealthError::KeyRecoveryMismatch);
    }
    Ok(secret)
}

/// Why an announcement did or did not belong to us
pub enum ScanOutcome {
    Match(SecretScalar),
    ViewTagMismatch,
    /// The tag matched but the derived key does not open the stealth key
    KeyMismatch,
}

impl ScanOutcome {
    pub fn into_key(self) -> Option<SecretScalar> {
        match self {
            ScanOutcome::Match(key) => Some(key),
            ScanOutcome::ViewTagMismatch | ScanOutcome::KeyMismatch => None,
        }
    }
}

/// Classify one announcement against a full key set
pub fn classify_announcement(
    keys: &StealthKeys,
    announcement: &StealthAnnouncement,
) -> Result<ScanOutcome> {
    let shared_scalar = match check_stealth_payment(
        keys.view_secret(),
        &announcement.ephemeral_pubkey,
        announcement.view_tag,
    )? {
        Some(scalar) => scalar,
        None => return Ok(ScanOutcome::ViewTagMismatch),
    };

    match recover_stealth_key(keys.spend_secret(), &shared_scalar, &announcement.stealth_pubkey) {
        Ok(key) => Ok(ScanOutcome::Match(key)),
        Err(StealthError::KeyRecoveryMismatch) => {
            warn!(view_tag = announcement.view_tag, "view tag matched but stealth key did not");
            Ok(ScanOutcome::KeyMismatch)
        }
        Err(e) => Err(e),
    }
}

/// Recover the one-time private key if the announcement is ours
pub fn scan_announcement(
    keys: &StealthKeys,
    announcement: &StealthAnnouncement,
) -> Result<Option<SecretScalar>> {
    Ok(classify_announcement(keys, announcement)?.into_key())
}

/// View-key-only check: (v, B) is enough to recognize a payment but not to spend it
pub fn check_announcement(
    view_secret: &SecretScalar,
    spend_pubkey: &Point,
    announcement: &StealthAnnouncement,
) -> Result<bool> {
    let curve = secp256k1();
    let shared_scalar = match check_stealth_payment(
        view_secret,
        &announcement.ephemeral_pubkey,
        announcement.view_tag,
    )? {
        Some(scalar) => scalar,
        None => return Ok(false),
    };

    let expected = curve.add(spend_pubkey, &curve.mul_generator(&shared_scalar)?)?;
    Ok(points_equal(&expected, &announcement.stealth_pubkey))
}

/// A recognized payment
pub struct DetectedPayment {
    pub index: usize,
    pub announcement: StealthAnnouncement,
    pub stealth_key: SecretScalar,
}

/// Outcome of scanning many announcements
#[derive(Default)]
pub struct ScanReport {
    pub payments: Vec<DetectedPayment>,
    pub scanned: usize,
    pub tag_rejections: usize,
    pub key_mismatches: usize,
}

/// Scan a batch.
///
/// Announcements are curve-checked when parsed, so any error here comes from
/// the key derivation itself and aborts the scan.
pub fn scan_announcements<'a, I>(keys: &StealthKeys, announcements: I) -> Result<ScanReport>
where
    I: IntoIterator<Item = &'a StealthAnnouncement>,
{
    let mut report = ScanReport::default();

    for (index, announcement) in announcements.into_iter().enumerate() {
        report.scanned += 1;
        match classify_announcement(keys, announcement)? {
            ScanOutcome::Match(stealth_key) => report.payments.push(DetectedPayment {
                index,
                announcement: announcement.clone(),
                stealth_key,
            }),
            ScanOutcome::ViewTagMismatch => report.tag_rejections += 1,
            ScanOutcome::KeyMismatch => report.key_mismatches += 1,
        }
    }

    debug!(
        scanned = report.scanned,
        found = report.payments.len(),
        "batch scan finished"
    );
    Ok(report)
}

/// Constant-time comparison of two points' encodings
fn points_equal(a: &Point, b: &Point) -> bool {
    match (a.to_bytes(), b.to_bytes()) {
        (Some(a), Some(b)) => bool::from(a.ct_eq(&b)),
        (None, None) => true,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
