//! Key material and shared-secret derivation
//!
//! Security:
//! - Secret scalars are zeroized on drop and never printed by `Debug`
//! - All randomness comes from the OS CSPRNG unless a caller injects one
//! - Public keys supplied from outside are validated here, once

use num_bigint::BigUint;
use num_traits::Zero;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use super::curve::{secp256k1, to_be32, Point};
use crate::error::{Result, StealthError};

/// Upper bound on rejection-sampling draws before the RNG is considered broken
pub const MAX_SAMPLING_ATTEMPTS: usize = 64;

// ============================================================================
// Zeroizing Scalar Wrapper
// ============================================================================

/// A scalar in [1, n) that zeroizes its big-endian bytes on drop
#[derive(Clone)]
pub struct SecretScalar {
    bytes: [u8; 32],
}

impl SecretScalar {
    /// Create from big-endian bytes; rejects 0 and values ≥ n
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        let value = BigUint::from_bytes_be(&bytes);
        let mut bytes = bytes;
        if value.is_zero() || value >= secp256k1().n {
            bytes.zeroize();
            return Err(StealthError::InvalidScalar);
        }
        Ok(Self { bytes })
    }

    pub fn from_biguint(value: &BigUint) -> Result<Self> {
        if value.bits() > 256 {
            return Err(StealthError::InvalidScalar);
        }
        Self::from_bytes(to_be32(value))
    }

    /// Parse a hex string, with or without a `0x` prefix
    pub fn from_hex(input: &str) -> Result<Self> {
        let value = parse_hex_biguint(input).ok_or(StealthError::InvalidScalar)?;
        Self::from_biguint(&value)
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.bytes)
    }

    /// Get the raw bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// k·G
    pub fn public_point(&self) -> Result<Point> {
        secp256k1().mul_generator(&self.to_biguint())
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretScalar(..)")
    }
}

// ============================================================================
// Key Pairs
// ============================================================================

/// A private scalar together with its public point
pub struct KeyPair {
    pub secret: SecretScalar,
    pub public: Point,
}

impl KeyPair {
    pub fn from_secret(secret: SecretScalar) -> Result<Self> {
        let public = secret.public_point()?;
        Ok(Self { secret, public })
    }
}

/// Generate a key pair from OS entropy
pub fn generate_keypair() -> Result<KeyPair> {
    generate_keypair_with_rng(&mut OsRng)
}

pub fn generate_keypair_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<KeyPair> {
    KeyPair::from_secret(random_scalar(rng)?)
}

/// Draw a uniform scalar in [1, n) by rejection sampling
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<SecretScalar> {
    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        let mut bytes = [0u8; 32];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|_| StealthError::InsecureRandomSource)?;

        match SecretScalar::from_bytes(bytes) {
            Ok(scalar) => {
                bytes.zeroize();
                return Ok(scalar);
            }
            Err(_) => bytes.zeroize(),
        }
    }
    Err(StealthError::InsecureRandomSource)
}

// ============================================================================
// Shared Secret
// ============================================================================

/// keccak256(x-coordinate of the Diffie-Hellman point)
///
/// The view tag is read from the unreduced digest; the scalar used for key
/// derivation is the same digest reduced mod n.
pub struct SharedSecret {
    digest: [u8; 32],
}

impl SharedSecret {
    /// First byte of the unreduced digest
    pub fn view_tag(&self) -> u8 {
        self.digest[0]
    }

    /// Digest interpreted big-endian, reduced mod n
    pub fn scalar(&self) -> BigUint {
        BigUint::from_bytes_be(&self.digest) % &secp256k1().n
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.digest.zeroize();
    }
}

/// Compute S = my_private·their_public and hash S.x
pub fn shared_secret(my_private: &SecretScalar, their_public: &Point) -> Result<SharedSecret> {
    let point = secp256k1().scalar_mul(&my_private.to_biguint(), their_public)?;
    let x = point.x().ok_or(StealthError::InvalidPoint)?;

    Ok(SharedSecret {
        digest: keccak256(&to_be32(x)),
    })
}

/// Shared secret reduced to a scalar mod n
pub fn shared_secret_scalar(my_private: &SecretScalar, their_public: &Point) -> Result<BigUint> {
    Ok(shared_secret(my_private, their_public)?.scalar())
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Validate and build a public key from affine coordinates
pub fn public_key_from_coordinates(x: BigUint, y: BigUint) -> Result<Point> {
    secp256k1().validate(x, y)
}

/// Parse `x || y` (64 bytes) or SEC1 uncompressed `0x04 || x || y` (65 bytes)
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<Point> {
    let body = match bytes.len() {
        64 => bytes,
        65 if bytes[0] == 0x04 => &bytes[1..],
        _ => return Err(StealthError::InvalidPoint),
    };
    public_key_from_coordinates(
        BigUint::from_bytes_be(&body[..32]),
        BigUint::from_bytes_be(&body[32..]),
    )
}

pub(crate) fn parse_hex_biguint(input: &str) -> Option<BigUint> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return None;
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_secret_scalar_range() {
        assert!(SecretScalar::from_bytes([0u8; 32]).is_err());
        assert!(SecretScalar::from_biguint(&secp256k1().n).is_err());
        assert!(SecretScalar::from_biguint(&(&secp256k1().n - 1u32)).is_ok());
        assert!(SecretScalar::from_hex("0x05").is_ok());
        assert!(SecretScalar::from_hex("").is_err());
        assert!(SecretScalar::from_hex("0xzz").is_err());
    }

    #[test]
    fn test_secret_scalar_hex_roundtrip() {
        let scalar = SecretScalar::from_hex("0xdeadbeef").unwrap();
        let again = SecretScalar::from_hex(&scalar.to_hex()).unwrap();
        assert_eq!(scalar.as_bytes(), again.as_bytes());
        assert_eq!(format!("{:?}", scalar), "SecretScalar(..)");
    }

    #[test]
    fn test_keypair_public_is_on_curve() {
        let pair = generate_keypair().unwrap();
        assert!(secp256k1().is_on_curve(&pair.public));
        assert_eq!(pair.secret.public_point().unwrap(), pair.public);
    }

    #[test]
    fn test_random_scalar_with_seeded_rng() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = random_scalar(&mut rng).unwrap();
        let b = random_scalar(&mut rng).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_shared_secret_symmetry() {
        let a = generate_keypair().unwrap();
        let b = generate_keypair().unwrap();

        let ab = shared_secret(&a.secret, &b.public).unwrap();
        let ba = shared_secret(&b.secret, &a.public).unwrap();

        assert_eq!(ab.digest(), ba.digest());
        assert_eq!(ab.view_tag(), ba.view_tag());
        assert_eq!(ab.scalar(), ba.scalar());
    }

    #[test]
    fn test_view_tag_is_first_unreduced_byte() {
        let a = generate_keypair().unwrap();
        let b = generate_keypair().unwrap();
        let secret = shared_secret(&a.secret, &b.public).unwrap();
        assert_eq!(secret.view_tag(), secret.digest()[0]);
        assert!(secret.scalar() < secp256k1().n);
    }

    #[test]
    fn test_public_key_from_bytes() {
        let pair = generate_keypair().unwrap();
        let raw = pair.public.to_bytes().unwrap();
        assert_eq!(public_key_from_bytes(&raw).unwrap(), pair.public);

        let mut sec1 = vec![0x04];
        sec1.extend_from_slice(&raw);
        assert_eq!(public_key_from_bytes(&sec1).unwrap(), pair.public);

        assert!(public_key_from_bytes(&raw[..63]).is_err());
        let mut corrupted = raw;
        corrupted[63] ^= 1;
        assert!(public_key_from_bytes(&corrupted).is_err());
    }
}
