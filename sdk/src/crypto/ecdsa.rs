//! Canonical (low-S) ECDSA over secp256k1
//!
//! Signatures carry the recovery bit plus the signer's public key and the
//! signed hash: the verifier-hint generator needs all five values.

use num_bigint::BigUint;
use num_traits::Zero;
use rand::{rngs::OsRng, CryptoRng, RngCore};

use super::curve::{mod_inverse, secp256k1, Point};
use super::keys::{random_scalar, SecretScalar, MAX_SAMPLING_ATTEMPTS};
use crate::error::{Result, StealthError};
use crate::starknet::felt::{split_u256, Felt};

/// (r, s, v) with s ≤ n/2, bundled with the message hash and public key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
    /// Parity of R.y, flipped when s was negated
    pub recovery_bit: u8,
    pub message_hash: BigUint,
    pub public_key: Point,
}

impl Signature {
    pub fn is_low_s(&self) -> bool {
        self.s <= half_order()
    }

    /// Check the signature against its own public key and hash
    pub fn verify(&self) -> Result<bool> {
        verify(&self.message_hash, &self.r, &self.s, &self.public_key)
    }

    /// Serialize through a verifier-hint strategy
    pub fn to_calldata(&self, hints: &dyn VerifierHintProvider) -> Result<Vec<Felt>> {
        hints.build_calldata(self)
    }
}

/// Outcome of one nonce draw
enum NonceAttempt {
    Signed(Signature),
    /// r or s came out zero; draw another nonce
    Resample,
}

/// Sign a message hash with a nonce from OS entropy
pub fn sign(message_hash: &BigUint, private_key: &SecretScalar) -> Result<Signature> {
    sign_with_rng(&mut OsRng, message_hash, private_key)
}

pub fn sign_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    message_hash: &BigUint,
    private_key: &SecretScalar,
) -> Result<Signature> {
    let public_key = private_key.public_point()?;

    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        let nonce = random_scalar(rng)?;
        match attempt(&nonce, message_hash, private_key, &public_key)? {
            NonceAttempt::Signed(signature) => return Ok(signature),
            NonceAttempt::Resample => continue,
        }
    }
    Err(StealthError::InsecureRandomSource)
}

fn attempt(
    nonce: &SecretScalar,
    message_hash: &BigUint,
    private_key: &SecretScalar,
    public_key: &Point,
) -> Result<NonceAttempt> {
    let curve = secp256k1();
    let n = &curve.n;
    let k = nonce.to_biguint();

    let big_r = curve.mul_generator(&k)?;
    let (rx, ry) = match &big_r {
        Point::Affine { x, y } => (x, y),
        Point::Infinity => return Ok(NonceAttempt::Resample),
    };

    let r = rx % n;
    if r.is_zero() {
        return Ok(NonceAttempt::Resample);
    }

    let z = message_hash % n;
    let d = private_key.to_biguint();
    let k_inv = mod_inverse(&k, n)?;
    let mut s = (k_inv * ((z + &r * d) % n)) % n;
    if s.is_zero() {
        return Ok(NonceAttempt::Resample);
    }

    let mut recovery_bit = u8::from(ry.bit(0));
    if s > half_order() {
        s = n - &s;
        recovery_bit = 1 - recovery_bit;
    }

    Ok(NonceAttempt::Signed(Signature {
        r,
        s,
        recovery_bit,
        message_hash: message_hash.clone(),
        public_key: public_key.clone(),
    }))
}

/// Standard ECDSA verification: (z·s⁻¹)·G + (r·s⁻¹)·Q has x ≡ r (mod n)
pub fn verify(message_hash: &BigUint, r: &BigUint, s: &BigUint, public_key: &Point) -> Result<bool> {
    let curve = secp256k1();
    let n = &curve.n;

    if r.is_zero() || s.is_zero() || r >= n || s >= n || public_key.is_infinity() {
        return Ok(false);
    }

    let w = mod_inverse(s, n)?;
    let u1 = ((message_hash % n) * &w) % n;
    let u2 = (r * &w) % n;

    let point = curve.add(&curve.mul_generator(&u1)?, &curve.scalar_mul(&u2, public_key)?)?;
    Ok(match point.x() {
        Some(x) => &(x % n) == r,
        None => false,
    })
}

fn half_order() -> BigUint {
    &secp256k1().n >> 1
}

// ============================================================================
// Verifier hints
// ============================================================================

/// Turns a signature into the auxiliary data an on-chain verifier consumes.
///
/// Implementations see (r, s, v, public key, message hash) and return an
/// opaque felt sequence that is appended to the claim calldata as-is.
pub trait VerifierHintProvider: Send + Sync {
    fn build_calldata(&self, signature: &Signature) -> Result<Vec<Felt>>;
}

/// u256 words only, no precomputed hints:
/// `[r_low, r_high, s_low, s_high, v, z_low, z_high]`
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainSignatureCalldata;

impl VerifierHintProvider for PlainSignatureCalldata {
    fn build_calldata(&self, signature: &Signature) -> Result<Vec<Felt>> {
        let (r_low, r_high) = split_u256(&signature.r)?;
        let (s_low, s_high) = split_u256(&signature.s)?;
        let (z_low, z_high) = split_u256(&signature.message_hash)?;
        Ok(vec![
            r_low,
            r_high,
            s_low,
            s_high,
            Felt::from(signature.recovery_bit),
            z_low,
            z_high,
        ])
    }
}

// ============================================================================
// Tests
// ============================================================================
