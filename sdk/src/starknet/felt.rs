//! Field-element helpers for the Starknet side of a claim
//!
//! Everything crossing into Starknet calldata is a felt (< P = 2^251 + 17·2^192 + 1).
//! 256-bit quantities travel as (low, high) 128-bit halves.

use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::One;

pub use starknet_crypto::Felt;

use crate::crypto::curve::to_be32;
use crate::crypto::keys::{keccak256, parse_hex_biguint};
use crate::error::{Result, StealthError};

const STARK_PRIME: &str = "800000000000011000000000000000000000000000000000000000000000001";

pub fn stark_prime() -> &'static BigUint {
    static PRIME: OnceLock<BigUint> = OnceLock::new();
    PRIME.get_or_init(|| BigUint::parse_bytes(STARK_PRIME.as_bytes(), 16).unwrap_or_default())
}

/// Convert an integer into a felt, rejecting values ≥ P
pub fn felt_from_biguint(value: &BigUint) -> Result<Felt> {
    if value >= stark_prime() {
        return Err(StealthError::InvalidFieldElement(format!(
            "{:#x} exceeds the field modulus",
            value
        )));
    }
    Ok(Felt::from_bytes_be(&to_be32(value)))
}

pub fn felt_to_biguint(felt: &Felt) -> BigUint {
    BigUint::from_bytes_be(&felt.to_bytes_be())
}

/// Parse `0x`-prefixed (or bare) hex into a felt
pub fn felt_from_hex(input: &str) -> Result<Felt> {
    let value = parse_hex_biguint(input)
        .ok_or_else(|| StealthError::InvalidFieldElement(input.trim().to_string()))?;
    felt_from_biguint(&value)
}

/// Minimal `0x` hex, e.g. `0x0` or `0x4718f5...`
pub fn felt_to_hex(felt: &Felt) -> String {
    format!("{:#x}", felt_to_biguint(felt))
}

/// Same as [`felt_to_hex`] but zero-padded to 64 digits
pub fn felt_to_padded_hex(felt: &Felt) -> String {
    format!("0x{}", hex::encode(felt.to_bytes_be()))
}

fn low_mask() -> BigUint {
    (BigUint::one() << 128) - 1u32
}

/// Split a u256 into (low, high) 128-bit felts
pub fn split_u256(value: &BigUint) -> Result<(Felt, Felt)> {
    if value.bits() > 256 {
        return Err(StealthError::InvalidFieldElement(format!(
            "{:#x} does not fit in u256",
            value
        )));
    }
    let low = value & low_mask();
    let high = value >> 128;
    Ok((felt_from_biguint(&low)?, felt_from_biguint(&high)?))
}

/// Inverse of [`split_u256`]; each half must fit in 128 bits
pub fn join_u256(low: &Felt, high: &Felt) -> Result<BigUint> {
    let low = felt_to_biguint(low);
    let high = felt_to_biguint(high);
    if low.bits() > 128 || high.bits() > 128 {
        return Err(StealthError::InvalidFieldElement(
            "u256 half exceeds 128 bits".to_string(),
        ));
    }
    Ok(low + (high << 128))
}

/// Entry-point selector: keccak256(name) truncated to 250 bits
pub fn selector_from_name(name: &str) -> Felt {
    let mut digest = keccak256(name.as_bytes());
    digest[0] &= 0x03;
    Felt::from_bytes_be(&digest)
}

/// Encode a short ASCII string (≤ 31 bytes) as a felt
pub fn short_string(value: &str) -> Result<Felt> {
    let bytes = value.as_bytes();
    if bytes.len() > 31 || !value.is_ascii() {
        return Err(StealthError::InvalidFieldElement(format!(
            "'{}' is not a short string",
            value
        )));
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(Felt::from_bytes_be(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let felt = felt_from_hex("0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d").unwrap();
        assert_eq!(
            felt_to_hex(&felt),
            "0x4718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d"
        );
        assert_eq!(felt_to_hex(&Felt::ZERO), "0x0");
        assert_eq!(felt_to_padded_hex(&Felt::from(1u8)).len(), 66);
    }

    #[test]
    fn test_rejects_out_of_field() {
        assert!(felt_from_biguint(stark_prime()).is_err());
        assert!(felt_from_biguint(&(stark_prime() - 1u32)).is_ok());
        assert!(felt_from_hex("not hex").is_err());
        assert!(felt_from_hex("").is_err());
    }

    #[test]
    fn test_u256_split_and_join() {
        let value = (BigUint::from(0xdeadu32) << 128) + BigUint::from(0xbeefu32);
        let (low, high) = split_u256(&value).unwrap();
        assert_eq!(low, Felt::from(0xbeefu32));
        assert_eq!(high, Felt::from(0xdeadu32));
        assert_eq!(join_u256(&low, &high).unwrap(), value);

        let max = (BigUint::one() << 256) - 1u32;
        let (low, high) = split_u256(&max).unwrap();
        assert_eq!(join_u256(&low, &high).unwrap(), max);

        assert!(split_u256(&(BigUint::one() << 256)).is_err());
    }

    #[test]
    fn test_join_rejects_wide_halves() {
        let wide = felt_from_biguint(&(BigUint::one() << 130)).unwrap();
        assert!(join_u256(&wide, &Felt::ZERO).is_err());
    }

    #[test]
    fn test_selector_known_values() {
        assert_eq!(
            felt_to_hex(&selector_from_name("transfer")),
            "0x83afd3f4caedc6eebf44246fe54e38c95e3179a5ec9ea81740eca5b482d12e"
        );
        assert!(felt_to_biguint(&selector_from_name("process_atomic_claim")).bits() <= 250);
    }

    #[test]
    fn test_short_string() {
        assert_eq!(short_string("A").unwrap(), Felt::from(0x41u8));
        assert!(short_string(&"x".repeat(32)).is_err());
    }
}
