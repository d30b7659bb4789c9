//! Deterministic contract addresses
//!
//! address = pedersen_chain(["STARKNET_CONTRACT_ADDRESS", deployer, salt,
//! class_hash, pedersen_chain(constructor_args)]) mod (2^251 - 256)
//!
//! A stealth account's address is fully determined by its secp256k1 public
//! key, so funds can be sent to it before the account is deployed.

use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::One;
use starknet_crypto::pedersen_hash;

use super::felt::{felt_from_biguint, felt_to_biguint, short_string, split_u256, Felt};
use crate::crypto::curve::Point;
use crate::error::{Result, StealthError};

const CONTRACT_ADDRESS_PREFIX: &str = "STARKNET_CONTRACT_ADDRESS";

/// Addresses live below 2^251 - 256
fn address_bound() -> &'static BigUint {
    static BOUND: OnceLock<BigUint> = OnceLock::new();
    BOUND.get_or_init(|| (BigUint::one() << 251) - 256u32)
}

/// Pedersen chain: h = 0; h = H(h, e) for each e; H(h, len)
pub fn compute_hash_on_elements(elements: &[Felt]) -> Felt {
    let folded = elements
        .iter()
        .fold(Felt::ZERO, |acc, element| pedersen_hash(&acc, element));
    pedersen_hash(&folded, &Felt::from(elements.len() as u64))
}

pub fn compute_address(
    class_hash: &Felt,
    salt: &Felt,
    constructor_args: &[Felt],
    deployer: &Felt,
) -> Result<Felt> {
    let prefix = short_string(CONTRACT_ADDRESS_PREFIX)?;
    let raw = compute_hash_on_elements(&[
        prefix,
        *deployer,
        *salt,
        *class_hash,
        compute_hash_on_elements(constructor_args),
    ]);
    felt_from_biguint(&(felt_to_biguint(&raw) % address_bound()))
}

/// Deployment inputs derived from a stealth public key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StealthAccountParams {
    /// P.x mod 2^251
    pub salt: Felt,
    /// [x_low, x_high, y_low, y_high]
    pub constructor_args: [Felt; 4],
}

impl StealthAccountParams {
    pub fn from_pubkey(stealth_pubkey: &Point) -> Result<Self> {
        let (x, y) = match stealth_pubkey {
            Point::Affine { x, y } => (x, y),
            Point::Infinity => return Err(StealthError::InvalidPoint),
        };

        let salt_mask = (BigUint::one() << 251) - 1u32;
        let (x_low, x_high) = split_u256(x)?;
        let (y_low, y_high) = split_u256(y)?;

        Ok(Self {
            salt: felt_from_biguint(&(x & salt_mask))?,
            constructor_args: [x_low, x_high, y_low, y_high],
        })
    }
}

/// Address of the stealth account contract owned by `stealth_pubkey`
pub fn stealth_account_address(
    stealth_pubkey: &Point,
    class_hash: &Felt,
    deployer: &Felt,
) -> Result<Felt> {
    let params = StealthAccountParams::from_pubkey(stealth_pubkey)?;
    compute_address(class_hash, &params.salt, &params.constructor_args, deployer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_keypair;
    use crate::starknet::felt::felt_from_hex;

    fn class_hash() -> Felt {
        felt_from_hex("0x03487cf5ae2106db423e02de50b934643c63d893f816966009c7270fb159256a").unwrap()
    }

    #[test]
    fn test_hash_on_empty_is_hash_of_zero_length() {
        assert_eq!(
            compute_hash_on_elements(&[]),
            pedersen_hash(&Felt::ZERO, &Felt::ZERO)
        );
    }

    #[test]
    fn test_address_is_deterministic_and_bounded() {
        let pair = generate_keypair().unwrap();
        let a = stealth_account_address(&pair.public, &class_hash(), &Felt::ZERO).unwrap();
        let b = stealth_account_address(&pair.public, &class_hash(), &Felt::ZERO).unwrap();
        assert_eq!(a, b);
        assert!(&felt_to_biguint(&a) < address_bound());
    }

    #[test]
    fn test_address_depends_on_every_input() {
        let pair = generate_keypair().unwrap();
        let params = StealthAccountParams::from_pubkey(&pair.public).unwrap();
        let base = compute_address(&class_hash(), &params.salt, &params.constructor_args, &Felt::ZERO)
            .unwrap();

        let other_salt = compute_address(
            &class_hash(),
            &(params.salt + Felt::from(1u8)),
            &params.constructor_args,
            &Felt::ZERO,
        )
        .unwrap();
        let other_deployer =
            compute_address(&class_hash(), &params.salt, &params.constructor_args, &Felt::from(1u8))
                .unwrap();
        let other_class =
            compute_address(&Felt::from(1u8), &params.salt, &params.constructor_args, &Felt::ZERO)
                .unwrap();

        assert_ne!(base, other_salt);
        assert_ne!(base, other_deployer);
        assert_ne!(base, other_class);

        for i in 0..params.constructor_args.len() {
            let mut args = params.constructor_args;
            args[i] = args[i] + Felt::from(1u8);
            let other_args =
                compute_address(&class_hash(), &params.salt, &args, &Felt::ZERO).unwrap();
            assert_ne!(base, other_args, "constructor arg {} ignored", i);
        }

        let mut swapped = params.constructor_args;
        swapped.swap(0, 2);
        let reordered = compute_address(&class_hash(), &params.salt, &swapped, &Felt::ZERO).unwrap();
        assert_ne!(base, reordered);
    }

    #[test]
    fn test_params_split_coordinates() {
        let pair = generate_keypair().unwrap();
        let params = StealthAccountParams::from_pubkey(&pair.public).unwrap();
        let x = pair.public.x().unwrap();

        let rejoined = crate::starknet::felt::join_u256(
            &params.constructor_args[0],
            &params.constructor_args[1],
        )
        .unwrap();
        assert_eq!(&rejoined, x);
        assert_eq!(felt_to_biguint(&params.salt), x % (BigUint::one() << 251));
        assert!(StealthAccountParams::from_pubkey(&Point::Infinity).is_err());
    }
}
