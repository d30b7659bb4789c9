//! Claim message hashing
//!
//! The account contract recomputes the same hash on-chain, so the hasher is a
//! seam: swap it out only together with the contract.

use starknet_crypto::poseidon_hash_many;

use super::felt::Felt;

/// Field-native hash over a felt sequence
pub trait FieldHasher: Send + Sync {
    fn hash_many(&self, elements: &[Felt]) -> Felt;
}

/// Poseidon, as used by the stealth account contract
#[derive(Clone, Copy, Debug, Default)]
pub struct PoseidonHasher;

impl FieldHasher for PoseidonHasher {
    fn hash_many(&self, elements: &[Felt]) -> Felt {
        poseidon_hash_many(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poseidon_is_order_sensitive() {
        let hasher = PoseidonHasher;
        let a = hasher.hash_many(&[Felt::from(1u8), Felt::from(2u8)]);
        let b = hasher.hash_many(&[Felt::from(2u8), Felt::from(1u8)]);
        assert_ne!(a, b);
        assert_eq!(a, hasher.hash_many(&[Felt::from(1u8), Felt::from(2u8)]));
    }

    #[test]
    fn test_poseidon_distinguishes_length() {
        let hasher = PoseidonHasher;
        assert_ne!(
            hasher.hash_many(&[Felt::ZERO]),
            hasher.hash_many(&[Felt::ZERO, Felt::ZERO])
        );
    }
}
