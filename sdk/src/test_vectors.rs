//! Known-answer tests
//!
//! Fixed secp256k1 multiples, keccak digests, Pedersen outputs and a contract
//! address that any correct implementation reproduces, plus a fully
//! deterministic stealth payment with view secret 3 and spend secret 5.

#[cfg(test)]
#[allow(non_snake_case)] // Curve notation: G, V, B, R, P
mod known_answers {
    use num_bigint::BigUint;

    use crate::crypto::{
        check_stealth_payment, keccak256, recover_stealth_key, scan_announcement, secp256k1,
        shared_secret, Point, SecretScalar, StealthAnnouncement, StealthKeys,
    };
    use crate::starknet::{compute_address, felt_from_hex, felt_to_hex, selector_from_name, Felt};
    use starknet_crypto::pedersen_hash;

    fn big_hex(s: &str) -> BigUint {
        BigUint::parse_bytes(s.as_bytes(), 16).unwrap()
    }

    fn scalar(k: u32) -> SecretScalar {
        SecretScalar::from_biguint(&BigUint::from(k)).unwrap()
    }

    /// Vector 1: 2G and 3G
    #[test]
    fn test_vector_small_multiples() {
        let curve = secp256k1();

        let two_g = curve.mul_generator(&BigUint::from(2u32)).unwrap();
        assert_eq!(
            two_g,
            Point::affine(
                big_hex("C6047F9441ED7D6D3045406E95C07CD85C778E4B8CEF3CA7ABAC09B95C709EE5"),
                big_hex("1AE168FEA63DC339A3C58419466CEAEEF7F632653266D0E1236431A950CFE52A"),
            )
        );

        let three_g = curve.mul_generator(&BigUint::from(3u32)).unwrap();
        assert_eq!(
            three_g,
            Point::affine(
                big_hex("F9308A019258C31049344F85F89D5229B531C845836F99B08601F113BCE036F9"),
                big_hex("388F7B0F632DE8140FE337E62A37F3566500A99934C2231B6CB9FD7584B8E672"),
            )
        );

        assert_eq!(curve.add(&two_g, curve.generator()).unwrap(), three_g);
    }

    /// Vector 2: keccak-256, not SHA3-256
    #[test]
    fn test_vector_keccak() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            hex::encode(keccak256(b"abc")),
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
    }

    /// Vector 3: Pedersen hash primitive behind contract addresses
    #[test]
    fn test_vector_pedersen() {
        let a = felt_from_hex("0x3d937c035c878245caf64531a5756109c53068da139362728feb561405371cb").unwrap();
        let b = felt_from_hex("0x208a0a10250e382e1e4bbe2880906c2791bf6275695e02fbbc6aeff9cd8b31a").unwrap();
        assert_eq!(
            felt_to_hex(&pedersen_hash(&a, &b)),
            "0x30e480bed5fe53fa909cc0f8c4d99b8f9f2c016be4c41e13a4848797979c662"
        );
    }

    /// Vector 4: entry-point selector
    #[test]
    fn test_vector_selector() {
        assert_eq!(
            felt_to_hex(&selector_from_name("transfer")),
            "0x83afd3f4caedc6eebf44246fe54e38c95e3179a5ec9ea81740eca5b482d12e"
        );
    }

    /// Vector 5: deterministic payment, v = 3, b = 5, r = 7
    #[test]
    fn test_vector_deterministic_payment() {
        let curve = secp256k1();
        let keys = StealthKeys::from_secrets(scalar(3), scalar(5)).unwrap();

        // V = 3G, B = 5G = 2G + 3G
        let V = curve.mul_generator(&BigUint::from(3u32)).unwrap();
        let B = curve
            .add(
                &curve.mul_generator(&BigUint::from(2u32)).unwrap(),
                &V,
            )
            .unwrap();
        assert_eq!(keys.view_pubkey, V);
        assert_eq!(keys.spend_pubkey, B);

        // Sender: R = 7G, h = keccak(x(7·V)) mod n
        let r = scalar(7);
        let R = r.public_point().unwrap();
        let sender_shared = shared_secret(&r, &V).unwrap();

        // 7·(3G) == 3·(7G) == 21G
        let expected_x = curve.mul_generator(&BigUint::from(21u32)).unwrap();
        let mut x_bytes = [0u8; 32];
        let raw = expected_x.x().unwrap().to_bytes_be();
        x_bytes[32 - raw.len()..].copy_from_slice(&raw);
        assert_eq!(sender_shared.digest(), &keccak256(&x_bytes));

        let h = sender_shared.scalar();
        let P = curve.add(&B, &curve.mul_generator(&h).unwrap()).unwrap();

        let announcement = StealthAnnouncement {
            stealth_pubkey: P.clone(),
            ephemeral_pubkey: R,
            view_tag: sender_shared.view_tag(),
        };

        // Recipient side agrees on h and recovers p = 5 + h
        let candidate = check_stealth_payment(
            keys.view_secret(),
            &announcement.ephemeral_pubkey,
            announcement.view_tag,
        )
        .unwrap()
        .expect("view tag should match");
        assert_eq!(candidate, h);

        let p = recover_stealth_key(keys.spend_secret(), &candidate, &P).unwrap();
        assert_eq!(p.to_biguint(), (BigUint::from(5u32) + &h) % &curve.n);
        assert_ne!(p.to_biguint(), BigUint::from(5u32));

        let scanned = scan_announcement(&keys, &announcement).unwrap().unwrap();
        assert_eq!(scanned.as_bytes(), p.as_bytes());
    }

    /// Vector 6: contract address as the sequencer derives it
    /// (salt, class hash, calldata [1], deployer 0)
    #[test]
    fn test_vector_contract_address() {
        let address = compute_address(
            &felt_from_hex("0x0750cd490a7cd1572411169eaa8be292325990d33c5d4733655fe6b926985062")
                .unwrap(),
            &felt_from_hex("0x0018a7a329d1d85b621350f2b5fc9c64b2e57dfe708525f0aff2c90de1e5b9c8")
                .unwrap(),
            &[Felt::from(1u8)],
            &Felt::ZERO,
        )
        .unwrap();

        assert_eq!(
            felt_to_hex(&address),
            "0xda27ef7c3869c3a6cc6a0f7bf07a51c3e590825adba8a51cae27d815839eec"
        );
    }

    /// Vector 7: meta-address text form
    #[test]
    fn test_vector_meta_address_encoding() {
        let keys = StealthKeys::from_secrets(scalar(3), scalar(5)).unwrap();
        let text = keys.meta_address().to_string();

        assert!(text.starts_with("st:starknet:0xf9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9"));
        assert_eq!(text.len(), "st:starknet:0x".len() + 256);
    }
}
