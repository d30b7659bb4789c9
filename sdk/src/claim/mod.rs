//! Atomic gasless claim
//!
//! A relayer pays for one multicall that (optionally) deploys the stealth
//! account and then runs `process_atomic_claim` on it. The account verifies
//! the secp256k1 signature over the claim message, transfers `amount` to the
//! recipient and `fee` to the relayer. Deploy and claim commit together or
//! not at all.
//!
//! Flow:
//! 1. Read balance, deployment status and application nonce
//! 2. Resolve the amount (explicit, or balance − fee for a sweep)
//! 3. Hash the claim message with the ledger-native hasher
//! 4. Sign the hash with the stealth key
//! 5. Build `[deployContract?, process_atomic_claim]`
//! 6. Submit through the relayer and wait for confirmation

pub mod ledger;

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use num_traits::Zero;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use tracing::{debug, info};

pub use ledger::{
    wait_for_confirmation, Call, Confirmation, Ledger, ResourceBound, ResourceBounds, TxStatus,
};

use crate::crypto::curve::Point;
use crate::crypto::ecdsa::{sign_with_rng, PlainSignatureCalldata, Signature, VerifierHintProvider};
use crate::crypto::keys::SecretScalar;
use crate::error::{Result, StealthError};
use crate::starknet::address::{compute_address, StealthAccountParams};
use crate::starknet::felt::{felt_to_biguint, felt_to_hex, selector_from_name, split_u256, Felt};
use crate::starknet::hash::{FieldHasher, PoseidonHasher};

/// Stealth account class on Sepolia
pub const SEPOLIA_ACCOUNT_CLASS_HASH: &str =
    "0x03487cf5ae2106db423e02de50b934643c63d893f816966009c7270fb159256a";
/// STRK ERC-20
pub const STRK_TOKEN: &str = "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d";
/// Universal deployer contract
pub const UDC_ADDRESS: &str = "0x041a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf";
/// 0.01 STRK
pub const DEFAULT_REIMBURSEMENT_FEE: u64 = 10_000_000_000_000_000;

/// Everything the claim flow needs to know about the network it runs on
#[derive(Clone, Debug)]
pub struct ClaimConfig {
    pub account_class_hash: Felt,
    pub token: Felt,
    /// Contract that executes `deployContract`
    pub deployer_contract: Felt,
    /// Deployer id folded into the address hash (0 for non-unique deploys)
    pub deployer_id: Felt,
    /// Paid to the relayer out of the claimed balance
    pub reimbursement_fee: BigUint,
    /// Relayer account that pays the transaction fee
    pub fee_payer: Felt,
    pub resource_bounds: ResourceBounds,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl ClaimConfig {
    /// Sepolia deployment with STRK as the claimed token
    pub fn sepolia(fee_payer: Felt) -> Self {
        Self {
            account_class_hash: Felt::from_hex_unchecked(SEPOLIA_ACCOUNT_CLASS_HASH),
            token: Felt::from_hex_unchecked(STRK_TOKEN),
            deployer_contract: Felt::from_hex_unchecked(UDC_ADDRESS),
            deployer_id: Felt::ZERO,
            reimbursement_fee: BigUint::from(DEFAULT_REIMBURSEMENT_FEE),
            fee_payer,
            resource_bounds: ResourceBounds::default(),
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// How much to claim
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimAmount {
    Exact(BigUint),
    /// Whole balance minus the reimbursement fee
    SweepAll,
}

impl ClaimAmount {
    /// Zero means "sweep all"
    pub fn from_requested(requested: BigUint) -> Self {
        if requested.is_zero() {
            ClaimAmount::SweepAll
        } else {
            ClaimAmount::Exact(requested)
        }
    }
}

/// Decide the transfer amount given the current balance and fee
pub fn resolve_amount(amount: &ClaimAmount, balance: &BigUint, fee: &BigUint) -> Result<BigUint> {
    match amount {
        ClaimAmount::SweepAll => {
            if balance <= fee {
                return Err(StealthError::AmountBelowFee {
                    balance: balance.to_string(),
                    fee: fee.to_string(),
                });
            }
            Ok(balance - fee)
        }
        ClaimAmount::Exact(requested) => {
            if requested.is_zero() {
                return Err(StealthError::InvalidAmount("requested amount is zero".to_string()));
            }
            let required = requested + fee;
            if balance.is_zero() || &required > balance {
                return Err(StealthError::InsufficientBalance {
                    balance: balance.to_string(),
                    required: required.to_string(),
                });
            }
            Ok(requested.clone())
        }
    }
}

/// The exact tuple the account contract hashes and checks the signature over
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimMessage {
    pub recipient: Felt,
    pub amount: BigUint,
    pub fee: BigUint,
    pub token: Felt,
    pub nonce: Felt,
}

impl ClaimMessage {
    /// `[recipient, amount_low, amount_high, fee_low, fee_high, token, nonce]`
    pub fn to_fields(&self) -> Result<Vec<Felt>> {
        let (amount_low, amount_high) = split_u256(&self.amount)?;
        let (fee_low, fee_high) = split_u256(&self.fee)?;
        Ok(vec![
            self.recipient,
            amount_low,
            amount_high,
            fee_low,
            fee_high,
            self.token,
            self.nonce,
        ])
    }

    pub fn hash(&self, hasher: &dyn FieldHasher) -> Result<Felt> {
        Ok(hasher.hash_many(&self.to_fields()?))
    }
}

/// What the ledger says about a stealth account right now
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountState {
    pub deployed: bool,
    /// Application nonce; 0 while undeployed
    pub nonce: Felt,
    pub balance: BigUint,
}

/// A fully built claim, ready for submission
#[derive(Clone, Debug)]
pub struct SignedClaim {
    pub stealth_address: Felt,
    pub message: ClaimMessage,
    pub message_hash: Felt,
    pub signature: Signature,
    /// Deploy call (if undeployed) followed by the claim call
    pub calls: Vec<Call>,
}

impl SignedClaim {
    pub fn includes_deploy(&self) -> bool {
        self.calls.len() > 1
    }
}

/// Input to [`ClaimProtocol::gasless_claim`]
#[derive(Clone, Debug)]
pub struct ClaimRequest {
    pub recipient: Felt,
    pub amount: ClaimAmount,
    /// When set, the key must own exactly this stealth public key
    pub expected_stealth_pubkey: Option<Point>,
}

/// A confirmed claim
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub tx_hash: Felt,
    pub stealth_address: Felt,
    pub amount: BigUint,
    pub fee: BigUint,
    pub deployed_account: bool,
}

/// Builds, signs and submits claims for one network configuration
pub struct ClaimProtocol {
    config: ClaimConfig,
    hasher: Arc<dyn FieldHasher>,
    hints: Arc<dyn VerifierHintProvider>,
}

impl ClaimProtocol {
    /// Poseidon message hash and plain u256 signature calldata
    pub fn new(config: ClaimConfig) -> Self {
        Self::with_collaborators(config, Arc::new(PoseidonHasher), Arc::new(PlainSignatureCalldata))
    }

    pub fn with_collaborators(
        config: ClaimConfig,
        hasher: Arc<dyn FieldHasher>,
        hints: Arc<dyn VerifierHintProvider>,
    ) -> Self {
        Self {
            config,
            hasher,
            hints,
        }
    }

    pub fn config(&self) -> &ClaimConfig {
        &self.config
    }

    /// Predicted account address for a stealth public key
    pub fn stealth_address(&self, stealth_pubkey: &Point) -> Result<Felt> {
        let params = StealthAccountParams::from_pubkey(stealth_pubkey)?;
        self.address_of(&params)
    }

    fn address_of(&self, params: &StealthAccountParams) -> Result<Felt> {
        compute_address(
            &self.config.account_class_hash,
            &params.salt,
            &params.constructor_args,
            &self.config.deployer_id,
        )
    }

    /// Read balance, deployment status and nonce for an account
    pub async fn read_account_state(&self, ledger: &dyn Ledger, account: Felt) -> Result<AccountState> {
        let balance = ledger.get_balance(self.config.token, account).await?;
        let deployed = ledger.is_deployed(account).await?;
        let nonce = if deployed {
            ledger.get_storage_at(account, selector_from_name("nonce")).await?
        } else {
            Felt::ZERO
        };

        debug!(
            account = %felt_to_hex(&account),
            %balance,
            deployed,
            nonce = %felt_to_hex(&nonce),
            "read account state"
        );
        Ok(AccountState {
            deployed,
            nonce,
            balance,
        })
    }

    /// Sign a claim for an already-resolved amount
    pub fn build_and_sign_claim(
        &self,
        stealth_key: &SecretScalar,
        recipient: Felt,
        amount: BigUint,
        state: &AccountState,
    ) -> Result<SignedClaim> {
        self.build_and_sign_claim_with_rng(&mut OsRng, stealth_key, recipient, amount, state)
    }

    pub fn build_and_sign_claim_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        stealth_key: &SecretScalar,
        recipient: Felt,
        amount: BigUint,
        state: &AccountState,
    ) -> Result<SignedClaim> {
        if amount.is_zero() {
            return Err(StealthError::InvalidAmount("claim amount is zero".to_string()));
        }

        let stealth_pubkey = stealth_key.public_point()?;
        let params = StealthAccountParams::from_pubkey(&stealth_pubkey)?;
        let stealth_address = self.address_of(&params)?;

        let message = ClaimMessage {
            recipient,
            amount,
            fee: self.config.reimbursement_fee.clone(),
            token: self.config.token,
            nonce: state.nonce,
        };
        let message_hash = message.hash(self.hasher.as_ref())?;
        let signature = sign_with_rng(rng, &felt_to_biguint(&message_hash), stealth_key)?;
        let signature_calldata = signature.to_calldata(self.hints.as_ref())?;

        let mut calls = Vec::with_capacity(2);
        if !state.deployed {
            calls.push(self.deploy_call(&params));
        }
        calls.push(claim_call(stealth_address, &signature_calldata, &message)?);

        debug!(
            account = %felt_to_hex(&stealth_address),
            hash = %felt_to_hex(&message_hash),
            calls = calls.len(),
            "claim signed"
        );
        Ok(SignedClaim {
            stealth_address,
            message,
            message_hash,
            signature,
            calls,
        })
    }

    fn deploy_call(&self, params: &StealthAccountParams) -> Call {
        let mut calldata = vec![
            self.config.account_class_hash,
            params.salt,
            Felt::ZERO,
            Felt::from(params.constructor_args.len() as u64),
        ];
        calldata.extend_from_slice(&params.constructor_args);
        Call {
            to: self.config.deployer_contract,
            selector: selector_from_name("deployContract"),
            calldata,
        }
    }

    /// Run the whole claim: read, sign, submit, confirm.
    ///
    /// Nothing here serializes concurrent claims for the same account; a
    /// stale nonce is rejected by the account contract.
    pub async fn gasless_claim(
        &self,
        ledger: &dyn Ledger,
        stealth_key: &SecretScalar,
        request: &ClaimRequest,
    ) -> Result<ClaimReceipt> {
        let stealth_pubkey = stealth_key.public_point()?;
        if let Some(expected) = &request.expected_stealth_pubkey {
            if expected != &stealth_pubkey {
                return Err(StealthError::KeyRecoveryMismatch);
            }
        }

        let stealth_address = self.stealth_address(&stealth_pubkey)?;
        let state = self.read_account_state(ledger, stealth_address).await?;
        let amount = resolve_amount(&request.amount, &state.balance, &self.config.reimbursement_fee)?;

        let claim = self.build_and_sign_claim(stealth_key, request.recipient, amount, &state)?;

        let tx_hash = ledger
            .submit_transaction(&claim.calls, self.config.fee_payer, &self.config.resource_bounds)
            .await
            .map_err(|source| StealthError::LedgerSubmissionFailed {
                tx_hash: None,
                source,
            })?;
        let tx_hex = felt_to_hex(&tx_hash);
        info!(tx = %tx_hex, account = %felt_to_hex(&stealth_address), "claim submitted");

        let outcome = wait_for_confirmation(
            ledger,
            tx_hash,
            self.config.confirmation_timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(|source| StealthError::LedgerSubmissionFailed {
            tx_hash: Some(tx_hex.clone()),
            source,
        })?;

        match outcome {
            Confirmation::Accepted => {
                info!(tx = %tx_hex, amount = %claim.message.amount, "claim confirmed");
                Ok(ClaimReceipt {
                    tx_hash,
                    stealth_address,
                    amount: claim.message.amount.clone(),
                    fee: claim.message.fee.clone(),
                    deployed_account: claim.includes_deploy(),
                })
            }
            Confirmation::Reverted(reason) => Err(StealthError::TransactionReverted {
                tx_hash: tx_hex,
                reason,
            }),
            Confirmation::TimedOut => Err(StealthError::ConfirmationTimeout {
                tx_hash: tx_hex,
                waited_secs: self.config.confirmation_timeout.as_secs(),
            }),
        }
    }
}

/// `process_atomic_claim(sig_len, sig..., token, recipient, amount_low,
/// amount_high, fee_low, fee_high)` on the stealth account
fn claim_call(stealth_address: Felt, signature: &[Felt], message: &ClaimMessage) -> Result<Call> {
    let (amount_low, amount_high) = split_u256(&message.amount)?;
    let (fee_low, fee_high) = split_u256(&message.fee)?;

    let mut calldata = Vec::with_capacity(signature.len() + 7);
    calldata.push(Felt::from(signature.len() as u64));
    calldata.extend_from_slice(signature);
    calldata.extend_from_slice(&[
        message.token,
        message.recipient,
        amount_low,
        amount_high,
        fee_low,
        fee_high,
    ]);

    Ok(Call {
        to: stealth_address,
        selector: selector_from_name("process_atomic_claim"),
        calldata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_keypair;

    fn fee() -> BigUint {
        BigUint::from(DEFAULT_REIMBURSEMENT_FEE)
    }

    #[test]
    fn test_sweep_subtracts_fee() {
        let balance = BigUint::from(5u32) * fee();
        let amount = resolve_amount(&ClaimAmount::SweepAll, &balance, &fee()).unwrap();
        assert_eq!(amount, BigUint::from(4u32) * fee());
    }

    #[test]
    fn test_sweep_at_exactly_fee_is_rejected() {
        let err = resolve_amount(&ClaimAmount::SweepAll, &fee(), &fee());
        assert!(matches!(err, Err(StealthError::AmountBelowFee { .. })));

        let err = resolve_amount(&ClaimAmount::SweepAll, &BigUint::zero(), &fee());
        assert!(matches!(err, Err(StealthError::AmountBelowFee { .. })));
    }

    #[test]
    fn test_exact_amount_checks_balance() {
        let balance = BigUint::from(3u32) * fee();
        let ok = resolve_amount(&ClaimAmount::Exact(fee()), &balance, &fee()).unwrap();
        assert_eq!(ok, fee());

        // amount + fee == balance is allowed
        let edge = BigUint::from(2u32) * fee();
        assert!(resolve_amount(&ClaimAmount::Exact(edge), &balance, &fee()).is_ok());

        let too_much = BigUint::from(3u32) * fee();
        assert!(matches!(
            resolve_amount(&ClaimAmount::Exact(too_much), &balance, &fee()),
            Err(StealthError::InsufficientBalance { .. })
        ));

        assert!(matches!(
            resolve_amount(&ClaimAmount::Exact(fee()), &BigUint::zero(), &fee()),
            Err(StealthError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_zero_request_means_sweep() {
        assert_eq!(ClaimAmount::from_requested(BigUint::zero()), ClaimAmount::SweepAll);
        assert_eq!(
            ClaimAmount::from_requested(BigUint::from(7u32)),
            ClaimAmount::Exact(BigUint::from(7u32))
        );
    }

    #[test]
    fn test_message_field_order() {
        let message = ClaimMessage {
            recipient: Felt::from(0xaau8),
            amount: (BigUint::from(2u32) << 128) + 1u32,
            fee: BigUint::from(3u32),
            token: Felt::from(0xbbu8),
            nonce: Felt::from(9u8),
        };
        assert_eq!(
            message.to_fields().unwrap(),
            vec![
                Felt::from(0xaau8),
                Felt::from(1u8),
                Felt::from(2u8),
                Felt::from(3u8),
                Felt::ZERO,
                Felt::from(0xbbu8),
                Felt::from(9u8),
            ]
        );
    }

    #[test]
    fn test_nonce_changes_message_hash() {
        let mut message = ClaimMessage {
            recipient: Felt::from(1u8),
            amount: BigUint::from(100u32),
            fee: fee(),
            token: Felt::from(2u8),
            nonce: Felt::ZERO,
        };
        let first = message.hash(&PoseidonHasher).unwrap();
        message.nonce = Felt::from(1u8);
        assert_ne!(first, message.hash(&PoseidonHasher).unwrap());
    }

    #[test]
    fn test_undeployed_claim_prepends_deploy() {
        let protocol = ClaimProtocol::new(ClaimConfig::sepolia(Felt::from(0x5u8)));
        let key = generate_keypair().unwrap();
        let state = AccountState {
            deployed: false,
            nonce: Felt::ZERO,
            balance: BigUint::from(10u32) * fee(),
        };

        let claim = protocol
            .build_and_sign_claim(&key.secret, Felt::from(0x77u8), fee(), &state)
            .unwrap();

        assert!(claim.includes_deploy());
        let deploy = &claim.calls[0];
        assert_eq!(deploy.to, protocol.config().deployer_contract);
        assert_eq!(deploy.selector, selector_from_name("deployContract"));
        assert_eq!(deploy.calldata.len(), 8);
        assert_eq!(deploy.calldata[2], Felt::ZERO);
        assert_eq!(deploy.calldata[3], Felt::from(4u8));

        let exec = &claim.calls[1];
        assert_eq!(exec.to, claim.stealth_address);
        assert_eq!(exec.selector, selector_from_name("process_atomic_claim"));
        assert_eq!(exec.calldata[0], Felt::from(7u8));
        assert_eq!(exec.calldata.len(), 1 + 7 + 6);
        assert_eq!(exec.calldata[8], protocol.config().token);
        assert_eq!(exec.calldata[9], Felt::from(0x77u8));

        assert_eq!(claim.stealth_address, protocol.stealth_address(&key.public).unwrap());
        assert!(claim.signature.verify().unwrap());
        assert_eq!(felt_to_biguint(&claim.message_hash), claim.signature.message_hash);
    }

    #[test]
    fn test_deployed_claim_has_single_call() {
        let protocol = ClaimProtocol::new(ClaimConfig::sepolia(Felt::from(0x5u8)));
        let key = generate_keypair().unwrap();
        let state = AccountState {
            deployed: true,
            nonce: Felt::from(3u8),
            balance: BigUint::from(10u32) * fee(),
        };

        let claim = protocol
            .build_and_sign_claim(&key.secret, Felt::from(0x77u8), fee(), &state)
            .unwrap();
        assert_eq!(claim.calls.len(), 1);
        assert_eq!(claim.message.nonce, Felt::from(3u8));
    }

    #[test]
    fn test_zero_amount_is_never_signed() {
        let protocol = ClaimProtocol::new(ClaimConfig::sepolia(Felt::ZERO));
        let key = generate_keypair().unwrap();
        let state = AccountState {
            deployed: true,
            nonce: Felt::ZERO,
            balance: fee(),
        };
        let err = protocol.build_and_sign_claim(&key.secret, Felt::from(1u8), BigUint::zero(), &state);
        assert!(matches!(err, Err(StealthError::InvalidAmount(_))));
    }
}
