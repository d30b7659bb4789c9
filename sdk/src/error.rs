//! Error types for the stealth address protocol and the claim flow
//!
//! Claim failures are split along one line that callers care about:
//! either nothing reached the ledger (retry freely, re-reading the nonce),
//! or a transaction id exists and its status must be checked first.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, StealthError>;

#[derive(Debug, Error)]
pub enum StealthError {
    #[error("Invalid curve input: {0} has no inverse for the given modulus")]
    InvalidCurveInput(String),

    #[error("Invalid point - not on secp256k1 or point at infinity")]
    InvalidPoint,

    #[error("Invalid scalar - must be in [1, n)")]
    InvalidScalar,

    #[error("Invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("Invalid meta-address: {0}")]
    InvalidMetaAddress(String),

    #[error("Secure random source failed or kept producing out-of-range values")]
    InsecureRandomSource,

    #[error("View tag does not match")]
    ViewTagMismatch,

    #[error("Recovered private key does not match the expected stealth public key")]
    KeyRecoveryMismatch,

    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: String, required: String },

    #[error("Balance {balance} does not cover the reimbursement fee {fee}")]
    AmountBelowFee { balance: String, fee: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Verifier hint generation failed: {0}")]
    HintGeneration(String),

    #[error("Ledger read failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Transaction not included{}: {source}", tx_suffix(.tx_hash))]
    LedgerSubmissionFailed {
        tx_hash: Option<String>,
        #[source]
        source: LedgerError,
    },

    #[error("Transaction {tx_hash} reverted: {reason}")]
    TransactionReverted { tx_hash: String, reason: String },

    #[error("Transaction {tx_hash} not confirmed within {waited_secs}s - query its status before retrying")]
    ConfirmationTimeout { tx_hash: String, waited_secs: u64 },
}

fn tx_suffix(tx_hash: &Option<String>) -> String {
    match tx_hash {
        Some(hash) => format!(" ({})", hash),
        None => String::new(),
    }
}

impl StealthError {
    /// True when no transaction reached the ledger, so the claim can be
    /// rebuilt from a fresh nonce read without risking a double fee.
    pub fn is_retry_safe(&self) -> bool {
        match self {
            StealthError::LedgerSubmissionFailed { tx_hash, .. } => tx_hash.is_none(),
            StealthError::TransactionReverted { .. } | StealthError::ConfirmationTimeout { .. } => {
                false
            }
            StealthError::Ledger(_)
            | StealthError::InsufficientBalance { .. }
            | StealthError::AmountBelowFee { .. } => true,
            // Cryptographic failures are deterministic; retrying changes nothing.
            _ => false,
        }
    }

    /// Transaction id of a submitted transaction whose fate is not a clean
    /// "nothing happened".
    pub fn submitted_transaction(&self) -> Option<&str> {
        match self {
            StealthError::LedgerSubmissionFailed { tx_hash, .. } => tx_hash.as_deref(),
            StealthError::TransactionReverted { tx_hash, .. }
            | StealthError::ConfirmationTimeout { tx_hash, .. } => Some(tx_hash),
            _ => None,
        }
    }
}

/// Failures reported by a ledger collaborator
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}
