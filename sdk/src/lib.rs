//! StealthFlow - dual-key stealth addresses on secp256k1 with gasless Starknet claims
//!
//! A sender derives a one-time account for a recipient from the recipient's
//! view and spend public keys. The recipient scans announcements with the
//! view key, recovers the one-time private key with the spend key, and signs
//! a claim that a relayer submits atomically together with the account
//! deployment.

pub mod claim;
pub mod crypto;
pub mod error;
pub mod starknet;


#[cfg(test)]
mod test_vectors;



pub use claim::{
    resolve_amount, AccountState, ClaimAmount, ClaimConfig, ClaimMessage, ClaimProtocol,
    ClaimReceipt, ClaimRequest, SignedClaim,
};
pub use crypto::{
    check_announcement, generate_stealth_address, scan_announcement, scan_announcements, sign,
    MetaAddress, Point, SecretScalar, Signature, StealthAnnouncement, StealthKeys,
};
pub use error::{LedgerError, Result, StealthError};
pub use starknet::{compute_address, stealth_account_address, Felt};
