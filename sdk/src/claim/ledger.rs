//! The ledger the claim flow talks to
//!
//! Reads (balance, deployment, storage) are idempotent. Submission is not:
//! once `submit_transaction` returns a hash, that transaction may land even
//! if every later call fails.

use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;
use crate::starknet::felt::{felt_to_hex, Felt};

/// A single contract invocation inside a multicall
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub to: Felt,
    pub selector: Felt,
    pub calldata: Vec<Felt>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBound {
    pub max_amount: u64,
    pub max_price_per_unit: u128,
}

/// Per-resource fee limits attached to a v3 transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBounds {
    pub l1_gas: ResourceBound,
    pub l2_gas: ResourceBound,
    pub l1_data_gas: ResourceBound,
}

impl Default for ResourceBounds {
    fn default() -> Self {
        Self {
            l1_gas: ResourceBound {
                max_amount: 5_000,
                max_price_per_unit: 200_000_000_000_000,
            },
            l2_gas: ResourceBound {
                max_amount: 30_000_000,
                max_price_per_unit: 10_000_000_000,
            },
            l1_data_gas: ResourceBound {
                max_amount: 50_000,
                max_price_per_unit: 200_000_000_000_000,
            },
        }
    }
}

/// Lifecycle of a submitted transaction as reported by the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// Received, not yet final
    Pending,
    /// Executed successfully
    Accepted,
    /// Included but execution reverted; fees were still charged
    Reverted(String),
    /// Dropped before inclusion
    Rejected(String),
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// ERC-20 `balanceOf(account)` for `token`
    async fn get_balance(&self, token: Felt, account: Felt) -> Result<BigUint, LedgerError>;

    /// Whether a contract class is deployed at `account`
    async fn is_deployed(&self, account: Felt) -> Result<bool, LedgerError>;

    async fn get_storage_at(&self, account: Felt, key: Felt) -> Result<Felt, LedgerError>;

    /// Submit a multicall paid for by `fee_payer`; returns the transaction hash
    async fn submit_transaction(
        &self,
        calls: &[Call],
        fee_payer: Felt,
        bounds: &ResourceBounds,
    ) -> Result<Felt, LedgerError>;

    async fn transaction_status(&self, tx_hash: Felt) -> Result<TxStatus, LedgerError>;
}

/// Final word on a submitted transaction within the wait window
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Reverted(String),
    /// Still pending when the window closed
    TimedOut,
}

/// Poll `transaction_status` until it is final or `timeout` elapses
pub async fn wait_for_confirmation(
    ledger: &dyn Ledger,
    tx_hash: Felt,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Confirmation, LedgerError> {
    match tokio::time::timeout(timeout, poll_until_final(ledger, tx_hash, poll_interval)).await {
        Ok(result) => result,
        Err(_) => Ok(Confirmation::TimedOut),
    }
}

async fn poll_until_final(
    ledger: &dyn Ledger,
    tx_hash: Felt,
    poll_interval: Duration,
) -> Result<Confirmation, LedgerError> {
    loop {
        match ledger.transaction_status(tx_hash).await? {
            TxStatus::Pending => {
                debug!(tx = %felt_to_hex(&tx_hash), "transaction pending");
                tokio::time::sleep(poll_interval).await;
            }
            TxStatus::Accepted => return Ok(Confirmation::Accepted),
            TxStatus::Reverted(reason) => return Ok(Confirmation::Reverted(reason)),
            TxStatus::Rejected(reason) => return Err(LedgerError::Rejected(reason)),
        }
    }
}

// ============================================================================
// In-memory ledger for tests
// ============================================================================

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    use super::*;

    /// A transaction as the in-memory ledger received it
    #[derive(Clone, Debug)]
    pub struct Submission {
        pub calls: Vec<Call>,
        pub fee_payer: Felt,
        pub bounds: ResourceBounds,
    }

    #[derive(Default)]
    struct State {
        balances: HashMap<(Felt, Felt), BigUint>,
        deployed: HashSet<Felt>,
        storage: HashMap<(Felt, Felt), Felt>,
        submissions: Vec<Submission>,
        /// Statuses handed out in order for every poll; the last one repeats
        status_script: VecDeque<TxStatus>,
        fail_reads: Option<String>,
        fail_submission: Option<String>,
    }

    /// Scriptable ledger; the lock is never held across an await
    pub struct MemoryLedger {
        state: Mutex<State>,
    }

    impl MemoryLedger {
        pub fn new() -> Self {
            let state = State {
                status_script: VecDeque::from(vec![TxStatus::Accepted]),
                ..State::default()
            };
            Self {
                state: Mutex::new(state),
            }
        }

        fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
            let mut guard = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            f(&mut guard)
        }

        pub fn set_balance(&self, token: Felt, account: Felt, amount: BigUint) {
            self.with(|s| {
                s.balances.insert((token, account), amount);
            });
        }

        pub fn deploy(&self, account: Felt) {
            self.with(|s| {
                s.deployed.insert(account);
            });
        }

        pub fn set_storage(&self, account: Felt, key: Felt, value: Felt) {
            self.with(|s| {
                s.storage.insert((account, key), value);
            });
        }

        pub fn script_statuses(&self, statuses: Vec<TxStatus>) {
            self.with(|s| s.status_script = statuses.into());
        }

        pub fn fail_reads(&self, reason: &str) {
            self.with(|s| s.fail_reads = Some(reason.to_string()));
        }

        pub fn fail_submission(&self, reason: &str) {
            self.with(|s| s.fail_submission = Some(reason.to_string()));
        }

        pub fn submissions(&self) -> Vec<Submission> {
            self.with(|s| s.submissions.clone())
        }

        fn check_reads(&self) -> Result<(), LedgerError> {
            match self.with(|s| s.fail_reads.clone()) {
                Some(reason) => Err(LedgerError::Transport(reason)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Ledger for MemoryLedger {
        async fn get_balance(&self, token: Felt, account: Felt) -> Result<BigUint, LedgerError> {
            self.check_reads()?;
            Ok(self.with(|s| s.balances.get(&(token, account)).cloned().unwrap_or_default()))
        }

        async fn is_deployed(&self, account: Felt) -> Result<bool, LedgerError> {
            self.check_reads()?;
            Ok(self.with(|s| s.deployed.contains(&account)))
        }

        async fn get_storage_at(&self, account: Felt, key: Felt) -> Result<Felt, LedgerError> {
            self.check_reads()?;
            Ok(self.with(|s| s.storage.get(&(account, key)).copied().unwrap_or(Felt::ZERO)))
        }

        async fn submit_transaction(
            &self,
            calls: &[Call],
            fee_payer: Felt,
            bounds: &ResourceBounds,
        ) -> Result<Felt, LedgerError> {
            self.with(|s| {
                if let Some(reason) = s.fail_submission.clone() {
                    return Err(LedgerError::Transport(reason));
                }
                s.submissions.push(Submission {
                    calls: calls.to_vec(),
                    fee_payer,
                    bounds: *bounds,
                });
                Ok(Felt::from(0x7000u64 + s.submissions.len() as u64))
            })
        }

        async fn transaction_status(&self, _tx_hash: Felt) -> Result<TxStatus, LedgerError> {
            Ok(self.with(|s| {
                if s.status_script.len() > 1 {
                    s.status_script.pop_front().unwrap_or(TxStatus::Pending)
                } else {
                    s.status_script.front().cloned().unwrap_or(TxStatus::Pending)
                }
            }))
        }
    }
}
