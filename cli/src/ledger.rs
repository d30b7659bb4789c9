//! Starknet JSON-RPC reads plus relayer submission
//!
//! Reads go straight to a node. Submission is forwarded to a relayer service
//! that holds the sponsor account key and signs the v3 invoke.

use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use stealthflow::claim::{Call, Ledger, ResourceBounds, TxStatus};
use stealthflow::starknet::{felt_from_hex, felt_to_hex, join_u256, selector_from_name, Felt};
use stealthflow::LedgerError;

const HTTP_TIMEOUT_SECS: u64 = 30;

// Starknet JSON-RPC error codes
const CONTRACT_NOT_FOUND: i64 = 20;
const TXN_HASH_NOT_FOUND: i64 = 29;

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Serialize)]
struct RelayCall {
    to: String,
    selector: String,
    calldata: Vec<String>,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    calls: Vec<RelayCall>,
    fee_payer: String,
    resource_bounds: &'a ResourceBounds,
}

#[derive(Deserialize)]
struct RelayResponse {
    transaction_hash: String,
}

#[derive(Deserialize)]
struct Receipt {
    execution_status: Option<String>,
    finality_status: Option<String>,
    revert_reason: Option<String>,
}

pub struct RpcLedger {
    client: Client,
    rpc_url: String,
    relayer_url: Option<String>,
}

impl RpcLedger {
    pub fn new(rpc_url: &str, relayer_url: Option<&str>) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            relayer_url: relayer_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        debug!(method, "rpc request");
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LedgerError::Transport(format!("HTTP {}", response.status())));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Malformed(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| LedgerError::Malformed(format!("{} returned no result", method)))
    }
}

fn parse_felt(value: &Value) -> Result<Felt, LedgerError> {
    let text = value
        .as_str()
        .ok_or_else(|| LedgerError::Malformed(format!("expected hex string, got {}", value)))?;
    felt_from_hex(text).map_err(|e| LedgerError::Malformed(e.to_string()))
}

/// Map a receipt onto the claim flow's status model
fn receipt_status(receipt: Receipt) -> TxStatus {
    match receipt.execution_status.as_deref() {
        Some("REVERTED") => TxStatus::Reverted(
            receipt
                .revert_reason
                .unwrap_or_else(|| "no reason given".to_string()),
        ),
        Some("SUCCEEDED") => match receipt.finality_status.as_deref() {
            Some("ACCEPTED_ON_L2") | Some("ACCEPTED_ON_L1") => TxStatus::Accepted,
            _ => TxStatus::Pending,
        },
        _ => TxStatus::Pending,
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_balance(&self, token: Felt, account: Felt) -> Result<BigUint, LedgerError> {
        let result = self
            .rpc(
                "starknet_call",
                json!({
                    "request": {
                        "contract_address": felt_to_hex(&token),
                        "entry_point_selector": felt_to_hex(&selector_from_name("balanceOf")),
                        "calldata": [felt_to_hex(&account)],
                    },
                    "block_id": "latest",
                }),
            )
            .await?;

        let words = result
            .as_array()
            .ok_or_else(|| LedgerError::Malformed("balanceOf result is not an array".into()))?;
        match words.as_slice() {
            [low, high, ..] => join_u256(&parse_felt(low)?, &parse_felt(high)?)
                .map_err(|e| LedgerError::Malformed(e.to_string())),
            [single] => Ok(stealthflow::starknet::felt_to_biguint(&parse_felt(single)?)),
            [] => Err(LedgerError::Malformed("empty balanceOf result".into())),
        }
    }

    async fn is_deployed(&self, account: Felt) -> Result<bool, LedgerError> {
        let result = self
            .rpc(
                "starknet_getClassHashAt",
                json!({ "block_id": "latest", "contract_address": felt_to_hex(&account) }),
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(LedgerError::Rpc { code, .. }) if code == CONTRACT_NOT_FOUND => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_storage_at(&self, account: Felt, key: Felt) -> Result<Felt, LedgerError> {
        let result = self
            .rpc(
                "starknet_getStorageAt",
                json!({
                    "contract_address": felt_to_hex(&account),
                    "key": felt_to_hex(&key),
                    "block_id": "latest",
                }),
            )
            .await?;
        parse_felt(&result)
    }

    async fn submit_transaction(
        &self,
        calls: &[Call],
        fee_payer: Felt,
        bounds: &ResourceBounds,
    ) -> Result<Felt, LedgerError> {
        let relayer = self
            .relayer_url
            .as_deref()
            .ok_or_else(|| LedgerError::Transport("no relayer endpoint configured".into()))?;

        let request = RelayRequest {
            calls: calls
                .iter()
                .map(|call| RelayCall {
                    to: felt_to_hex(&call.to),
                    selector: felt_to_hex(&call.selector),
                    calldata: call.calldata.iter().map(felt_to_hex).collect(),
                })
                .collect(),
            fee_payer: felt_to_hex(&fee_payer),
            resource_bounds: bounds,
        };

        let response = self
            .client
            .post(format!("{}/relay", relayer))
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(LedgerError::Transport(format!("relayer returned HTTP {}", status)));
        }

        let relayed: RelayResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Malformed(e.to_string()))?;
        felt_from_hex(&relayed.transaction_hash).map_err(|e| LedgerError::Malformed(e.to_string()))
    }

    async fn transaction_status(&self, tx_hash: Felt) -> Result<TxStatus, LedgerError> {
        let result = self
            .rpc(
                "starknet_getTransactionReceipt",
                json!({ "transaction_hash": felt_to_hex(&tx_hash) }),
            )
            .await;

        match result {
            Ok(value) => {
                let receipt: Receipt = serde_json::from_value(value)
                    .map_err(|e| LedgerError::Malformed(e.to_string()))?;
                Ok(receipt_status(receipt))
            }
            Err(LedgerError::Rpc { code, .. }) if code == TXN_HASH_NOT_FOUND => Ok(TxStatus::Pending),
            Err(e) => Err(e),
        }
    }
}
