//! EVM family adapter (Ethereum, BNB Smart Chain, Polygon, L2s)
//!
//! EIP-1559 fees from `eth_feeHistory` reward percentiles: Slow 25th,
//! Normal 50th, Fast 75th. Token swaps that need an allowance produce an
//! approval payload ahead of the swap call.

pub mod erc20;

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::capability::{
    Broadcaster, ChainAdapter, NodeHealth, Preloader, Signer, StatusChecker, StatusRequest,
};
use crate::error::EngineError;
use crate::model::{
    Account, Chain, ChainSignData, ChainType, ConfirmParams, EthereumSignData, Fee, FeePriority,
    GasPrice, NodeStatus, SignData, SignerParams, TransactionChanges, TransactionState,
    TransactionType,
};
use crate::network::JsonRpcClient;
use crate::signing::{sign_with, EthereumSigningInput, NativeSigner, SigningInput};
use crate::swap::ApprovalData;

pub const NATIVE_TRANSFER_GAS: u64 = 21_000;
const FEE_HISTORY_BLOCKS: u64 = 5;
const REWARD_PERCENTILES: [u8; 3] = [25, 50, 75];

/// The `(to, value, data)` triple of the main call, derived from the intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmCall {
    pub to: String,
    pub value: u128,
    pub data: Vec<u8>,
}

impl EvmCall {
    pub fn from_params(input: &ConfirmParams) -> Result<Self, EngineError> {
        match input {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => {
                match &data.asset_id.token_id {
                    None => Ok(Self {
                        to: data.to.clone(),
                        value: data.value,
                        data: Vec::new(),
                    }),
                    Some(token) => Ok(Self {
                        to: token.clone(),
                        value: 0,
                        data: erc20::encode_transfer(&data.to, U256::from(data.value))?,
                    }),
                }
            }
            ConfirmParams::Swap(swap) => Ok(Self {
                to: swap.data.to.clone(),
                value: swap.data.value,
                data: decode_calldata(&swap.data.data)?,
            }),
            ConfirmParams::ContractCall(call) => Ok(Self {
                to: call.to.clone(),
                value: call.value,
                data: decode_calldata(&call.data)?,
            }),
            ConfirmParams::Stake(_) => Err(EngineError::Validation(
                "Staking is not supported on EVM chains".to_string(),
            )),
        }
    }
}

fn decode_calldata(data: &str) -> Result<Vec<u8>, EngineError> {
    hex::decode(data.trim_start_matches("0x"))
        .map_err(|e| EngineError::Validation(format!("Invalid calldata: {}", e)))
}

fn hex_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

/// Decode a JSON-RPC hex quantity. `0x` alone is zero.
fn quantity(value: &str) -> Result<U256, EngineError> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| EngineError::Network(format!("Invalid hex quantity {}: {}", value, e)))
}

fn quantity_u128(value: &str) -> Result<u128, EngineError> {
    u128::try_from(quantity(value)?)
        .map_err(|_| EngineError::Network(format!("Quantity out of range: {}", value)))
}

fn quantity_u64(value: &str) -> Result<u64, EngineError> {
    u64::try_from(quantity(value)?)
        .map_err(|_| EngineError::Network(format!("Quantity out of range: {}", value)))
}

/// `2 * base_fee + priority_fee` per gas, and the total for `gas_units`
fn fee_cap(base_fee: u128, priority_fee: u128, gas_units: u64) -> Result<(u128, u128), EngineError> {
    let max_fee_per_gas = base_fee
        .checked_mul(2)
        .and_then(|doubled| doubled.checked_add(priority_fee))
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "Fee cap overflows: base fee {} + priority fee {}",
                base_fee, priority_fee
            ))
        })?;
    let total = max_fee_per_gas
        .checked_mul(u128::from(gas_units))
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "Fee overflows: {} gas at {} per gas",
                gas_units, max_fee_per_gas
            ))
        })?;
    Ok((max_fee_per_gas, total))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeHistory {
    base_fee_per_gas: Vec<String>,
    #[serde(default)]
    reward: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    status: Option<String>,
    gas_used: String,
    effective_gas_price: Option<String>,
}

pub struct EvmAdapter {
    chain: Chain,
    rpc: JsonRpcClient,
    signer: Arc<dyn NativeSigner>,
}

impl EvmAdapter {
    pub fn new(chain: Chain, rpc: JsonRpcClient, signer: Arc<dyn NativeSigner>) -> Self {
        Self { chain, rpc, signer }
    }

    fn chain_id(&self) -> Result<u64, EngineError> {
        self.chain
            .evm_chain_id()
            .ok_or_else(|| EngineError::family_mismatch(ChainType::Ethereum, self.chain))
    }

    async fn pending_nonce(&self, address: &str) -> Result<u64, EngineError> {
        let nonce: String = self
            .rpc
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        quantity_u64(&nonce)
    }

    /// Base fee for the next block and the per-tier priority fee
    async fn fee_market(&self) -> Result<(u128, [u128; 3]), EngineError> {
        let history: FeeHistory = self
            .rpc
            .call(
                "eth_feeHistory",
                json!([format!("0x{:x}", FEE_HISTORY_BLOCKS), "latest", REWARD_PERCENTILES]),
            )
            .await?;

        let base_fee = history
            .base_fee_per_gas
            .last()
            .ok_or_else(|| EngineError::Network("eth_feeHistory returned no base fee".to_string()))
            .and_then(|fee| quantity_u128(fee))?;

        let mut priority = [0u128; 3];
        for (tier, slot) in priority.iter_mut().enumerate() {
            let samples = history
                .reward
                .iter()
                .filter_map(|block| block.get(tier))
                .map(|fee| quantity_u128(fee))
                .collect::<Result<Vec<_>, _>>()?;
            if samples.is_empty() {
                continue;
            }
            let total = samples
                .iter()
                .try_fold(0u128, |acc, fee| acc.checked_add(*fee))
                .ok_or_else(|| {
                    EngineError::Network("eth_feeHistory rewards out of range".to_string())
                })?;
            *slot = total / samples.len() as u128;
        }
        Ok((base_fee, priority))
    }

    async fn estimate_gas(&self, from: &str, call: &EvmCall) -> Result<u64, EngineError> {
        let gas: String = self
            .rpc
            .call(
                "eth_estimateGas",
                json!([{
                    "from": from,
                    "to": call.to,
                    "value": hex_quantity(call.value),
                    "data": format!("0x{}", hex::encode(&call.data)),
                }]),
            )
            .await?;
        quantity_u64(&gas)
    }

    async fn allowance(&self, token: &str, owner: &str, spender: &str) -> Result<U256, EngineError> {
        let data = erc20::encode_allowance(owner, spender)?;
        let result: String = self
            .rpc
            .call(
                "eth_call",
                json!([{ "to": token, "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;
        erc20::decode_uint256(&result)
    }

    /// Approval still required before the swap can pull the sold token
    async fn pending_approval(&self, input: &ConfirmParams) -> Result<Option<ApprovalData>, EngineError> {
        let swap = match input {
            ConfirmParams::Swap(swap) if !swap.from_asset.is_native() => swap,
            _ => return Ok(None),
        };
        let approval = match &swap.data.approval {
            Some(approval) => approval,
            None => return Ok(None),
        };
        let current = self
            .allowance(&approval.token, &swap.from, &approval.spender)
            .await?;
        if current >= U256::from(approval.value) {
            log::debug!("Allowance {} already covers {}", current, approval.value);
            return Ok(None);
        }
        Ok(Some(approval.clone()))
    }

    async fn gas_limits(
        &self,
        input: &ConfirmParams,
        call: &EvmCall,
        approval: Option<&ApprovalData>,
    ) -> Result<(u64, Option<u64>), EngineError> {
        let from = input.from();
        let approval_gas = match approval {
            Some(approval) => {
                let approve_call = EvmCall {
                    to: approval.token.clone(),
                    value: 0,
                    data: erc20::encode_approve(&approval.spender, U256::from(approval.value))?,
                };
                Some(self.estimate_gas(from, &approve_call).await?)
            }
            None => None,
        };

        let explicit = match input {
            ConfirmParams::Swap(swap) => swap.data.gas_limit,
            ConfirmParams::ContractCall(call) => call.gas_limit,
            _ => None,
        };
        let main_gas = match explicit {
            Some(limit) => limit,
            None if call.data.is_empty() => NATIVE_TRANSFER_GAS,
            // The swap call reverts until the approval is mined, so it cannot be estimated
            None if approval_gas.is_some() => {
                return Err(EngineError::Validation(
                    "Swap quote needs an approval but carries no gas limit".to_string(),
                ))
            }
            None => self.estimate_gas(from, call).await?,
        };
        Ok((main_gas, approval_gas))
    }
}

impl ChainAdapter for EvmAdapter {
    fn supports(&self, chain: Chain) -> bool {
        chain == self.chain
    }
}

#[async_trait]
impl Preloader for EvmAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        let chain_id = self.chain_id()?;
        let call = EvmCall::from_params(input)?;

        let (nonce, (base_fee, priority_fees), approval) = tokio::try_join!(
            self.pending_nonce(input.from()),
            self.fee_market(),
            self.pending_approval(input)
        )?;
        let (gas_limit, approval_gas_limit) =
            self.gas_limits(input, &call, approval.as_ref()).await?;

        let fee_asset = input.asset_id().native_asset();
        // The approval is paid at the same price as the main call
        let gas_units = gas_limit
            .checked_add(approval_gas_limit.unwrap_or(0))
            .ok_or_else(|| EngineError::Validation(format!("Gas limit {} out of range", gas_limit)))?;
        let fees = FeePriority::ALL
            .iter()
            .zip(priority_fees)
            .map(|(priority, priority_fee)| {
                let (max_fee_per_gas, total) = fee_cap(base_fee, priority_fee, gas_units)?;
                let mut fee = Fee::new(
                    *priority,
                    fee_asset.clone(),
                    GasPrice::Eip1559 {
                        max_fee_per_gas,
                        priority_fee,
                    },
                    gas_limit,
                );
                fee.amount = total;
                Ok(fee)
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        log::debug!(
            "{} preload: nonce {}, base fee {}, gas {}{}",
            self.chain,
            nonce,
            base_fee,
            gas_limit,
            if approval.is_some() { " (+approval)" } else { "" }
        );

        Ok(SignerParams::new(
            input.clone(),
            ChainSignData::new(
                self.chain,
                SignData::Ethereum(EthereumSignData {
                    chain_id,
                    nonce,
                    approval,
                    approval_gas_limit,
                }),
            ),
            fees,
        ))
    }
}

impl Signer for EvmAdapter {
    fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        params.ensure_chain_type(ChainType::Ethereum)?;
        if params.chain() != self.chain {
            return Err(EngineError::chain_mismatch(self.chain, params.chain()));
        }
        let data = match &params.chain_data.data {
            SignData::Ethereum(data) => data,
            other => return Err(EngineError::chain_mismatch(ChainType::Ethereum, other.chain_type())),
        };
        if data.chain_id != self.chain_id()? {
            return Err(EngineError::chain_mismatch(self.chain, data.chain_id));
        }

        let fee = params.fee()?;
        let (max_fee_per_gas, max_priority_fee_per_gas) = match fee.gas_price {
            GasPrice::Eip1559 {
                max_fee_per_gas,
                priority_fee,
            } => (max_fee_per_gas, priority_fee),
            GasPrice::Regular { gas_price } => (gas_price, gas_price),
        };

        let mut payloads = Vec::with_capacity(2);
        let mut nonce = data.nonce;

        if let Some(approval) = &data.approval {
            let gas_limit = data.approval_gas_limit.ok_or_else(|| {
                EngineError::Validation("Approval present without a gas limit".to_string())
            })?;
            let input = SigningInput::Ethereum(EthereumSigningInput {
                chain_id: data.chain_id,
                nonce,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                gas_limit,
                to: approval.token.clone(),
                value: 0,
                data: erc20::encode_approve(&approval.spender, U256::from(approval.value))?,
            });
            payloads.push(sign_with(self.signer.as_ref(), ChainType::Ethereum, &input, private_key)?);
            nonce += 1;
        }

        let call = EvmCall::from_params(&params.input)?;
        let input = SigningInput::Ethereum(EthereumSigningInput {
            chain_id: data.chain_id,
            nonce,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit: fee.gas_limit,
            to: call.to,
            value: call.value,
            data: call.data,
        });
        payloads.push(sign_with(self.signer.as_ref(), ChainType::Ethereum, &input, private_key)?);
        Ok(payloads)
    }
}

#[async_trait]
impl Broadcaster for EvmAdapter {
    async fn broadcast(
        &self,
        _account: &Account,
        signed: &[u8],
        _transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        self.rpc
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(signed))]),
            )
            .await
    }
}

#[async_trait]
impl StatusChecker for EvmAdapter {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        let receipt: Option<Receipt> = self
            .rpc
            .call("eth_getTransactionReceipt", json!([request.hash]))
            .await?;
        let receipt = match receipt {
            Some(receipt) => receipt,
            None => return Ok(TransactionChanges::pending()),
        };

        let state = match receipt.status.as_deref() {
            Some("0x1") => TransactionState::Confirmed,
            Some("0x0") => TransactionState::Reverted,
            _ => TransactionState::Pending,
        };
        let mut changes = TransactionChanges::new(state);

        if let Some(price) = &receipt.effective_gas_price {
            let gas_used = quantity(&receipt.gas_used)?;
            let price = quantity(price)?;
            let fee = gas_used.checked_mul(price).ok_or_else(|| {
                EngineError::Network(format!(
                    "Receipt fee overflows: gas used {} at {}",
                    receipt.gas_used, receipt.effective_gas_price.as_deref().unwrap_or_default()
                ))
            })?;
            changes = changes.with_fee(fee);
        }
        Ok(changes)
    }
}

#[async_trait]
impl NodeHealth for EvmAdapter {
    async fn node_status(&self, _chain: Chain, url: &str) -> Result<NodeStatus, EngineError> {
        let rpc = self.rpc.with_url(url);
        let (chain_id, block): (String, String) = tokio::try_join!(
            rpc.call::<String>("eth_chainId", Value::Array(vec![])),
            rpc.call::<String>("eth_blockNumber", Value::Array(vec![]))
        )?;
        Ok(NodeStatus {
            chain_id: quantity_u64(&chain_id)?.to_string(),
            latest_block_number: quantity_u64(&block)?,
            latency_ms: 0,
        })
    }
}
