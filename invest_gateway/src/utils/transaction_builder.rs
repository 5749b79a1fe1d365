//! Transaction builder (and sender) that interacts with the EVM RPC canister

use alloy::consensus::TxEip1559;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};

use crate::{
    constants::DEFAULT_GAS_LIMIT,
    providers::{extract_multi_rpc_result, get_ranked_rpc_providers},
    types::DerivationPath,
};

use super::{
    common::get_block_tag,
    error::{GatewayError, GatewayResult},
    evm_rpc::{SendRawTransactionStatus, Service},
    gas::{estimate_transaction_fees, get_estimate_gas, FeeEstimates},
    signer::{raw_transaction_hash, sign_eip1559_transaction},
};

/// Number of past blocks sampled for fee estimation
const FEE_HISTORY_BLOCKS: u8 = 9;

/// Outcome of a submission
#[derive(Clone, Debug, PartialEq)]
pub struct SentTransaction {
    pub status: SendRawTransactionStatus,
    /// Hash of the signed transaction, known even if the provider omits it
    pub hash: B256,
}

/// Transaction builder struct
#[derive(Default)]
pub struct TransactionBuilder {
    to: Address,
    from: Address,
    data: Vec<u8>,
    value: U256,
    nonce: u64,
    chain_id: u64,
    key_name: String,
    derivation_path: DerivationPath,
    cycles: u128,
}

impl TransactionBuilder {
    /// Sets the `to` field
    pub fn to(mut self, to: Address) -> Self {
        self.to = to;
        self
    }

    /// Sets the `from` field
    pub fn from(mut self, from: Address) -> Self {
        self.from = from;
        self
    }

    /// Sets the `data` field
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Sets the `value` field
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the `nonce` field
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the `chain_id` field
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the ECDSA key name
    pub fn key_name(mut self, key_name: String) -> Self {
        self.key_name = key_name;
        self
    }

    /// Sets the `derivation_path` field
    pub fn derivation_path(mut self, derivation_path: DerivationPath) -> Self {
        self.derivation_path = derivation_path;
        self
    }

    /// Sets the `cycles` field
    pub fn cycles(mut self, cycles: u128) -> Self {
        self.cycles = cycles;
        self
    }

    /// Gas limit with a 20% margin over the estimate, or the default if estimation fails
    async fn gas_limit(&self, rpc_canister: &Service) -> u128 {
        match get_estimate_gas(rpc_canister, self.data.clone(), self.to, self.from).await {
            Ok(estimate) => u128::try_from(estimate.saturating_mul(U256::from(12)) / U256::from(10))
                .unwrap_or(DEFAULT_GAS_LIMIT),
            Err(_) => DEFAULT_GAS_LIMIT,
        }
    }

    /// Builds the TransactionBuilder into a Transaction and sends it
    pub async fn send(self, rpc_canister: &Service) -> GatewayResult<SentTransaction> {
        if self.chain_id == 0 {
            return Err(GatewayError::Custom(
                "The transaction has no chain id.".to_string(),
            ));
        }

        let rpc = get_ranked_rpc_providers()?;
        let block_tag = get_block_tag(rpc_canister, true).await?;
        let FeeEstimates {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } = estimate_transaction_fees(FEE_HISTORY_BLOCKS, rpc.clone(), rpc_canister, block_tag)
            .await?;
        let gas_limit = self.gas_limit(rpc_canister).await;

        let request = TxEip1559 {
            chain_id: self.chain_id,
            to: TxKind::Call(self.to),
            max_fee_per_gas,
            max_priority_fee_per_gas,
            value: self.value,
            nonce: self.nonce,
            gas_limit: gas_limit as _,
            access_list: Default::default(),
            input: Bytes::from(self.data),
        };

        let signed_transaction =
            sign_eip1559_transaction(request, &self.key_name, self.derivation_path, self.from)
                .await?;
        let hash = raw_transaction_hash(&signed_transaction)?;

        let status = match rpc_canister
            .eth_send_raw_transaction(rpc.clone(), None, signed_transaction, self.cycles)
            .await
        {
            Ok((response,)) => extract_multi_rpc_result(rpc, response)?,
            Err(e) => return Err(GatewayError::CallResult(e.0, e.1)),
        };

        Ok(SentTransaction { status, hash })
    }
}
