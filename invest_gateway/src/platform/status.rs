//! Status of submitted transactions, investor or admin

use std::str::FromStr;

use alloy_primitives::B256;
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    journal::{JournalCollection, LogType},
    providers::{extract_multi_rpc_result, get_ranked_rpc_providers},
    utils::{
        common::{extract_call_result, get_rpc_config},
        error::{invalid_input, GatewayError, GatewayResult},
        evm_rpc::{Service, TransactionReceipt},
    },
};

#[derive(CandidType, Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No receipt yet
    Pending,
    Success,
    Reverted,
}

impl TransactionStatus {
    pub fn from_receipt(receipt: Option<&TransactionReceipt>) -> Self {
        match receipt {
            None => Self::Pending,
            Some(receipt) if receipt.status == Some(Nat::from(1_u8)) => Self::Success,
            Some(_) => Self::Reverted,
        }
    }

    /// `Err(TransactionReverted)` for reverted transactions
    pub fn into_result(self, hash: &str) -> GatewayResult<Self> {
        match self {
            Self::Reverted => Err(GatewayError::TransactionReverted(hash.to_string())),
            status => Ok(status),
        }
    }
}

#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub struct TransactionStatusQuery {
    pub hash: String,
    pub status: TransactionStatus,
    pub block_number: Option<Nat>,
    pub gas_used: Option<Nat>,
}

impl TransactionStatusQuery {
    fn new(hash: String, receipt: Option<TransactionReceipt>) -> Self {
        Self {
            status: TransactionStatus::from_receipt(receipt.as_ref()),
            block_number: receipt.as_ref().map(|receipt| receipt.block_number.clone()),
            gas_used: receipt.map(|receipt| receipt.gas_used),
            hash,
        }
    }
}

fn parse_hash(hash: &str) -> GatewayResult<B256> {
    B256::from_str(hash.trim())
        .map_err(|_| invalid_input(format!("{} is not a transaction hash.", hash)))
}

pub async fn get_transaction_status(
    rpc_canister: &Service,
    hash: String,
) -> GatewayResult<TransactionStatusQuery> {
    let hash = parse_hash(&hash)?.to_string();
    let rpc = get_ranked_rpc_providers()?;

    let call_result = rpc_canister
        .eth_get_transaction_receipt(rpc.clone(), Some(get_rpc_config(None)), hash.clone())
        .await;
    let receipt = extract_multi_rpc_result(rpc, extract_call_result(call_result)?)?;
    let query = TransactionStatusQuery::new(hash, receipt);

    if let Err(err) = query.status.into_result(&query.hash) {
        JournalCollection::open(Some("get_transaction_status")).append_note(
            Err(err),
            LogType::Transaction,
            format!("Transaction {} reverted.", query.hash),
        );
    }
    Ok(query)
}
