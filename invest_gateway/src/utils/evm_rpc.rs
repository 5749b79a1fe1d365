use candid::{self, CandidType, Deserialize, Nat, Principal};
use evm_rpc_types::{MultiRpcResult, RpcConfig, RpcResult, RpcService, RpcServices};
use ic_exports::ic_cdk::{self, api::call::CallResult as Result};
use serde::Serialize;

/// Cycles attached to every read call made against the EVM RPC canister
const READ_CALL_CYCLES: u128 = 10_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize)]
pub struct GetTransactionCountArgs {
    pub address: String,
    pub block: BlockTag,
}

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Finalized,
    Safe,
    Earliest,
    Pending,
    Number(Nat),
}

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize)]
pub struct FeeHistoryArgs {
    /// Number of blocks in the requested range.
    /// Typically, providers request this to be between 1 and 1024.
    #[serde(rename = "blockCount")]
    pub block_count: Nat,

    /// Highest block of the requested range.
    #[serde(rename = "newestBlock")]
    pub newest_block: BlockTag,

    /// A monotonically increasing list of percentile values between 0 and 100.
    #[serde(rename = "rewardPercentiles")]
    pub reward_percentiles: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, CandidType)]
pub struct FeeHistory {
    /// Lowest number block of the returned range.
    #[serde(rename = "oldestBlock")]
    pub oldest_block: Nat,

    /// An array of block base fees per gas.
    /// Includes the next block after the newest of the returned range.
    #[serde(rename = "baseFeePerGas")]
    pub base_fee_per_gas: Vec<Nat>,

    /// An array of block gas used ratios (gasUsed / gasLimit).
    #[serde(rename = "gasUsedRatio")]
    pub gas_used_ratio: Vec<f64>,

    /// A two-dimensional array of effective priority fees per gas at the requested block percentiles.
    #[serde(rename = "reward")]
    pub reward: Vec<Vec<Nat>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, CandidType)]
pub enum SendRawTransactionStatus {
    Ok(Option<String>),
    InsufficientFunds,
    NonceTooLow,
    NonceTooHigh,
}

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize)]
pub struct CallArgs {
    pub transaction: TransactionRequest,
    /// Defaults to "latest" if unspecified.
    pub block: Option<BlockTag>,
}

/// Subset of the EVM RPC canister's transaction request.
/// Omitted optional fields are sent as `null`.
#[derive(Clone, Debug, Default, PartialEq, Eq, CandidType, Deserialize)]
pub struct TransactionRequest {
    /// Transaction nonce
    pub nonce: Option<Nat>,

    /// Address of the receiver
    pub to: Option<String>,

    /// The address of the sender.
    pub from: Option<String>,

    /// Gas limit for the transaction.
    pub gas: Option<Nat>,

    /// Amount of ETH sent with this transaction.
    pub value: Option<Nat>,

    /// Transaction input data
    pub input: Option<String>,

    /// Chain ID that this transaction is valid on.
    #[serde(rename = "chainId")]
    pub chain_id: Option<Nat>,
}

/// Subset of the block fields the canister relies on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, CandidType)]
pub struct Block {
    /// Base fee per gas
    #[serde(rename = "baseFeePerGas")]
    pub base_fee_per_gas: Option<Nat>,

    /// Block number
    pub number: Nat,

    /// Block hash
    pub hash: String,

    /// Timestamp
    #[serde(rename = "timestamp")]
    pub timestamp: Nat,
}

/// Subset of the receipt fields the canister relies on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, CandidType)]
pub struct TransactionReceipt {
    #[serde(rename = "blockNumber")]
    pub block_number: Nat,

    #[serde(rename = "gasUsed")]
    pub gas_used: Nat,

    /// `1` for success, `0` for failure. Absent for pre-Byzantium receipts.
    pub status: Option<Nat>,

    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,

    pub from: String,

    pub to: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Service(pub Principal);

impl Default for Service {
    fn default() -> Self {
        Self(Principal::anonymous())
    }
}

impl Service {
    pub async fn eth_fee_history(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: FeeHistoryArgs,
        cycles: u128,
    ) -> Result<(MultiRpcResult<FeeHistory>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_feeHistory",
            (arg0, arg1, arg2),
            cycles,
        )
        .await
    }

    pub async fn eth_get_transaction_count(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: GetTransactionCountArgs,
    ) -> Result<(MultiRpcResult<Nat>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_getTransactionCount",
            (arg0, arg1, arg2),
            READ_CALL_CYCLES,
        )
        .await
    }

    pub async fn eth_get_transaction_receipt(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: String,
    ) -> Result<(MultiRpcResult<Option<TransactionReceipt>>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_getTransactionReceipt",
            (arg0, arg1, arg2),
            READ_CALL_CYCLES,
        )
        .await
    }

    pub async fn eth_send_raw_transaction(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: String,
        cycles: u128,
    ) -> Result<(MultiRpcResult<SendRawTransactionStatus>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_sendRawTransaction",
            (arg0, arg1, arg2),
            cycles,
        )
        .await
    }

    pub async fn get_block_by_number(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: BlockTag,
    ) -> Result<(MultiRpcResult<Block>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_getBlockByNumber",
            (arg0, arg1, arg2),
            1_000_000_000_u128,
        )
        .await
    }

    pub async fn request(
        &self,
        arg0: RpcService,
        arg1: String,
        arg2: u64,
        cycles: u128,
    ) -> Result<(RpcResult<String>,)> {
        ic_cdk::api::call::call_with_payment128(self.0, "request", (arg0, arg1, arg2), cycles).await
    }

    pub async fn request_cost(
        &self,
        arg0: RpcService,
        arg1: String,
        arg2: u64,
    ) -> Result<(RpcResult<Nat>,)> {
        ic_cdk::call(self.0, "requestCost", (arg0, arg1, arg2)).await
    }

    pub async fn eth_call(
        &self,
        source: RpcServices,
        config: Option<RpcConfig>,
        args: CallArgs,
    ) -> Result<(MultiRpcResult<String>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_call",
            (source, config, args),
            READ_CALL_CYCLES,
        )
        .await
    }
}
