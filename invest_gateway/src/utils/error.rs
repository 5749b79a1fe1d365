use candid::CandidType;
use evm_rpc_types::RpcError;
use ic_exports::ic_cdk::api::call::RejectionCode;
use serde::Deserialize;

/// Gateway Canister Result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway Canister Errors
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub enum GatewayError {
    /// `CallResult` error
    CallResult(RejectionCode, String),
    /// Unauthorized access
    Unauthorized,
    /// A requested value does not exist
    NonExistentValue,
    /// No RPC provider is configured or all of them were exhausted
    ProviderUnavailable,
    /// Wrapper for the RPC errors returned by the EVM RPC canister
    RpcResponseError(RpcError),
    /// Decoding issue
    DecodingError(String),
    /// The caller supplied an argument that cannot be used
    InvalidInput(String),
    /// Data returned by a contract breaks a rule the contract is expected to uphold
    InvariantViolation(String),
    /// The transaction with the given hash was mined but reverted
    TransactionReverted(String),
    /// The admin account is busy submitting another transaction
    Locked,
    /// Unknown/Custom error
    Custom(String),
    /// No consensus was reached among RPC providers
    NoConsensus,
    /// Arithmetic error
    Arithmetic(String),
}

pub fn arithmetic_err<S: AsRef<str>>(s: S) -> GatewayError {
    GatewayError::Arithmetic(format!("{:#?}", s.as_ref()))
}

pub fn invalid_input<S: AsRef<str>>(s: S) -> GatewayError {
    GatewayError::InvalidInput(s.as_ref().to_string())
}
