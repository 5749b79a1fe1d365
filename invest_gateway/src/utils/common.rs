//! Common utility and helper functions that are used across the project

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use candid::{Nat, Principal};
use evm_rpc_types::{HttpOutcallError, MultiRpcResult, RpcConfig, RpcError};
use ic_exports::ic_cdk::{
    self,
    api::{call::CallResult, is_controller},
};
use num_bigint::BigUint;
use num_traits::ToPrimitive;

use super::{error::*, evm_rpc::*};

use crate::{
    constants::{
        DEFAULT_MAX_RESPONSE_BYTES, MAX_RESPONSE_BYTES_CEILING, PROVIDER_COUNT,
        PROVIDER_THRESHOLD,
    },
    providers::{
        extract_multi_rpc_result, get_ranked_rpc_provider, get_ranked_rpc_providers,
        get_rpc_service,
    },
};

/// Returns Err if the `caller` is not a controller of the canister
pub fn only_controller(caller: Principal) -> GatewayResult<()> {
    if !is_controller(&caller) {
        // only the controller should be able to call this function
        return Err(GatewayError::Unauthorized);
    }
    Ok(())
}

/// Converts String to Address and returns GatewayError on failure
pub fn string_to_address(input: String) -> GatewayResult<Address> {
    Address::from_str(input.trim()).map_err(|err| GatewayError::DecodingError(format!("{:#?}", err)))
}

/// Converts values of type `Nat` to `U256`
pub fn nat_to_u256(n: &Nat) -> GatewayResult<U256> {
    let be_bytes = n.0.to_bytes_be();
    if be_bytes.len() > 32 {
        return Err(GatewayError::DecodingError("The `Nat` input length exceedes 32 bytes when converted to big-endian bytes representation.".to_string()));
    }
    // Ensure the byte array is exactly 32 bytes long
    let mut padded_bytes = [0u8; 32];
    let start_pos = 32 - be_bytes.len();
    padded_bytes[start_pos..].copy_from_slice(&be_bytes);

    Ok(U256::from_be_bytes(padded_bytes))
}

/// Converts values of type `U256` to `Nat`
pub fn u256_to_nat(value: &U256) -> Nat {
    Nat(BigUint::from_bytes_be(&value.to_be_bytes::<32>()))
}

/// Converts values of type `U256` to `u64`, failing on overflow
pub fn u256_to_u64(value: &U256) -> GatewayResult<u64> {
    u64::try_from(*value).map_err(|_| arithmetic_err(format!("{} does not fit into u64.", value)))
}

/// Converts values of type `Nat` to `u64`, failing on overflow
pub fn nat_to_u64(value: &Nat) -> GatewayResult<u64> {
    value
        .0
        .to_u64()
        .ok_or_else(|| arithmetic_err(format!("{} does not fit into u64.", value)))
}

/// Returns `T` from Solidity struct.
pub fn decode_abi_response<T, F: SolCall<Return = T>>(hex_data: String) -> GatewayResult<T> {
    let stripped_hex = hex_data.strip_prefix("0x").unwrap_or(&hex_data);
    let hex_bytes =
        hex::decode(stripped_hex).map_err(|err| GatewayError::DecodingError(err.to_string()))?;
    if hex_bytes.is_empty() {
        return Err(GatewayError::DecodingError(
            "The contract returned no data. Is the address a contract?".to_string(),
        ));
    }
    F::abi_decode_returns(&hex_bytes, false)
        .map_err(|err| GatewayError::DecodingError(err.to_string()))
}

pub async fn get_block_tag(rpc_canister: &Service, latest: bool) -> GatewayResult<BlockTag> {
    let rpc = get_ranked_rpc_provider()?;
    let rpc_config = RpcConfig {
        response_size_estimate: Some(2000),
        response_consensus: Some(evm_rpc_types::ConsensusStrategy::Threshold {
            total: Some(1),
            min: 1,
        }),
    };

    let tag = if latest {
        BlockTag::Latest
    } else {
        BlockTag::Safe
    };

    let call_result = rpc_canister
        .get_block_by_number(rpc.clone(), Some(rpc_config), tag)
        .await;
    let rpc_result = extract_call_result(call_result)?;
    let result = extract_multi_rpc_result(rpc, rpc_result)?;

    Ok(BlockTag::Number(result.number))
}

fn is_response_size_error(err: &RpcError) -> bool {
    if let RpcError::HttpOutcallError(HttpOutcallError::IcError { code, message }) = err {
        *code == ic_cdk::api::call::RejectionCode::SysFatal
            && (message.contains("size limit") || message.contains("length limit"))
    } else {
        false
    }
}

pub fn get_rpc_config(max_response_bytes: Option<u64>) -> RpcConfig {
    RpcConfig {
        response_size_estimate: max_response_bytes,
        response_consensus: Some(evm_rpc_types::ConsensusStrategy::Threshold {
            total: Some(PROVIDER_COUNT),
            min: PROVIDER_THRESHOLD,
        }),
    }
}

/// Performs `eth_call` calls to the EVM RPC canister and doubles the max response bytes argument, if insufficient
/// Exits the loop if either of the following are satisfied:
/// A) The EVM RPC canister responds with Ok() or an error that is not related to the response size
/// B) The limit of 2MB is reached.
pub async fn call_with_dynamic_retries(
    rpc_canister: &Service,
    block: BlockTag,
    to: Address,
    data: Vec<u8>,
) -> GatewayResult<String> {
    let mut max_response_bytes = DEFAULT_MAX_RESPONSE_BYTES;
    let provider_set = get_ranked_rpc_providers()?;
    let data_string = format!("0x{}", hex::encode(data));

    while max_response_bytes < MAX_RESPONSE_BYTES_CEILING {
        let args = CallArgs {
            transaction: TransactionRequest {
                to: Some(to.to_string()),
                input: Some(data_string.clone()),
                ..Default::default()
            },
            block: Some(block.clone()),
        };

        let config = get_rpc_config(Some(max_response_bytes));
        let response = rpc_canister
            .eth_call(provider_set.clone(), Some(config), args)
            .await;

        let extracted_response = extract_call_result(response)?;
        let extracted_rpc_result =
            extract_multi_rpc_result(provider_set.clone(), extracted_response);

        if let Err(GatewayError::RpcResponseError(err)) = &extracted_rpc_result {
            if is_response_size_error(err) {
                max_response_bytes *= 2;
                continue;
            }
        }

        // A response unrelated to the size was received.
        return extracted_rpc_result;
    }

    Err(GatewayError::Custom(
        "Request with dynamic retries reached its ceiling of 2 Megabytes.".to_string(),
    ))
}

/// Returns the estimated cycles cost of performing the RPC call if successful
pub async fn estimate_cycles(
    rpc_canister: &Service,
    rpc: evm_rpc_types::RpcService,
    json_data: String,
    max_response_bytes: u64,
) -> GatewayResult<u128> {
    let call_result = rpc_canister
        .request_cost(rpc, json_data, max_response_bytes)
        .await;

    match extract_call_result(call_result)? {
        Ok(cost) => cost.0.to_u128().ok_or_else(|| {
            GatewayError::DecodingError("Error converting Nat to u128.".to_string())
        }),
        Err(rpc_err) => Err(GatewayError::RpcResponseError(rpc_err)),
    }
}

/// Performs raw JSON-RPC `request` calls to the EVM RPC canister.
/// Doubles the max response bytes on size errors and moves down the provider ranking on others.
pub async fn request_with_dynamic_retries(
    rpc_canister: &Service,
    json_data: String,
) -> GatewayResult<String> {
    let mut max_response_bytes = DEFAULT_MAX_RESPONSE_BYTES;
    let mut rank = 0;

    while max_response_bytes < MAX_RESPONSE_BYTES_CEILING && rank < PROVIDER_COUNT as usize {
        let rpc = get_rpc_service(rank)?;
        let cycles =
            estimate_cycles(rpc_canister, rpc.clone(), json_data.clone(), max_response_bytes)
                .await?;

        let call_result = rpc_canister
            .request(rpc, json_data.clone(), max_response_bytes, cycles)
            .await;

        match extract_call_result(call_result)? {
            Ok(response) => return Ok(response),
            Err(err) if is_response_size_error(&err) => max_response_bytes *= 2,
            Err(_) => rank += 1,
        }
    }

    if max_response_bytes >= MAX_RESPONSE_BYTES_CEILING {
        return Err(GatewayError::Custom(
            "Request with dynamic retries reached its ceiling of 2 MB.".to_string(),
        ));
    }
    Err(GatewayError::ProviderUnavailable)
}

/// On success, returns the nonce associated with the given address
pub async fn get_nonce(rpc_canister: &Service, address: Address) -> GatewayResult<u64> {
    let rpc = get_ranked_rpc_providers()?;
    let args = GetTransactionCountArgs {
        address: address.to_string(),
        block: BlockTag::Latest,
    };

    let result = rpc_canister
        .eth_get_transaction_count(rpc.clone(), Some(get_rpc_config(Some(10_000))), args)
        .await;

    let wrapped_number = extract_call_result::<MultiRpcResult<Nat>>(result)?;
    let number = extract_multi_rpc_result(rpc, wrapped_number)?;
    nat_to_u64(&number)
}

/// Extracts the Ok or Err values of a canister call and returns them.
pub fn extract_call_result<T>(result: CallResult<(T,)>) -> GatewayResult<T> {
    result
        .map(|(success_value,)| success_value)
        .map_err(|(rejection_code, error_message)| {
            GatewayError::CallResult(rejection_code, error_message)
        })
}
