//! Makes gas estimations for transactions submitted through the TransactionBuilder

use alloy_primitives::{Address, U256};
use candid::Nat;
use evm_rpc_types::RpcServices;
use num_traits::ToPrimitive;
use serde_json::json;

use crate::providers::extract_multi_rpc_result;
use crate::types::EthCallResponse;

use super::common::{extract_call_result, request_with_dynamic_retries};
use super::error::{GatewayError, GatewayResult};
use super::evm_rpc::{BlockTag, FeeHistory, FeeHistoryArgs, Service};

/// The minimum suggested maximum priority fee per gas.
const MIN_SUGGEST_MAX_PRIORITY_FEE_PER_GAS: u128 = 1_500_000_000;

/// Percentile of the priority fees sampled from the fee history
const REWARD_PERCENTILE: u8 = 95;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeeEstimates {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

pub async fn fee_history(
    block_count: Nat,
    newest_block: BlockTag,
    reward_percentiles: Option<Vec<u8>>,
    rpc_services: RpcServices,
    evm_rpc: &Service,
) -> GatewayResult<FeeHistory> {
    let fee_history_args = FeeHistoryArgs {
        block_count,
        newest_block,
        reward_percentiles,
    };

    let cycles = 25_000_000_000;

    let call_result = evm_rpc
        .eth_fee_history(rpc_services.clone(), None, fee_history_args, cycles)
        .await;

    let canister_response = extract_call_result(call_result)?;

    extract_multi_rpc_result(rpc_services, canister_response)
}

fn median_index(length: usize) -> GatewayResult<usize> {
    if length == 0 {
        return Err(GatewayError::NonExistentValue);
    }
    Ok((length - 1) / 2)
}

/// Derives EIP-1559 fees from a fee history sample
pub fn fees_from_history(fee_history: FeeHistory) -> GatewayResult<FeeEstimates> {
    let base_fee_per_gas = fee_history
        .base_fee_per_gas
        .last()
        .ok_or(GatewayError::NonExistentValue)?
        .0
        .to_u128()
        .ok_or_else(|| GatewayError::DecodingError("Base fee does not fit into u128.".to_string()))?;

    // the sampled percentile of the tips for the past blocks
    let mut rewards: Vec<u128> = fee_history
        .reward
        .into_iter()
        .flat_map(|rewards| rewards.into_iter())
        .map(|reward| reward.0.to_u128().unwrap_or(u128::MAX))
        .collect();

    rewards.sort_unstable();
    let median_reward = match median_index(rewards.len()) {
        Ok(index) => rewards[index],
        Err(_) => 0,
    };

    let max_priority_fee_per_gas = median_reward.max(MIN_SUGGEST_MAX_PRIORITY_FEE_PER_GAS);
    let max_fee_per_gas = base_fee_per_gas
        .saturating_mul(2)
        .saturating_add(max_priority_fee_per_gas);

    Ok(FeeEstimates {
        max_fee_per_gas,
        max_priority_fee_per_gas,
    })
}

pub async fn estimate_transaction_fees(
    block_count: u8,
    rpc_services: RpcServices,
    evm_rpc: &Service,
    block_tag: BlockTag,
) -> GatewayResult<FeeEstimates> {
    let fee_history = fee_history(
        Nat::from(block_count),
        block_tag,
        Some(vec![REWARD_PERCENTILE]),
        rpc_services,
        evm_rpc,
    )
    .await?;

    fees_from_history(fee_history)
}

pub async fn get_estimate_gas(
    rpc_canister: &Service,
    data: Vec<u8>,
    to: Address,
    from: Address,
) -> GatewayResult<U256> {
    let args = json!({
        "id": 1,
        "jsonrpc": "2.0",
        "params": [{
            "from": from.to_string(),
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data))
        },
        "latest"],
        "method": "eth_estimateGas"
    })
    .to_string();
    let rpc_canister_response: String = request_with_dynamic_retries(rpc_canister, args).await?;
    parse_quantity_response(&rpc_canister_response)
}

/// Parses a JSON-RPC response whose result is a hex quantity
fn parse_quantity_response(response: &str) -> GatewayResult<U256> {
    let decoded_response: EthCallResponse = serde_json::from_str(response).map_err(|err| {
        GatewayError::DecodingError(format!(
            "Could not decode JSON-RPC response: {} error: {}",
            response, err
        ))
    })?;

    let digits = decoded_response
        .result
        .strip_prefix("0x")
        .unwrap_or(&decoded_response.result);

    if digits.is_empty() {
        return Err(GatewayError::DecodingError(
            "The result field of the RPC's response is empty".to_string(),
        ));
    }

    U256::from_str_radix(digits, 16).map_err(|err| GatewayError::DecodingError(format!("{:#?}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(base_fees: Vec<u64>, rewards: Vec<Vec<u64>>) -> FeeHistory {
        FeeHistory {
            oldest_block: Nat::from(1_u8),
            base_fee_per_gas: base_fees.into_iter().map(Nat::from).collect(),
            gas_used_ratio: vec![],
            reward: rewards
                .into_iter()
                .map(|row| row.into_iter().map(Nat::from).collect())
                .collect(),
        }
    }

    #[test]
    fn median_index_of_empty_is_an_error() {
        assert!(median_index(0).is_err());
        assert_eq!(median_index(9).unwrap(), 4);
    }

    #[test]
    fn fees_use_the_median_tip() {
        let fees = fees_from_history(history(
            vec![10_000_000_000, 12_000_000_000],
            vec![vec![2_000_000_000], vec![4_000_000_000], vec![3_000_000_000]],
        ))
        .unwrap();
        assert_eq!(fees.max_priority_fee_per_gas, 3_000_000_000);
        assert_eq!(fees.max_fee_per_gas, 27_000_000_000);
    }

    #[test]
    fn tip_has_a_floor() {
        let fees = fees_from_history(history(vec![1], vec![])).unwrap();
        assert_eq!(fees.max_priority_fee_per_gas, MIN_SUGGEST_MAX_PRIORITY_FEE_PER_GAS);
        assert_eq!(fees.max_fee_per_gas, 2 + MIN_SUGGEST_MAX_PRIORITY_FEE_PER_GAS);
    }

    #[test]
    fn missing_base_fee_is_an_error() {
        assert_eq!(
            fees_from_history(history(vec![], vec![])),
            Err(GatewayError::NonExistentValue)
        );
    }

    #[test]
    fn quantity_response_is_parsed() {
        let response = r#"{"id":1,"jsonrpc":"2.0","result":"0x5208"}"#;
        assert_eq!(parse_quantity_response(response).unwrap(), U256::from(21_000));
        let empty = r#"{"id":1,"jsonrpc":"2.0","result":"0x"}"#;
        assert!(parse_quantity_response(empty).is_err());
    }
}
