//! Investor transactions, prepared for the investor's wallet to sign.
//!
//! The canister never holds investor keys. It validates the request against
//! fresh contract state and returns the calls to submit, in order.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    clock::Clock,
    config::ContractAddresses,
    journal::{JournalCollection, LogType},
    rounds::{round::InvestmentRound, token::RoundToken},
    types::{approveCall, claimRewardCall, investInRoundCall, redeemTokenCall},
    units::format_amount,
    utils::error::GatewayResult,
};

use super::reader::PlatformReader;

/// An unsigned contract call
#[derive(Clone, CandidType, Deserialize, Debug, PartialEq)]
pub struct PreparedCall {
    pub to: String,
    /// `0x` prefixed calldata
    pub data: String,
    pub value: Nat,
    pub description: String,
}

impl PreparedCall {
    fn new<F: SolCall>(to: Address, call: F, description: String) -> Self {
        Self {
            to: to.to_string(),
            data: format!("0x{}", hex::encode(call.abi_encode())),
            value: Nat::from(0_u8),
            description,
        }
    }
}

/// Calls buying `token_amount` tokens of `round`, preceded by an approval if
/// `allowance` does not cover the cost
pub fn invest_calls(
    contracts: &ContractAddresses,
    round: &InvestmentRound,
    token_amount: U256,
    allowance: U256,
    now: u64,
) -> GatewayResult<Vec<PreparedCall>> {
    round.accepts_investment(token_amount, now)?;
    let cost = round.cost_of(token_amount)?;

    let mut calls = Vec::with_capacity(2);
    if allowance < cost {
        calls.push(PreparedCall::new(
            contracts.usdt,
            approveCall {
                _spender: contracts.core,
                _amount: cost,
            },
            format!("Approve {} USDT for round {}", format_amount(cost)?, round.id),
        ));
    }
    calls.push(PreparedCall::new(
        contracts.core,
        investInRoundCall {
            _roundId: round.id,
            _tokenAmount: token_amount,
        },
        format!("Buy {} tokens of round {}", token_amount, round.id),
    ));
    Ok(calls)
}

pub fn claim_call(
    contracts: &ContractAddresses,
    token: &RoundToken,
    round: &InvestmentRound,
    now: u64,
) -> GatewayResult<PreparedCall> {
    token.can_claim(round, now)?;
    Ok(PreparedCall::new(
        contracts.claims,
        claimRewardCall { _tokenId: token.id },
        format!("Claim the reward of token {}", token.id),
    ))
}

pub fn redeem_call(contracts: &ContractAddresses, token: &RoundToken) -> GatewayResult<PreparedCall> {
    token.can_redeem()?;
    Ok(PreparedCall::new(
        contracts.claims,
        redeemTokenCall { _tokenId: token.id },
        format!("Redeem token {}", token.id),
    ))
}

fn journal_prepared<T>(journal: &mut JournalCollection, result: &GatewayResult<T>, note: String) {
    let entry = result.as_ref().map(|_| ()).map_err(Clone::clone);
    journal.append_note(entry, LogType::Transaction, note);
}

pub async fn prepare_invest(
    reader: &PlatformReader,
    clock: &dyn Clock,
    investor: Address,
    round_id: U256,
    token_amount: U256,
) -> GatewayResult<Vec<PreparedCall>> {
    let mut journal = JournalCollection::open(Some("prepare_invest"));

    let result = async {
        let round = reader.round(round_id).await?;
        let allowance = reader.usdt_allowance(investor).await?;
        invest_calls(
            reader.contracts(),
            &round,
            token_amount,
            allowance,
            clock.now_secs(),
        )
    }
    .await;

    journal_prepared(
        &mut journal,
        &result,
        format!(
            "{} tokens of round {} for {}.",
            token_amount, round_id, investor
        ),
    );
    result
}

pub async fn prepare_claim(
    reader: &PlatformReader,
    clock: &dyn Clock,
    token_id: U256,
) -> GatewayResult<PreparedCall> {
    let mut journal = JournalCollection::open(Some("prepare_claim"));

    let result = async {
        let token = reader.token(token_id).await?;
        let round = reader.round(token.round_id).await?;
        claim_call(reader.contracts(), &token, &round, clock.now_secs())
    }
    .await;

    journal_prepared(&mut journal, &result, format!("Claim of token {}.", token_id));
    result
}

pub async fn prepare_redeem(reader: &PlatformReader, token_id: U256) -> GatewayResult<PreparedCall> {
    let mut journal = JournalCollection::open(Some("prepare_redeem"));

    let result = async {
        let token = reader.token(token_id).await?;
        redeem_call(reader.contracts(), &token)
    }
    .await;

    journal_prepared(&mut journal, &result, format!("Redemption of token {}.", token_id));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::SECONDS_PER_DAY,
        rounds::{
            round::tests::{round, CLOSE},
            token::tests::token,
        },
        units::whole_units,
        utils::error::GatewayError,
    };

    fn contracts() -> ContractAddresses {
        ContractAddresses {
            core: Address::repeat_byte(1),
            analytics: Address::repeat_byte(2),
            admin: Address::repeat_byte(3),
            claims: Address::repeat_byte(4),
            nft: Address::repeat_byte(5),
            usdt: Address::repeat_byte(6),
        }
    }

    fn decode_hex(data: &str) -> Vec<u8> {
        hex::decode(data.trim_start_matches("0x")).unwrap()
    }

    #[test]
    fn invest_without_allowance_approves_first() {
        let calls = invest_calls(
            &contracts(),
            &round(1, 0, 10),
            U256::from(2),
            U256::ZERO,
            CLOSE - 1,
        )
        .unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].to, Address::repeat_byte(6).to_string());
        let approve = approveCall::abi_decode(&decode_hex(&calls[0].data), true).unwrap();
        assert_eq!(approve._spender, Address::repeat_byte(1));
        assert_eq!(approve._amount, whole_units(4000));
        assert_eq!(calls[0].description, "Approve 4000 USDT for round 1");

        assert_eq!(calls[1].to, Address::repeat_byte(1).to_string());
        let invest = investInRoundCall::abi_decode(&decode_hex(&calls[1].data), true).unwrap();
        assert_eq!(invest._roundId, U256::from(1));
        assert_eq!(invest._tokenAmount, U256::from(2));
    }

    #[test]
    fn sufficient_allowance_skips_the_approval() {
        let calls = invest_calls(
            &contracts(),
            &round(1, 0, 10),
            U256::from(2),
            whole_units(4000),
            CLOSE - 1,
        )
        .unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].data.starts_with(&format!(
            "0x{}",
            hex::encode(investInRoundCall::SELECTOR)
        )));
    }

    #[test]
    fn invest_rejects_closed_rounds_and_oversized_amounts() {
        let contracts = contracts();
        assert!(matches!(
            invest_calls(&contracts, &round(1, 0, 10), U256::from(1), U256::ZERO, CLOSE),
            Err(GatewayError::InvalidInput(_))
        ));
        assert!(matches!(
            invest_calls(&contracts, &round(1, 9, 10), U256::from(2), U256::ZERO, CLOSE - 1),
            Err(GatewayError::InvalidInput(_))
        ));
    }

    #[test]
    fn claim_targets_the_claims_contract() {
        let call = claim_call(
            &contracts(),
            &token(7, 1),
            &round(1, 1, 10),
            CLOSE + 180 * SECONDS_PER_DAY,
        )
        .unwrap();
        assert_eq!(call.to, Address::repeat_byte(4).to_string());
        let claim = claimRewardCall::abi_decode(&decode_hex(&call.data), true).unwrap();
        assert_eq!(claim._tokenId, U256::from(7));
    }

    #[test]
    fn claim_before_the_window_is_rejected() {
        assert!(claim_call(
            &contracts(),
            &token(7, 1),
            &round(1, 1, 10),
            CLOSE + 179 * SECONDS_PER_DAY,
        )
        .is_err());
    }

    #[test]
    fn redeem_is_rejected_once_redeemed() {
        let token = token(7, 1);
        assert!(redeem_call(&contracts(), &token).is_ok());
        let redeemed = RoundToken {
            redeemed: true,
            ..token
        };
        assert!(redeem_call(&contracts(), &redeemed).is_err());
    }
}
