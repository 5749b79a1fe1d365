//! Investor dashboard, derived from the wallet's tokens and their rounds on every call

use std::collections::BTreeMap;

use alloy_primitives::U256;
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    clock::Clock,
    units::format_amount,
    utils::{
        common::u256_to_nat,
        error::{GatewayError, GatewayResult},
    },
};

use super::{
    round::InvestmentRound,
    token::{RoundToken, TokenQuery},
};

/// Holdings of one round
#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct RoundHolding {
    pub round_id: Nat,
    pub round_name: String,
    pub tokens: u64,
    pub invested: Nat,
    pub accrued: Nat,
    pub claimable_tokens: u64,
}

#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct InvestorDashboard {
    pub investor: String,
    /// On-chain NFT balance of the wallet
    pub nft_balance: u64,
    /// Tokens covered by the figures below
    pub tokens_held: u64,
    /// Whether the wallet holds more tokens than were aggregated
    pub truncated: bool,
    pub total_invested: Nat,
    pub total_invested_display: String,
    pub accrued_rewards: Nat,
    pub accrued_rewards_display: String,
    pub claimable_tokens: u64,
    pub claimed_tokens: u64,
    pub redeemed_tokens: u64,
    pub rounds: Vec<RoundHolding>,
    pub tokens: Vec<TokenQuery>,
}

#[derive(Default)]
struct Totals {
    name: String,
    tokens: u64,
    invested: U256,
    accrued: U256,
    claimable: u64,
}

impl InvestorDashboard {
    /// Aggregates `tokens` against their `rounds` at the clock's current time.
    /// Every token must have its round in `rounds`. `nft_balance` is the
    /// wallet's full balance, of which `tokens` may be a prefix.
    pub fn build(
        investor: String,
        tokens: &[RoundToken],
        nft_balance: u64,
        rounds: &[InvestmentRound],
        clock: &dyn Clock,
    ) -> GatewayResult<Self> {
        let now = clock.now_secs();
        let rounds_by_id: BTreeMap<U256, &InvestmentRound> =
            rounds.iter().map(|round| (round.id, round)).collect();

        let mut per_round: BTreeMap<U256, Totals> = BTreeMap::new();
        let mut token_queries = Vec::with_capacity(tokens.len());
        let mut total_invested = U256::ZERO;
        let mut accrued_rewards = U256::ZERO;
        let mut claimable_tokens = 0;
        let mut claimed_tokens = 0;
        let mut redeemed_tokens = 0;

        for token in tokens {
            let round = rounds_by_id.get(&token.round_id).ok_or_else(|| {
                GatewayError::InvariantViolation(format!(
                    "Token {} refers to unknown round {}.",
                    token.id, token.round_id
                ))
            })?;

            let accrued = token.accrued(round, now)?;
            let claimable = token.can_claim(round, now).is_ok();

            total_invested = total_invested.saturating_add(token.token_price);
            accrued_rewards = accrued_rewards.saturating_add(accrued);
            claimable_tokens += u64::from(claimable);
            claimed_tokens += u64::from(token.reward_claimed);
            redeemed_tokens += u64::from(token.redeemed);

            let totals = per_round.entry(round.id).or_insert_with(|| Totals {
                name: round.name.clone(),
                ..Default::default()
            });
            totals.tokens += 1;
            totals.invested = totals.invested.saturating_add(token.token_price);
            totals.accrued = totals.accrued.saturating_add(accrued);
            totals.claimable += u64::from(claimable);

            token_queries.push(TokenQuery::at(token, round, now)?);
        }

        Ok(Self {
            investor,
            nft_balance,
            tokens_held: tokens.len() as u64,
            truncated: nft_balance > tokens.len() as u64,
            total_invested: u256_to_nat(&total_invested),
            total_invested_display: format_amount(total_invested)?,
            accrued_rewards: u256_to_nat(&accrued_rewards),
            accrued_rewards_display: format_amount(accrued_rewards)?,
            claimable_tokens,
            claimed_tokens,
            redeemed_tokens,
            rounds: per_round
                .into_iter()
                .map(|(round_id, totals)| RoundHolding {
                    round_id: u256_to_nat(&round_id),
                    round_name: totals.name,
                    tokens: totals.tokens,
                    invested: u256_to_nat(&totals.invested),
                    accrued: u256_to_nat(&totals.accrued),
                    claimable_tokens: totals.claimable,
                })
                .collect(),
            tokens: token_queries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{FixedClock, MockClock},
        constants::SECONDS_PER_DAY,
        rounds::{
            round::tests::{round, CLOSE},
            token::tests::token,
        },
        units::whole_units,
    };

    #[test]
    fn empty_wallet_has_an_empty_dashboard() {
        let dashboard =
            InvestorDashboard::build("0x00".to_string(), &[], 0, &[], &FixedClock(CLOSE)).unwrap();
        assert_eq!(dashboard.tokens_held, 0);
        assert_eq!(dashboard.total_invested_display, "0");
        assert!(dashboard.rounds.is_empty());
    }

    #[test]
    fn tokens_are_grouped_per_round() {
        let rounds = vec![round(1, 2, 10), round(2, 1, 10)];
        let redeemed = RoundToken {
            redeemed: true,
            ..token(12, 1)
        };
        let tokens = vec![token(11, 1), redeemed, token(21, 2)];

        let mut clock = MockClock::new();
        clock
            .expect_now_secs()
            .times(1)
            .return_const(CLOSE + 365 * SECONDS_PER_DAY);

        let dashboard =
            InvestorDashboard::build("0xabc".to_string(), &tokens, 3, &rounds, &clock).unwrap();

        assert_eq!(dashboard.tokens_held, 3);
        assert!(!dashboard.truncated);
        assert_eq!(dashboard.redeemed_tokens, 1);
        assert_eq!(dashboard.claimed_tokens, 0);
        assert_eq!(dashboard.claimable_tokens, 2);
        assert_eq!(dashboard.total_invested_display, "6000");
        // the redeemed token no longer accrues
        assert_eq!(dashboard.accrued_rewards_display, "120");

        assert_eq!(dashboard.rounds.len(), 2);
        assert_eq!(dashboard.rounds[0].tokens, 2);
        assert_eq!(dashboard.rounds[0].invested, u256_to_nat(&whole_units(4000)));
        assert_eq!(dashboard.rounds[1].round_name, "Round 2");
    }

    #[test]
    fn partial_holdings_are_flagged() {
        let tokens: Vec<RoundToken> = (0..200).map(|id| token(id, 1)).collect();
        let dashboard = InvestorDashboard::build(
            "0xabc".to_string(),
            &tokens,
            250,
            &[round(1, 200, 300)],
            &FixedClock(CLOSE + 365 * SECONDS_PER_DAY),
        )
        .unwrap();

        assert_eq!(dashboard.nft_balance, 250);
        assert_eq!(dashboard.tokens_held, 200);
        assert!(dashboard.truncated);
        assert_eq!(dashboard.total_invested_display, "400000");
    }

    #[test]
    fn missing_round_is_reported() {
        let result = InvestorDashboard::build(
            "0xabc".to_string(),
            &[token(1, 9)],
            1,
            &[round(1, 0, 10)],
            &FixedClock(CLOSE),
        );
        assert!(matches!(result, Err(GatewayError::InvariantViolation(_))));
    }
}
