//! Investment rounds as reported by the core contract

use alloy_primitives::U256;
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    types::InvestmentRound as SolInvestmentRound,
    units::format_amount,
    utils::{
        common::{u256_to_nat, u256_to_u64},
        error::{GatewayError, GatewayResult},
    },
};

use super::dividend::{self, RewardTerms};

/// Basis points in 100%
const BASIS_POINTS: u64 = 10_000;

/// Lifecycle phase of a round at a given time
#[derive(Clone, Copy, CandidType, Debug, Deserialize, PartialEq, Eq)]
pub enum RoundPhase {
    /// Accepting investments
    Open,
    /// Investment closed, rewards accruing
    Accruing,
    /// Past the end date
    Ended,
    /// Deactivated before the investment closed
    Inactive,
}

/// A read-only copy of a round, valid for the duration of one call
#[derive(Clone, Debug, PartialEq)]
pub struct InvestmentRound {
    pub id: U256,
    pub name: String,
    pub token_price: U256,
    pub reward_percentage: U256,
    pub total_tokens: U256,
    pub tokens_sold: U256,
    pub close_date: u64,
    pub end_date: u64,
    pub is_active: bool,
    pub status: u8,
}

impl TryFrom<SolInvestmentRound> for InvestmentRound {
    type Error = GatewayError;

    fn try_from(value: SolInvestmentRound) -> GatewayResult<Self> {
        let round = Self {
            id: value.roundId,
            name: value.roundName,
            token_price: value.tokenPrice,
            reward_percentage: value.rewardPercentage,
            total_tokens: value.totalTokenOpenInvestment,
            tokens_sold: value.tokensSold,
            close_date: u256_to_u64(&value.closeDateInvestment)?,
            end_date: u256_to_u64(&value.endDateInvestment)?,
            is_active: value.isActive,
            status: value.status,
        };
        round.check_invariants()?;
        Ok(round)
    }
}

impl InvestmentRound {
    /// The contract never sells more tokens than it opened
    pub fn check_invariants(&self) -> GatewayResult<()> {
        if self.tokens_sold > self.total_tokens {
            return Err(GatewayError::InvariantViolation(format!(
                "Round {} sold {} tokens out of {}.",
                self.id, self.tokens_sold, self.total_tokens
            )));
        }
        Ok(())
    }

    pub fn remaining_tokens(&self) -> U256 {
        self.total_tokens.saturating_sub(self.tokens_sold)
    }

    /// Sold share of the round in basis points, 0 for an empty round
    pub fn progress_bps(&self) -> u64 {
        if self.total_tokens.is_zero() {
            return 0;
        }
        let bps = self.tokens_sold.saturating_mul(U256::from(BASIS_POINTS)) / self.total_tokens;
        u64::try_from(bps).unwrap_or(u64::MAX).min(BASIS_POINTS)
    }

    pub fn phase(&self, now: u64) -> RoundPhase {
        if now < self.close_date {
            if self.is_active {
                RoundPhase::Open
            } else {
                RoundPhase::Inactive
            }
        } else if now < self.end_date {
            RoundPhase::Accruing
        } else {
            RoundPhase::Ended
        }
    }

    /// Whether `token_amount` more tokens can be bought at `now`
    pub fn accepts_investment(&self, token_amount: U256, now: u64) -> GatewayResult<()> {
        match self.phase(now) {
            RoundPhase::Open => {}
            RoundPhase::Inactive => {
                return Err(GatewayError::InvalidInput(format!(
                    "Round {} is not active.",
                    self.id
                )))
            }
            RoundPhase::Accruing | RoundPhase::Ended => {
                return Err(GatewayError::InvalidInput(format!(
                    "Round {} closed its investment.",
                    self.id
                )))
            }
        }

        if token_amount.is_zero() {
            return Err(GatewayError::InvalidInput(
                "The token amount must be positive.".to_string(),
            ));
        }

        let remaining = self.remaining_tokens();
        if token_amount > remaining {
            return Err(GatewayError::InvalidInput(format!(
                "Round {} has {} tokens left, {} requested.",
                self.id, remaining, token_amount
            )));
        }
        Ok(())
    }

    /// USDT cost of `token_amount` tokens
    pub fn cost_of(&self, token_amount: U256) -> GatewayResult<U256> {
        self.token_price
            .checked_mul(token_amount)
            .ok_or_else(|| GatewayError::Arithmetic("Investment cost overflows.".to_string()))
    }

    pub fn reward_terms(&self) -> RewardTerms {
        RewardTerms {
            token_price: self.token_price,
            reward_percentage: self.reward_percentage,
            close_date: self.close_date,
        }
    }

    pub fn claimable_at(&self) -> u64 {
        dividend::claimable_at(self.close_date)
    }

    pub fn is_claimable(&self, now: u64) -> bool {
        dividend::is_claimable(self.close_date, now)
    }
}

/// Candid view of a round at a point in time
#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct RoundQuery {
    pub id: Nat,
    pub name: String,
    pub token_price: Nat,
    pub token_price_display: String,
    pub reward_percentage: Nat,
    pub total_tokens: Nat,
    pub tokens_sold: Nat,
    pub remaining_tokens: Nat,
    /// Basis points, `4250` reads as 42.50%
    pub progress_bps: u64,
    pub close_date: u64,
    pub end_date: u64,
    pub close_date_rfc3339: String,
    pub end_date_rfc3339: String,
    pub claimable_at: u64,
    pub is_active: bool,
    pub status: u8,
    pub phase: RoundPhase,
    /// Estimated reward of one token so far
    pub accrued_per_token: Nat,
}

impl RoundQuery {
    pub fn at(round: &InvestmentRound, now: u64) -> GatewayResult<Self> {
        Ok(Self {
            id: u256_to_nat(&round.id),
            name: round.name.clone(),
            token_price: u256_to_nat(&round.token_price),
            token_price_display: format_amount(round.token_price)?,
            reward_percentage: u256_to_nat(&round.reward_percentage),
            total_tokens: u256_to_nat(&round.total_tokens),
            tokens_sold: u256_to_nat(&round.tokens_sold),
            remaining_tokens: u256_to_nat(&round.remaining_tokens()),
            progress_bps: round.progress_bps(),
            close_date: round.close_date,
            end_date: round.end_date,
            close_date_rfc3339: rfc3339(round.close_date),
            end_date_rfc3339: rfc3339(round.end_date),
            claimable_at: round.claimable_at(),
            is_active: round.is_active,
            status: round.status,
            phase: round.phase(now),
            accrued_per_token: u256_to_nat(&dividend::accrued_per_token(
                &round.reward_terms(),
                now,
            )?),
        })
    }
}

/// Renders unix seconds as RFC 3339, empty if out of range
pub fn rfc3339(seconds: u64) -> String {
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| chrono::DateTime::from_timestamp(seconds, 0))
        .map(|date| date.to_rfc3339())
        .unwrap_or_default()
}
