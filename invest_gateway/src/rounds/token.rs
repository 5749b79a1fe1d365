//! Investment round NFTs, one per purchased token

use alloy_primitives::{Address, U256};
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    types::InvestmentRoundNFT,
    units::format_amount,
    utils::{
        common::{u256_to_nat, u256_to_u64},
        error::{GatewayError, GatewayResult},
    },
};

use super::{
    dividend::{self, RewardTerms},
    round::{rfc3339, InvestmentRound},
};

#[derive(Clone, Debug, PartialEq)]
pub struct RoundToken {
    pub id: U256,
    pub round_id: U256,
    pub token_price: U256,
    pub reward_percentage: U256,
    pub purchase_timestamp: u64,
    pub original_buyer: Address,
    pub redeemed: bool,
    pub reward_claimed: bool,
    pub transfer_locked: bool,
}

impl TryFrom<InvestmentRoundNFT> for RoundToken {
    type Error = GatewayError;

    fn try_from(value: InvestmentRoundNFT) -> GatewayResult<Self> {
        let token = Self {
            id: value.tokenId,
            round_id: value.roundId,
            token_price: value.tokenPrice,
            reward_percentage: value.rewardPercentage,
            purchase_timestamp: u256_to_u64(&value.purchaseTimestamp)?,
            original_buyer: value.originalBuyer,
            redeemed: value.redeemed,
            reward_claimed: value.rewardClaimed,
            transfer_locked: value.transferLocked,
        };
        token.check_invariants()?;
        Ok(token)
    }
}

impl RoundToken {
    /// A claimed token can no longer be transferred
    pub fn check_invariants(&self) -> GatewayResult<()> {
        if self.reward_claimed && !self.transfer_locked {
            return Err(GatewayError::InvariantViolation(format!(
                "Token {} has a claimed reward but is transferable.",
                self.id
            )));
        }
        Ok(())
    }

    /// Reward terms of this token inside `round`.
    /// Price and percentage are the ones frozen at purchase; the close date is the round's.
    pub fn reward_terms(&self, round: &InvestmentRound) -> RewardTerms {
        RewardTerms {
            token_price: self.token_price,
            reward_percentage: self.reward_percentage,
            close_date: round.close_date,
        }
    }

    /// Estimated reward, 0 once claimed or redeemed
    pub fn accrued(&self, round: &InvestmentRound, now: u64) -> GatewayResult<U256> {
        if self.reward_claimed || self.redeemed {
            return Ok(U256::ZERO);
        }
        dividend::accrued_per_token(&self.reward_terms(round), now)
    }

    /// Whether the reward of this token can be claimed right now
    pub fn can_claim(&self, round: &InvestmentRound, now: u64) -> GatewayResult<()> {
        if self.round_id != round.id {
            return Err(GatewayError::InvariantViolation(format!(
                "Token {} belongs to round {}, not {}.",
                self.id, self.round_id, round.id
            )));
        }
        if self.reward_claimed {
            return Err(GatewayError::InvalidInput(format!(
                "The reward of token {} was already claimed.",
                self.id
            )));
        }
        if self.redeemed {
            return Err(GatewayError::InvalidInput(format!(
                "Token {} was redeemed.",
                self.id
            )));
        }
        if !round.is_claimable(now) {
            return Err(GatewayError::InvalidInput(format!(
                "The reward of token {} is claimable from {}.",
                self.id,
                rfc3339(round.claimable_at())
            )));
        }
        Ok(())
    }

    pub fn can_redeem(&self) -> GatewayResult<()> {
        if self.redeemed {
            return Err(GatewayError::InvalidInput(format!(
                "Token {} was already redeemed.",
                self.id
            )));
        }
        Ok(())
    }
}

/// Candid view of a token at a point in time
#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct TokenQuery {
    pub id: Nat,
    pub round_id: Nat,
    pub round_name: String,
    pub token_price: Nat,
    pub token_price_display: String,
    pub reward_percentage: Nat,
    pub purchase_timestamp: u64,
    pub original_buyer: String,
    pub redeemed: bool,
    pub reward_claimed: bool,
    pub transfer_locked: bool,
    pub accrued: Nat,
    pub accrued_display: String,
    pub claimable: bool,
    pub claimable_at: u64,
}

impl TokenQuery {
    pub fn at(token: &RoundToken, round: &InvestmentRound, now: u64) -> GatewayResult<Self> {
        let accrued = token.accrued(round, now)?;
        Ok(Self {
            id: u256_to_nat(&token.id),
            round_id: u256_to_nat(&token.round_id),
            round_name: round.name.clone(),
            token_price: u256_to_nat(&token.token_price),
            token_price_display: format_amount(token.token_price)?,
            reward_percentage: u256_to_nat(&token.reward_percentage),
            purchase_timestamp: token.purchase_timestamp,
            original_buyer: token.original_buyer.to_string(),
            redeemed: token.redeemed,
            reward_claimed: token.reward_claimed,
            transfer_locked: token.transfer_locked,
            accrued: u256_to_nat(&accrued),
            accrued_display: format_amount(accrued)?,
            claimable: token.can_claim(round, now).is_ok(),
            claimable_at: round.claimable_at(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        constants::SECONDS_PER_DAY,
        rounds::round::tests::{round, CLOSE},
        units::whole_units,
    };

    pub fn sol_token(id: u64, round_id: u64) -> InvestmentRoundNFT {
        InvestmentRoundNFT {
            tokenId: U256::from(id),
            roundId: U256::from(round_id),
            tokenPrice: whole_units(2000),
            rewardPercentage: U256::from(3),
            purchaseTimestamp: U256::from(CLOSE - 10 * SECONDS_PER_DAY),
            originalBuyer: Address::repeat_byte(0xab),
            redeemed: false,
            rewardClaimed: false,
            transferLocked: false,
        }
    }

    pub fn token(id: u64, round_id: u64) -> RoundToken {
        RoundToken::try_from(sol_token(id, round_id)).unwrap()
    }

    #[test]
    fn claimed_but_transferable_is_an_invariant_violation() {
        let mut sol = sol_token(1, 1);
        sol.rewardClaimed = true;
        assert!(matches!(
            RoundToken::try_from(sol.clone()),
            Err(GatewayError::InvariantViolation(_))
        ));
        sol.transferLocked = true;
        assert!(RoundToken::try_from(sol).is_ok());
    }

    #[test]
    fn claim_requires_the_window_and_an_unclaimed_token() {
        let round = round(1, 1, 10);
        let token = token(5, 1);
        assert!(token.can_claim(&round, CLOSE + 179 * SECONDS_PER_DAY).is_err());
        assert!(token.can_claim(&round, CLOSE + 180 * SECONDS_PER_DAY).is_ok());

        let claimed = RoundToken {
            reward_claimed: true,
            transfer_locked: true,
            ..token.clone()
        };
        assert!(claimed.can_claim(&round, CLOSE + 200 * SECONDS_PER_DAY).is_err());

        let other_round = self::token(6, 2);
        assert!(matches!(
            other_round.can_claim(&round, CLOSE + 200 * SECONDS_PER_DAY),
            Err(GatewayError::InvariantViolation(_))
        ));
    }

    #[test]
    fn redeemed_tokens_cannot_be_redeemed_again() {
        let token = token(1, 1);
        assert!(token.can_redeem().is_ok());
        let redeemed = RoundToken {
            redeemed: true,
            ..token
        };
        assert!(redeemed.can_redeem().is_err());
    }

    #[test]
    fn accrual_uses_token_terms_and_round_close() {
        let round = InvestmentRound {
            token_price: whole_units(1),
            ..round(1, 1, 10)
        };
        let token = token(1, 1);
        let now = CLOSE + 182 * SECONDS_PER_DAY;
        assert_eq!(
            token.accrued(&round, now).unwrap(),
            U256::from(29_917_808_219_178_082_191_u128)
        );

        let claimed = RoundToken {
            reward_claimed: true,
            transfer_locked: true,
            ..token
        };
        assert_eq!(claimed.accrued(&round, now).unwrap(), U256::ZERO);
    }

    #[test]
    fn query_reports_claimability() {
        let round = round(1, 1, 10);
        let query = TokenQuery::at(&token(1, 1), &round, CLOSE + 365 * SECONDS_PER_DAY).unwrap();
        assert!(query.claimable);
        assert_eq!(query.accrued_display, "60");
        assert_eq!(query.round_name, "Round 1");
    }
}
