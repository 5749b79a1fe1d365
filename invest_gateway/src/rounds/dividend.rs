//! Dividend accrual estimate and claimability window.
//!
//! The estimate is for display only; the claims contract computes the payable
//! amount. A round's reward accrues linearly per whole day after the investment
//! closes and is capped at the full-year reward:
//!
//! ```plain
//!  accrued
//!     ▲
//!     │                         ┌──────────── price * pct / 100
//!     │                    ╱
//!     │               ╱
//!     │          ╱
//!     │     ╱
//!   0 ├────┘
//!     └────┬────────────────────┬──────────────▶ now
//!        close             close + 365d
//!
//!  claimable from close + 180d onwards
//! ```
//!
//! Every multiplication happens before the single division, and the result
//! is rounded down.

use alloy_primitives::U256;
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    clock::Clock,
    constants::{claim_waiting_period, DAYS_PER_YEAR, PERCENT, SECONDS_PER_DAY},
    units::format_amount,
    utils::{
        common::u256_to_nat,
        error::{GatewayError, GatewayResult},
    },
};

/// The parameters a reward accrues from
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RewardTerms {
    /// Price of one token, 10^18 scaled
    pub token_price: U256,
    /// Yearly reward in whole percent
    pub reward_percentage: U256,
    /// Unix timestamp the investment closed at
    pub close_date: u64,
}

/// Whole days elapsed since `close_date`, or `None` before it
pub fn elapsed_days(close_date: u64, now: u64) -> Option<u64> {
    now.checked_sub(close_date)
        .map(|seconds| seconds / SECONDS_PER_DAY)
}

fn overflow(terms: &RewardTerms) -> GatewayError {
    GatewayError::Arithmetic(format!(
        "Reward of price {} at {}% overflows.",
        terms.token_price, terms.reward_percentage
    ))
}

/// Reward of one token after a full year
pub fn full_year_reward(terms: &RewardTerms) -> GatewayResult<U256> {
    terms
        .token_price
        .checked_mul(terms.reward_percentage)
        .map(|product| product / U256::from(PERCENT))
        .ok_or_else(|| overflow(terms))
}

/// Estimated reward accrued by one token at `now`
pub fn accrued_per_token(terms: &RewardTerms, now: u64) -> GatewayResult<U256> {
    let Some(days) = elapsed_days(terms.close_date, now) else {
        return Ok(U256::ZERO);
    };

    if days >= DAYS_PER_YEAR {
        return full_year_reward(terms);
    }

    terms
        .token_price
        .checked_mul(terms.reward_percentage)
        .and_then(|product| product.checked_mul(U256::from(days)))
        .map(|product| product / U256::from(DAYS_PER_YEAR * PERCENT))
        .ok_or_else(|| overflow(terms))
}

/// Estimated reward accrued by `tokens` tokens at `now`
pub fn accrued_for_holding(terms: &RewardTerms, tokens: u64, now: u64) -> GatewayResult<U256> {
    accrued_per_token(terms, now)?
        .checked_mul(U256::from(tokens))
        .ok_or_else(|| overflow(terms))
}

/// First instant at which the reward of a round closing at `close_date` can be claimed
pub fn claimable_at(close_date: u64) -> u64 {
    close_date.saturating_add(claim_waiting_period())
}

/// Whether the reward of a round closing at `close_date` can be claimed at `now`
pub fn is_claimable(close_date: u64, now: u64) -> bool {
    now >= claimable_at(close_date)
}

/// Dividend estimate of a holding at a point in time
#[derive(Clone, Debug, PartialEq)]
pub struct DividendEstimate {
    pub per_token: U256,
    pub total: U256,
    pub tokens: u64,
    pub elapsed_days: u64,
    pub claimable: bool,
    pub claimable_at: u64,
}

impl DividendEstimate {
    /// Estimates the dividend of `tokens` tokens at the clock's current time
    pub fn at(terms: &RewardTerms, tokens: u64, clock: &dyn Clock) -> GatewayResult<Self> {
        let now = clock.now_secs();
        Ok(Self {
            per_token: accrued_per_token(terms, now)?,
            total: accrued_for_holding(terms, tokens, now)?,
            tokens,
            elapsed_days: elapsed_days(terms.close_date, now).unwrap_or_default(),
            claimable: is_claimable(terms.close_date, now),
            claimable_at: claimable_at(terms.close_date),
        })
    }
}

/// Candid view of a dividend estimate
#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct DividendEstimateQuery {
    pub per_token: Nat,
    pub total: Nat,
    /// Decimal rendering of `per_token`
    pub per_token_display: String,
    /// Decimal rendering of `total`
    pub total_display: String,
    pub tokens: u64,
    pub elapsed_days: u64,
    pub claimable: bool,
    pub claimable_at: u64,
}

impl TryFrom<DividendEstimate> for DividendEstimateQuery {
    type Error = crate::utils::error::GatewayError;

    fn try_from(value: DividendEstimate) -> GatewayResult<Self> {
        Ok(Self {
            per_token: u256_to_nat(&value.per_token),
            total: u256_to_nat(&value.total),
            per_token_display: format_amount(value.per_token)?,
            total_display: format_amount(value.total)?,
            tokens: value.tokens,
            elapsed_days: value.elapsed_days,
            claimable: value.claimable,
            claimable_at: value.claimable_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::MockClock, units::whole_units};
    use proptest::prelude::*;

    const T: u64 = 1_700_000_000;
    const DAY: u64 = SECONDS_PER_DAY;

    fn terms(token_price: U256, reward_percentage: u64) -> RewardTerms {
        RewardTerms {
            token_price,
            reward_percentage: U256::from(reward_percentage),
            close_date: T,
        }
    }

    #[test]
    fn nothing_accrues_before_close() {
        let terms = terms(whole_units(2000), 3);
        assert_eq!(accrued_per_token(&terms, T - 1).unwrap(), U256::ZERO);
        assert_eq!(accrued_per_token(&terms, 0).unwrap(), U256::ZERO);
    }

    #[test]
    fn nothing_accrues_on_the_first_day() {
        let terms = terms(whole_units(2000), 3);
        assert_eq!(accrued_per_token(&terms, T).unwrap(), U256::ZERO);
        assert_eq!(accrued_per_token(&terms, T + DAY - 1).unwrap(), U256::ZERO);
    }

    #[test]
    fn accrual_is_prorated_daily() {
        // 2000 * 3 / 365 / 100 * 182 ≈ 29.92
        let terms = terms(whole_units(2000), 3);
        let accrued = accrued_per_token(&terms, T + 182 * DAY).unwrap();
        assert_eq!(accrued, U256::from(29_917_808_219_178_082_191_u128));
        assert_eq!(format_amount(accrued).unwrap(), "29.917808219178082191");
    }

    #[test]
    fn accrual_with_unscaled_price_rounds_down() {
        let terms = terms(U256::from(2000), 3);
        assert_eq!(accrued_per_token(&terms, T + 182 * DAY).unwrap(), U256::from(29));
    }

    #[test]
    fn accrual_caps_at_a_full_year() {
        let terms = terms(whole_units(2000), 3);
        assert_eq!(accrued_per_token(&terms, T + 365 * DAY).unwrap(), whole_units(60));
        assert_eq!(accrued_per_token(&terms, T + 3 * 365 * DAY).unwrap(), whole_units(60));
    }

    #[test]
    fn zero_reward_never_accrues() {
        let terms = terms(whole_units(2000), 0);
        assert_eq!(accrued_per_token(&terms, T + 200 * DAY).unwrap(), U256::ZERO);
        assert_eq!(accrued_per_token(&terms, T + 400 * DAY).unwrap(), U256::ZERO);
    }

    #[test]
    fn holding_multiplies_per_token_estimate() {
        let terms = terms(whole_units(2000), 3);
        assert_eq!(
            accrued_for_holding(&terms, 4, T + 365 * DAY).unwrap(),
            whole_units(240)
        );
        assert_eq!(accrued_for_holding(&terms, 0, T + 365 * DAY).unwrap(), U256::ZERO);
    }

    #[test]
    fn overflowing_terms_are_reported() {
        let overflowing = terms(U256::MAX / U256::from(2), 3);
        assert!(matches!(
            accrued_per_token(&overflowing, T + 182 * DAY),
            Err(GatewayError::Arithmetic(_))
        ));
        assert!(matches!(
            full_year_reward(&overflowing),
            Err(GatewayError::Arithmetic(_))
        ));
        // nothing to multiply before close
        assert_eq!(accrued_per_token(&overflowing, T - 1).unwrap(), U256::ZERO);

        let large = terms(U256::MAX / U256::from(400), 3);
        assert!(accrued_per_token(&large, T + 365 * DAY).is_ok());
        assert!(matches!(
            accrued_for_holding(&large, u64::MAX, T + 365 * DAY),
            Err(GatewayError::Arithmetic(_))
        ));
    }

    #[test]
    fn claim_window_opens_after_180_days() {
        assert!(!is_claimable(T, T + 179 * DAY));
        assert!(!is_claimable(T, T + 180 * DAY - 1));
        assert!(is_claimable(T, T + 180 * DAY));
        assert_eq!(claimable_at(T), T + 180 * DAY);
    }

    #[test]
    fn claim_window_saturates() {
        assert_eq!(claimable_at(u64::MAX - 1), u64::MAX);
        assert!(!is_claimable(u64::MAX - 1, u64::MAX - 1));
    }

    #[test]
    fn estimate_uses_the_clock() {
        let mut clock = MockClock::new();
        clock.expect_now_secs().times(1).return_const(T + 182 * DAY);

        let estimate = DividendEstimate::at(&terms(whole_units(2000), 3), 2, &clock).unwrap();
        assert_eq!(estimate.elapsed_days, 182);
        assert!(estimate.claimable);
        assert_eq!(
            estimate.total,
            U256::from(29_917_808_219_178_082_191_u128 * 2)
        );

        let query = DividendEstimateQuery::try_from(estimate).unwrap();
        assert_eq!(query.per_token_display, "29.917808219178082191");
        assert_eq!(query.claimable_at, T + 180 * DAY);
    }

    proptest! {
        #[test]
        fn before_close_is_always_zero(
            price in any::<u64>(),
            pct in 0u64..1_000,
            offset in 1u64..1_000_000_000,
        ) {
            let terms = terms(U256::from(price), pct);
            prop_assert_eq!(accrued_per_token(&terms, T - offset.min(T)).unwrap(), U256::ZERO);
        }

        #[test]
        fn after_a_year_is_exactly_the_full_reward(
            price in any::<u64>(),
            pct in 0u64..1_000,
            extra_days in 0u64..10_000,
        ) {
            let terms = terms(U256::from(price), pct);
            let now = T + (365 + extra_days) * DAY;
            prop_assert_eq!(
                accrued_per_token(&terms, now).unwrap(),
                U256::from(price) * U256::from(pct) / U256::from(100)
            );
        }

        #[test]
        fn accrual_never_decreases(
            price in any::<u64>(),
            pct in 0u64..1_000,
            a in 0u64..800,
            b in 0u64..800,
        ) {
            let terms = terms(U256::from(price), pct);
            let (early, late) = (a.min(b), a.max(b));
            let early = accrued_per_token(&terms, T + early * DAY).unwrap();
            let late = accrued_per_token(&terms, T + late * DAY).unwrap();
            prop_assert!(early <= late);
        }

        #[test]
        fn claimability_is_monotonic(close in any::<u32>(), now in any::<u32>(), later in any::<u32>()) {
            let (close, now) = (close as u64, now as u64);
            let later = now + later as u64;
            if is_claimable(close, now) {
                prop_assert!(is_claimable(close, later));
            }
        }
    }
}
