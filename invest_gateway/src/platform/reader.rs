//! Contract reads through the EVM RPC canister.
//!
//! Nothing is cached: every call fetches fresh copies of the contract state.

use std::{collections::BTreeSet, ops::Range};

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    clock::Clock,
    config::{ContractAddresses, PlatformConfig},
    constants::{MAX_LISTED_ROUNDS, MAX_OWNED_TOKENS},
    journal::{JournalCollection, LogType},
    rounds::{
        dashboard::InvestorDashboard,
        round::{InvestmentRound, RoundQuery},
        token::{RoundToken, TokenQuery},
    },
    types::*,
    units::format_amount,
    utils::{
        common::{call_with_dynamic_retries, decode_abi_response, u256_to_nat, u256_to_u64},
        error::{GatewayError, GatewayResult},
        evm_rpc::{BlockTag, Service},
    },
};

/// Reads the platform contracts
#[derive(Clone, Debug)]
pub struct PlatformReader {
    rpc_canister: Service,
    contracts: ContractAddresses,
}

impl From<&PlatformConfig> for PlatformReader {
    fn from(config: &PlatformConfig) -> Self {
        Self {
            rpc_canister: config.rpc_canister,
            contracts: config.contracts,
        }
    }
}

impl PlatformReader {
    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    /// Executes `call` against `to` at the latest block and decodes its return value
    async fn call<F: SolCall>(&self, to: Address, call: F) -> GatewayResult<F::Return> {
        let result = match call_with_dynamic_retries(
            &self.rpc_canister,
            BlockTag::Latest,
            to,
            call.abi_encode(),
        )
        .await
        {
            Ok(response) => decode_abi_response::<F::Return, F>(response),
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            JournalCollection::open(Some("read")).append_note(
                Err(err.clone()),
                LogType::Read,
                format!("`{}` on {} failed.", F::SIGNATURE, to),
            );
        }
        result
    }

    pub async fn total_rounds(&self) -> GatewayResult<u64> {
        let total = self
            .call(self.contracts.core, totalRoundsCreatedCall {})
            .await?
            ._0;
        u256_to_u64(&total)
    }

    pub async fn round(&self, round_id: U256) -> GatewayResult<InvestmentRound> {
        let round = self
            .call(
                self.contracts.core,
                getInvestmentRoundCall { _roundId: round_id },
            )
            .await?
            ._0;
        round.try_into()
    }

    /// Rounds `offset + 1 ..`, at most `limit` of them. Round ids start at 1.
    pub async fn rounds(
        &self,
        offset: u64,
        limit: Option<u64>,
    ) -> GatewayResult<Page<InvestmentRound>> {
        let total = self.total_rounds().await?;
        let range = page_range(total, offset, limit, MAX_LISTED_ROUNDS);

        let mut rounds = Vec::with_capacity((range.end - range.start) as usize);
        for index in range.clone() {
            rounds.push(self.round(U256::from(index + 1)).await?);
        }
        Ok(Page::new(total, range.start, rounds))
    }

    pub async fn investor_detail(&self, investor: Address) -> GatewayResult<InvestorDetail> {
        Ok(self
            .call(
                self.contracts.analytics,
                getInvestorDetailCall {
                    _investor: investor,
                },
            )
            .await?
            ._0)
    }

    pub async fn usdt_balance(&self, owner: Address) -> GatewayResult<U256> {
        Ok(self
            .call(self.contracts.usdt, balanceOfCall { _owner: owner })
            .await?
            ._0)
    }

    /// USDT the core contract may still pull from `owner`
    pub async fn usdt_allowance(&self, owner: Address) -> GatewayResult<U256> {
        Ok(self
            .call(
                self.contracts.usdt,
                allowanceCall {
                    _owner: owner,
                    _spender: self.contracts.core,
                },
            )
            .await?
            ._0)
    }

    pub async fn nft_balance(&self, owner: Address) -> GatewayResult<u64> {
        let balance = self
            .call(self.contracts.nft, balanceOfCall { _owner: owner })
            .await?
            ._0;
        u256_to_u64(&balance)
    }

    pub async fn token_of_owner_by_index(&self, owner: Address, index: u64) -> GatewayResult<U256> {
        Ok(self
            .call(
                self.contracts.nft,
                tokenOfOwnerByIndexCall {
                    _owner: owner,
                    _index: U256::from(index),
                },
            )
            .await?
            ._0)
    }

    pub async fn token(&self, token_id: U256) -> GatewayResult<RoundToken> {
        let token = self
            .call(self.contracts.nft, getTokenInfoCall { _tokenId: token_id })
            .await?
            ._0;
        token.try_into()
    }

    /// Tokens held by `owner` from index `offset`, enumerated through the NFT contract
    pub async fn owned_tokens(
        &self,
        owner: Address,
        offset: u64,
        limit: Option<u64>,
    ) -> GatewayResult<Page<RoundToken>> {
        let balance = self.nft_balance(owner).await?;
        let range = page_range(balance, offset, limit, MAX_OWNED_TOKENS);

        let mut tokens = Vec::with_capacity((range.end - range.start) as usize);
        for index in range.clone() {
            let token_id = self.token_of_owner_by_index(owner, index).await?;
            tokens.push(self.token(token_id).await?);
        }
        Ok(Page::new(balance, range.start, tokens))
    }

    /// The rounds `tokens` belong to, each read once
    async fn rounds_of(&self, tokens: &[RoundToken]) -> GatewayResult<Vec<InvestmentRound>> {
        let round_ids: BTreeSet<U256> = tokens.iter().map(|token| token.round_id).collect();
        let mut rounds = Vec::with_capacity(round_ids.len());
        for round_id in round_ids {
            rounds.push(self.round(round_id).await?);
        }
        Ok(rounds)
    }

    pub async fn token_page(
        &self,
        owner: Address,
        offset: u64,
        limit: Option<u64>,
        now: u64,
    ) -> GatewayResult<TokenPage> {
        let page = self.owned_tokens(owner, offset, limit).await?;
        let rounds = self.rounds_of(&page.items).await?;
        TokenPage::at(owner, &page, &rounds, now)
    }

    /// Reads the first `MAX_OWNED_TOKENS` tokens of `investor` and the rounds they belong to
    pub async fn dashboard(
        &self,
        investor: Address,
        clock: &dyn Clock,
    ) -> GatewayResult<InvestorDashboard> {
        let page = self.owned_tokens(investor, 0, None).await?;
        let rounds = self.rounds_of(&page.items).await?;
        InvestorDashboard::build(investor.to_string(), &page.items, page.total, &rounds, clock)
    }

    pub async fn wallet(&self, owner: Address) -> GatewayResult<WalletQuery> {
        let usdt_balance = self.usdt_balance(owner).await?;
        let usdt_allowance = self.usdt_allowance(owner).await?;
        let nft_balance = self.nft_balance(owner).await?;

        Ok(WalletQuery {
            owner: owner.to_string(),
            usdt_balance: u256_to_nat(&usdt_balance),
            usdt_balance_display: format_amount(usdt_balance)?,
            usdt_allowance: u256_to_nat(&usdt_allowance),
            nft_balance,
        })
    }
}

/// Window `offset..offset + limit` of a listing of `total` items, with `limit`
/// defaulting to and capped at `max`
pub fn page_range(total: u64, offset: u64, limit: Option<u64>, max: u64) -> Range<u64> {
    let start = offset.min(total);
    let limit = limit.unwrap_or(max).min(max);
    start..start.saturating_add(limit).min(total)
}

/// A window of an on-chain listing along with the listing's full size
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub total: u64,
    pub offset: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: u64, offset: u64, items: Vec<T>) -> Self {
        Self {
            total,
            offset,
            items,
        }
    }

    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len() as u64) < self.total
    }
}

#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct RoundPage {
    pub total_rounds: u64,
    pub offset: u64,
    pub rounds: Vec<RoundQuery>,
    pub has_more: bool,
}

impl RoundPage {
    pub fn at(page: &Page<InvestmentRound>, now: u64) -> GatewayResult<Self> {
        Ok(Self {
            total_rounds: page.total,
            offset: page.offset,
            rounds: page
                .items
                .iter()
                .map(|round| RoundQuery::at(round, now))
                .collect::<GatewayResult<_>>()?,
            has_more: page.has_more(),
        })
    }
}

#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct TokenPage {
    pub owner: String,
    /// On-chain NFT balance of `owner`
    pub nft_balance: u64,
    pub offset: u64,
    pub tokens: Vec<TokenQuery>,
    pub has_more: bool,
}

impl TokenPage {
    pub fn at(
        owner: Address,
        page: &Page<RoundToken>,
        rounds: &[InvestmentRound],
        now: u64,
    ) -> GatewayResult<Self> {
        let mut tokens = Vec::with_capacity(page.items.len());
        for token in &page.items {
            let round = rounds
                .iter()
                .find(|round| round.id == token.round_id)
                .ok_or_else(|| {
                    GatewayError::InvariantViolation(format!(
                        "Token {} refers to unknown round {}.",
                        token.id, token.round_id
                    ))
                })?;
            tokens.push(TokenQuery::at(token, round, now)?);
        }

        Ok(Self {
            owner: owner.to_string(),
            nft_balance: page.total,
            offset: page.offset,
            tokens,
            has_more: page.has_more(),
        })
    }
}

/// Balances of a wallet on the platform's tokens
#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct WalletQuery {
    pub owner: String,
    pub usdt_balance: Nat,
    pub usdt_balance_display: String,
    /// Allowance granted to the core contract
    pub usdt_allowance: Nat,
    pub nft_balance: u64,
}

/// Candid view of the analytics contract's investor aggregate
#[derive(Clone, CandidType, Deserialize, Debug, PartialEq)]
pub struct InvestorDetailQuery {
    pub total_investment: Nat,
    pub total_tokens: Nat,
    pub total_reward_claimed: Nat,
    pub round_ids: Vec<Nat>,
}

impl From<InvestorDetail> for InvestorDetailQuery {
    fn from(value: InvestorDetail) -> Self {
        Self {
            total_investment: u256_to_nat(&value.totalInvestment),
            total_tokens: u256_to_nat(&value.totalTokens),
            total_reward_claimed: u256_to_nat(&value.totalRewardClaimed),
            round_ids: value.roundIds.iter().map(u256_to_nat).collect(),
        }
    }
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
    };
    use proptest::prelude::*;

    #[test]
    fn listings_above_the_cap_are_paged() {
        // 250 NFTs: two pages, the second one short
        assert_eq!(page_range(250, 0, None, MAX_OWNED_TOKENS), 0..200);
        assert_eq!(page_range(250, 200, None, MAX_OWNED_TOKENS), 200..250);
        assert_eq!(page_range(250, 250, None, MAX_OWNED_TOKENS), 250..250);

        // 150 rounds
        assert_eq!(page_range(150, 0, None, MAX_LISTED_ROUNDS), 0..100);
        assert_eq!(page_range(150, 100, Some(500), MAX_LISTED_ROUNDS), 100..150);
        assert_eq!(page_range(150, 10, Some(5), MAX_LISTED_ROUNDS), 10..15);
        assert_eq!(page_range(150, u64::MAX, Some(5), MAX_LISTED_ROUNDS), 150..150);
    }

    #[test]
    fn pages_report_what_is_left() {
        let first = Page::new(250, 0, vec![0_u8; 200]);
        assert!(first.has_more());
        let last = Page::new(250, 200, vec![0_u8; 50]);
        assert!(!last.has_more());
        let empty: Page<u8> = Page::new(0, 0, vec![]);
        assert!(!empty.has_more());
    }

    #[test]
    fn round_page_carries_the_round_count() {
        let page = Page::new(150, 0, vec![round(1, 2, 10), round(2, 0, 10)]);
        let query = RoundPage::at(&page, CLOSE - 1).unwrap();
        assert_eq!(query.total_rounds, 150);
        assert_eq!(query.rounds.len(), 2);
        assert!(query.has_more);
    }

    #[test]
    fn token_page_carries_the_nft_balance() {
        let page = Page::new(250, 200, vec![token(7, 1)]);
        let query = TokenPage::at(
            Address::repeat_byte(9),
            &page,
            &[round(1, 1, 10)],
            CLOSE + 180 * SECONDS_PER_DAY,
        )
        .unwrap();
        assert_eq!(query.nft_balance, 250);
        assert_eq!(query.offset, 200);
        assert!(query.has_more);
        assert!(query.tokens[0].claimable);

        assert!(matches!(
            TokenPage::at(Address::ZERO, &page, &[round(2, 1, 10)], CLOSE),
            Err(GatewayError::InvariantViolation(_))
        ));
    }

    proptest! {
        #[test]
        fn page_range_stays_within_the_listing(
            total in any::<u64>(),
            offset in any::<u64>(),
            limit in proptest::option::of(any::<u64>()),
        ) {
            let range = page_range(total, offset, limit, MAX_OWNED_TOKENS);
            prop_assert!(range.start <= range.end);
            prop_assert!(range.end <= total);
            prop_assert!(range.end - range.start <= MAX_OWNED_TOKENS);
        }
    }

    #[test]
    fn investor_detail_is_converted() {
        let detail = InvestorDetail {
            totalInvestment: whole_units(4000),
            totalTokens: U256::from(2),
            totalRewardClaimed: U256::ZERO,
            roundIds: vec![U256::from(1), U256::from(3)],
        };
        let query = InvestorDetailQuery::from(detail);
        assert_eq!(query.total_tokens, Nat::from(2_u8));
        assert_eq!(query.round_ids, vec![Nat::from(1_u8), Nat::from(3_u8)]);
    }

    #[test]
    fn reader_uses_the_configured_contracts() {
        let config = PlatformConfig {
            contracts: ContractAddresses {
                core: Address::repeat_byte(1),
                usdt: Address::repeat_byte(6),
                ..Default::default()
            },
            ..Default::default()
        };
        let reader = PlatformReader::from(&config);
        assert_eq!(reader.contracts().core, Address::repeat_byte(1));
        assert_eq!(reader.contracts().usdt, Address::repeat_byte(6));
    }
}
