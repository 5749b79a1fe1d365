use alloy_primitives::U256;
use candid::Nat;
use ic_canister::{generate_idl, init, post_upgrade, query, update, Canister, Idl, PreUpdate};
use ic_exports::{
    candid::Principal,
    ic_cdk::{caller, trap},
};

use crate::{
    clock::{CanisterClock, Clock},
    config::{InitArgs, PlatformConfig, PlatformConfigQuery},
    journal::{recent_collections, StableJournalCollection},
    platform::{
        admin::{self, admin_address, CreateRoundArgs, SubmittedTransaction},
        prepared::{self, PreparedCall},
        reader::{InvestorDetailQuery, PlatformReader, RoundPage, TokenPage, WalletQuery},
        status::{self, TransactionStatusQuery},
    },
    providers::reset_provider_reputations,
    rounds::{
        dashboard::InvestorDashboard,
        dividend::{self, DividendEstimate, DividendEstimateQuery, RewardTerms},
        round::RoundQuery,
        token::TokenQuery,
    },
    state::{config, store_init_args, stored_init_args, CONFIG},
    timers::start_timers,
    units::parse_amount,
    utils::{
        common::{nat_to_u256, only_controller, string_to_address},
        error::GatewayResult,
    },
};

#[derive(Canister)]
pub struct InvestGateway {
    #[id]
    id: Principal,
}

impl PreUpdate for InvestGateway {}

/// Sets up the heap state from `args` and keeps them for the next upgrade
fn install(args: InitArgs) {
    let config = match PlatformConfig::try_from(args.clone()) {
        Ok(config) => config,
        Err(err) => trap(&format!("Invalid init arguments: {:?}", err)),
    };

    reset_provider_reputations(&config.rpc_urls);
    CONFIG.with(|state| *state.borrow_mut() = config);
    store_init_args(args);

    start_timers();
}

fn reader() -> PlatformReader {
    PlatformReader::from(&config())
}

impl InvestGateway {
    // INITIALIZATION
    #[init]
    pub fn init(&mut self, args: InitArgs) {
        install(args);
    }

    #[post_upgrade]
    pub fn post_upgrade(&mut self) {
        match stored_init_args() {
            Some(args) => install(args),
            None => trap("No install arguments in stable memory."),
        }
    }

    // CONFIGURATION AND LOGS
    #[query]
    pub fn get_config(&self) -> PlatformConfigQuery {
        config().into()
    }

    #[query]
    pub fn get_logs(&self, depth: u64) -> Vec<StableJournalCollection> {
        recent_collections(depth)
    }

    #[query]
    pub fn get_admin_address(&self) -> Option<String> {
        admin_address().map(|address| address.to_string())
    }

    // DERIVED FIGURES
    #[query]
    pub fn estimate_dividend(
        &self,
        token_price: String,
        reward_percentage: u64,
        close_date: u64,
        tokens: u64,
    ) -> GatewayResult<DividendEstimateQuery> {
        let terms = RewardTerms {
            token_price: parse_amount(&token_price)?,
            reward_percentage: U256::from(reward_percentage),
            close_date,
        };
        DividendEstimate::at(&terms, tokens, &CanisterClock)?.try_into()
    }

    #[query]
    pub fn is_claimable(&self, close_date: u64) -> bool {
        dividend::is_claimable(close_date, CanisterClock.now_secs())
    }

    #[query]
    pub fn claimable_at(&self, close_date: u64) -> u64 {
        dividend::claimable_at(close_date)
    }

    // CONTRACT READS
    #[update]
    pub async fn get_total_rounds(&self) -> GatewayResult<u64> {
        reader().total_rounds().await
    }

    #[update]
    pub async fn get_round(&self, round_id: Nat) -> GatewayResult<RoundQuery> {
        let round = reader().round(nat_to_u256(&round_id)?).await?;
        RoundQuery::at(&round, CanisterClock.now_secs())
    }

    #[update]
    pub async fn get_rounds(
        &self,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> GatewayResult<RoundPage> {
        let page = reader().rounds(offset.unwrap_or_default(), limit).await?;
        RoundPage::at(&page, CanisterClock.now_secs())
    }

    #[update]
    pub async fn get_investor_detail(&self, investor: String) -> GatewayResult<InvestorDetailQuery> {
        let detail = reader()
            .investor_detail(string_to_address(investor)?)
            .await?;
        Ok(detail.into())
    }

    #[update]
    pub async fn get_wallet(&self, owner: String) -> GatewayResult<WalletQuery> {
        reader().wallet(string_to_address(owner)?).await
    }

    #[update]
    pub async fn get_token(&self, token_id: Nat) -> GatewayResult<TokenQuery> {
        let reader = reader();
        let token = reader.token(nat_to_u256(&token_id)?).await?;
        let round = reader.round(token.round_id).await?;
        TokenQuery::at(&token, &round, CanisterClock.now_secs())
    }

    #[update]
    pub async fn get_tokens(
        &self,
        owner: String,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> GatewayResult<TokenPage> {
        reader()
            .token_page(
                string_to_address(owner)?,
                offset.unwrap_or_default(),
                limit,
                CanisterClock.now_secs(),
            )
            .await
    }

    #[update]
    pub async fn get_dashboard(&self, investor: String) -> GatewayResult<InvestorDashboard> {
        reader()
            .dashboard(string_to_address(investor)?, &CanisterClock)
            .await
    }

    // INVESTOR WRITES
    #[update]
    pub async fn prepare_invest(
        &self,
        investor: String,
        round_id: Nat,
        token_amount: Nat,
    ) -> GatewayResult<Vec<PreparedCall>> {
        prepared::prepare_invest(
            &reader(),
            &CanisterClock,
            string_to_address(investor)?,
            nat_to_u256(&round_id)?,
            nat_to_u256(&token_amount)?,
        )
        .await
    }

    #[update]
    pub async fn prepare_claim(&self, token_id: Nat) -> GatewayResult<PreparedCall> {
        prepared::prepare_claim(&reader(), &CanisterClock, nat_to_u256(&token_id)?).await
    }

    #[update]
    pub async fn prepare_redeem(&self, token_id: Nat) -> GatewayResult<PreparedCall> {
        prepared::prepare_redeem(&reader(), nat_to_u256(&token_id)?).await
    }

    #[update]
    pub async fn get_transaction_status(&self, hash: String) -> GatewayResult<TransactionStatusQuery> {
        status::get_transaction_status(&config().rpc_canister, hash).await
    }

    // ADMIN WRITES
    #[update]
    pub async fn create_investment_round(
        &self,
        args: CreateRoundArgs,
    ) -> GatewayResult<SubmittedTransaction> {
        only_controller(caller())?;
        admin::create_investment_round(args, CanisterClock.now_secs()).await
    }

    #[update]
    pub async fn mint_usdt(&self, to: String, amount: String) -> GatewayResult<SubmittedTransaction> {
        only_controller(caller())?;
        admin::mint_usdt(to, amount).await
    }

    #[update]
    pub async fn withdraw_round_funds(&self, round_id: Nat) -> GatewayResult<SubmittedTransaction> {
        only_controller(caller())?;
        admin::withdraw_round_funds(round_id).await
    }

    pub fn idl() -> Idl {
        generate_idl!()
    }
}
