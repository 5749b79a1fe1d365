//! Platform administration signed by the canister's threshold ECDSA account

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    constants::{MAX_RETRY_ATTEMPTS, SEND_TRANSACTION_CYCLES},
    journal::{JournalCollection, LogType},
    state::{config, ADMIN_ACCOUNT},
    types::{createInvestmentRoundCall, mintCall, withdrawRoundFundsCall},
    units::parse_amount,
    utils::{
        common::{get_nonce, nat_to_u256, string_to_address},
        error::{invalid_input, GatewayError, GatewayResult},
        evm_rpc::SendRawTransactionStatus,
        signer::get_canister_address,
        transaction_builder::{SentTransaction, TransactionBuilder},
    },
};

use super::lock::Lock;

/// The admin account and its submission state
#[derive(Clone, Debug, Default)]
pub struct AdminAccount {
    pub address: Option<Address>,
    /// Next nonce to use, fetched from the chain when unknown
    pub nonce: Option<u64>,
    pub lock: Lock,
}

/// Arguments of a new investment round
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct CreateRoundArgs {
    pub name: String,
    /// Decimal USDT amount, e.g. `"2000"`
    pub token_price: String,
    /// Yearly reward in whole percent
    pub reward_percentage: u64,
    pub total_tokens: Nat,
    /// Unix seconds
    pub close_date: u64,
    /// Unix seconds
    pub end_date: u64,
}

impl CreateRoundArgs {
    pub fn to_call(&self, now: u64) -> GatewayResult<createInvestmentRoundCall> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(invalid_input("The round name cannot be blank."));
        }

        let token_price = parse_amount(&self.token_price)?;
        if token_price.is_zero() {
            return Err(invalid_input("The token price must be positive."));
        }

        let total_tokens = nat_to_u256(&self.total_tokens)?;
        if total_tokens.is_zero() {
            return Err(invalid_input("The round must open at least one token."));
        }

        if self.close_date <= now {
            return Err(invalid_input("The investment must close in the future."));
        }
        if self.end_date <= self.close_date {
            return Err(invalid_input("The round must end after its investment closes."));
        }

        Ok(createInvestmentRoundCall {
            _roundName: name.to_string(),
            _tokenPrice: token_price,
            _rewardPercentage: U256::from(self.reward_percentage),
            _totalTokenOpenInvestment: total_tokens,
            _closeDateInvestment: U256::from(self.close_date),
            _endDateInvestment: U256::from(self.end_date),
        })
    }
}

pub fn mint_call(to: String, amount: &str) -> GatewayResult<mintCall> {
    let amount = parse_amount(amount)?;
    if amount.is_zero() {
        return Err(invalid_input("The minted amount must be positive."));
    }
    Ok(mintCall {
        _to: string_to_address(to)?,
        _amount: amount,
    })
}

pub fn withdraw_call(round_id: &Nat) -> GatewayResult<withdrawRoundFundsCall> {
    Ok(withdrawRoundFundsCall {
        _roundId: nat_to_u256(round_id)?,
    })
}

/// A transaction accepted by the providers
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub struct SubmittedTransaction {
    pub hash: String,
    pub nonce: u64,
    pub to: String,
    pub description: String,
}

/// Holds the admin lock for the duration of a submission
struct SubmissionGuard;

impl SubmissionGuard {
    fn acquire() -> GatewayResult<Self> {
        ADMIN_ACCOUNT.with(|account| account.borrow_mut().lock.try_lock())?;
        Ok(Self)
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        ADMIN_ACCOUNT.with(|account| {
            account.borrow_mut().lock.unlock(true);
        });
    }
}

/// Derives the admin address from the canister's key and caches it
pub async fn set_admin_address() -> GatewayResult<Address> {
    let config = config();
    let address =
        get_canister_address(&config.ecdsa_key_name, config.admin_derivation_path).await?;
    ADMIN_ACCOUNT.with(|account| account.borrow_mut().address = Some(address));
    Ok(address)
}

pub fn admin_address() -> Option<Address> {
    ADMIN_ACCOUNT.with(|account| account.borrow().address)
}

async fn admin_address_or_fetch() -> GatewayResult<Address> {
    match admin_address() {
        Some(address) => Ok(address),
        None => set_admin_address().await,
    }
}

async fn refresh_nonce(address: Address) -> GatewayResult<u64> {
    let nonce = get_nonce(&config().rpc_canister, address).await?;
    ADMIN_ACCOUNT.with(|account| account.borrow_mut().nonce = Some(nonce));
    Ok(nonce)
}

async fn nonce_or_fetch(address: Address) -> GatewayResult<u64> {
    match ADMIN_ACCOUNT.with(|account| account.borrow().nonce) {
        Some(nonce) => Ok(nonce),
        None => refresh_nonce(address).await,
    }
}

/// Signs and submits `call` to `to` from the admin account
pub async fn submit<F: SolCall>(
    to: Address,
    call: F,
    description: String,
) -> GatewayResult<SubmittedTransaction> {
    let mut journal = JournalCollection::open(Some(F::SIGNATURE));
    let result = submit_with_retries(to, call.abi_encode(), &description, &mut journal).await;

    match &result {
        Ok(submitted) => journal.append_note(
            Ok(()),
            LogType::Transaction,
            format!("{} sent as {}.", description, submitted.hash),
        ),
        Err(err) => journal.append_note(
            Err(err.clone()),
            LogType::Transaction,
            format!("{} failed.", description),
        ),
    };
    result
}

async fn submit_with_retries(
    to: Address,
    data: Vec<u8>,
    description: &str,
    journal: &mut JournalCollection,
) -> GatewayResult<SubmittedTransaction> {
    let _guard = SubmissionGuard::acquire()?;
    let config = config();
    let from = admin_address_or_fetch().await?;
    let mut nonce = nonce_or_fetch(from).await?;

    for turn in 1..=MAX_RETRY_ATTEMPTS {
        let sent = TransactionBuilder::default()
            .to(to)
            .from(from)
            .data(data.clone())
            .value(U256::ZERO)
            .nonce(nonce)
            .chain_id(config.chain_id)
            .key_name(config.ecdsa_key_name.clone())
            .derivation_path(config.admin_derivation_path.clone())
            .cycles(SEND_TRANSACTION_CYCLES)
            .send(&config.rpc_canister)
            .await;

        match sent {
            Ok(SentTransaction {
                status: SendRawTransactionStatus::Ok(_),
                hash,
            }) => {
                ADMIN_ACCOUNT.with(|account| account.borrow_mut().nonce = Some(nonce + 1));
                return Ok(SubmittedTransaction {
                    hash: hash.to_string(),
                    nonce,
                    to: to.to_string(),
                    description: description.to_string(),
                });
            }
            Ok(SentTransaction {
                status: SendRawTransactionStatus::InsufficientFunds,
                ..
            }) => {
                return Err(GatewayError::Custom(
                    "Not enough balance to cover the gas fee.".to_string(),
                ))
            }
            Ok(SentTransaction {
                status:
                    SendRawTransactionStatus::NonceTooLow | SendRawTransactionStatus::NonceTooHigh,
                ..
            }) => {
                journal.append_note(
                    Ok(()),
                    LogType::Info,
                    format!(
                        "Nonce {} was rejected. Refreshing the nonce. Attempt {}/{}",
                        nonce, turn, MAX_RETRY_ATTEMPTS
                    ),
                );
                nonce = refresh_nonce(from).await?;
            }
            Err(err) => {
                journal.append_note(
                    Err(err),
                    LogType::Info,
                    format!("Submission attempt {}/{} failed.", turn, MAX_RETRY_ATTEMPTS),
                );
            }
        }
    }

    Err(GatewayError::Custom(format!(
        "The transaction was not accepted after {} attempts.",
        MAX_RETRY_ATTEMPTS
    )))
}

pub async fn create_investment_round(
    args: CreateRoundArgs,
    now: u64,
) -> GatewayResult<SubmittedTransaction> {
    let call = args.to_call(now)?;
    let description = format!("Create round \"{}\"", call._roundName);
    submit(config().contracts.admin, call, description).await
}

pub async fn mint_usdt(to: String, amount: String) -> GatewayResult<SubmittedTransaction> {
    let call = mint_call(to, &amount)?;
    let description = format!("Mint {} USDT to {}", amount.trim(), call._to);
    submit(config().contracts.usdt, call, description).await
}

pub async fn withdraw_round_funds(round_id: Nat) -> GatewayResult<SubmittedTransaction> {
    let call = withdraw_call(&round_id)?;
    let description = format!("Withdraw the funds of round {}", call._roundId);
    submit(config().contracts.admin, call, description).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::whole_units;

    const NOW: u64 = 1_700_000_000;

    fn args() -> CreateRoundArgs {
        CreateRoundArgs {
            name: " Seed ".to_string(),
            token_price: "2000".to_string(),
            reward_percentage: 3,
            total_tokens: Nat::from(100_u8),
            close_date: NOW + 30 * 86_400,
            end_date: NOW + 395 * 86_400,
        }
    }

    #[test]
    fn round_arguments_are_scaled() {
        let call = args().to_call(NOW).unwrap();
        assert_eq!(call._roundName, "Seed");
        assert_eq!(call._tokenPrice, whole_units(2000));
        assert_eq!(call._rewardPercentage, U256::from(3));
        assert_eq!(call._totalTokenOpenInvestment, U256::from(100));
    }

    #[test]
    fn invalid_rounds_are_rejected() {
        let blank = CreateRoundArgs {
            name: "  ".to_string(),
            ..args()
        };
        assert!(blank.to_call(NOW).is_err());

        let free = CreateRoundArgs {
            token_price: "0".to_string(),
            ..args()
        };
        assert!(free.to_call(NOW).is_err());

        let empty = CreateRoundArgs {
            total_tokens: Nat::from(0_u8),
            ..args()
        };
        assert!(empty.to_call(NOW).is_err());

        let closed = CreateRoundArgs {
            close_date: NOW,
            ..args()
        };
        assert!(closed.to_call(NOW).is_err());

        let ends_early = CreateRoundArgs {
            end_date: NOW + 30 * 86_400,
            ..args()
        };
        assert!(ends_early.to_call(NOW).is_err());
    }

    #[test]
    fn mint_parses_the_amount() {
        let call = mint_call(
            "0x0123456789abcdef0123456789abcdef01234567".to_string(),
            "12.5",
        )
        .unwrap();
        assert_eq!(call._amount, U256::from(12_500_000_000_000_000_000_u128));
        assert!(mint_call("0x01".to_string(), "1").is_err());
        assert!(mint_call(
            "0x0123456789abcdef0123456789abcdef01234567".to_string(),
            "0"
        )
        .is_err());
    }

    #[test]
    fn guard_serializes_submissions() {
        let guard = SubmissionGuard::acquire().unwrap();
        assert!(matches!(
            SubmissionGuard::acquire(),
            Err(GatewayError::Locked)
        ));
        drop(guard);
        assert!(SubmissionGuard::acquire().is_ok());
    }
}
