//! Canister configuration: contract addresses, chain and RPC settings.

use std::{borrow::Cow, collections::BTreeSet};

use alloy_primitives::Address;
use candid::{CandidType, Decode, Encode, Principal};
use ic_stable_structures::{storable::Bound, Storable};
use serde::Deserialize;

use crate::{
    constants::{DEFAULT_CHAIN_ID, PROVIDER_COUNT},
    types::DerivationPath,
    utils::{
        common::string_to_address,
        error::{invalid_input, GatewayResult},
        evm_rpc::Service,
    },
};

/// Default threshold ECDSA key on the IC
const DEFAULT_ECDSA_KEY_NAME: &str = "key_1";

/// Derivation path of the platform's admin account
const ADMIN_DERIVATION_PATH: &[u8] = b"platform-admin";

/// Contract addresses as provided at install time
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct ContractAddressesInput {
    pub core: String,
    pub analytics: String,
    pub admin: String,
    pub claims: String,
    pub nft: String,
    pub usdt: String,
}

/// Install arguments of the canister
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct InitArgs {
    /// EVM RPC canister
    pub rpc_principal: Principal,
    /// JSON-RPC endpoints, ranked by reputation at runtime
    pub rpc_urls: Vec<String>,
    /// Falls back to the chain selected by the crate feature
    pub chain_id: Option<u64>,
    /// Falls back to `key_1`
    pub ecdsa_key_name: Option<String>,
    pub contracts: ContractAddressesInput,
}

impl Storable for InitArgs {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(Encode!(self).expect("install arguments are always encodable"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        Decode!(bytes.as_ref(), Self).expect("install arguments are always decodable")
    }

    const BOUND: Bound = Bound::Unbounded;
}

/// Validated contract addresses
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContractAddresses {
    /// Round registry, entry point of investments
    pub core: Address,
    /// Per-investor aggregates
    pub analytics: Address,
    /// Round creation and fund withdrawal
    pub admin: Address,
    /// Reward claims and redemptions
    pub claims: Address,
    /// Investment round NFT
    pub nft: Address,
    /// USDT token used to pay for investments
    pub usdt: Address,
}

impl TryFrom<ContractAddressesInput> for ContractAddresses {
    type Error = crate::utils::error::GatewayError;

    fn try_from(value: ContractAddressesInput) -> Result<Self, Self::Error> {
        Ok(Self {
            core: string_to_address(value.core)?,
            analytics: string_to_address(value.analytics)?,
            admin: string_to_address(value.admin)?,
            claims: string_to_address(value.claims)?,
            nft: string_to_address(value.nft)?,
            usdt: string_to_address(value.usdt)?,
        })
    }
}

/// Runtime configuration held in the canister state
#[derive(Clone, Debug, Default)]
pub struct PlatformConfig {
    pub rpc_canister: Service,
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub ecdsa_key_name: String,
    pub admin_derivation_path: DerivationPath,
    pub contracts: ContractAddresses,
}

impl TryFrom<InitArgs> for PlatformConfig {
    type Error = crate::utils::error::GatewayError;

    fn try_from(value: InitArgs) -> Result<Self, Self::Error> {
        validate_rpc_urls(&value.rpc_urls)?;

        let chain_id = value.chain_id.unwrap_or(DEFAULT_CHAIN_ID);
        if chain_id == 0 {
            return Err(invalid_input("The chain id cannot be zero."));
        }

        let ecdsa_key_name = match value.ecdsa_key_name {
            Some(name) if !name.trim().is_empty() => name,
            Some(_) => return Err(invalid_input("The ECDSA key name cannot be blank.")),
            None => DEFAULT_ECDSA_KEY_NAME.to_string(),
        };

        Ok(Self {
            rpc_canister: Service(value.rpc_principal),
            rpc_urls: value.rpc_urls,
            chain_id,
            ecdsa_key_name,
            admin_derivation_path: vec![ADMIN_DERIVATION_PATH.to_vec()],
            contracts: value.contracts.try_into()?,
        })
    }
}

/// Every RPC request asks `PROVIDER_COUNT` distinct providers for a consensus
fn validate_rpc_urls(urls: &[String]) -> GatewayResult<()> {
    if let Some(url) = urls.iter().find(|url| !url.starts_with("https://")) {
        return Err(invalid_input(format!("RPC URL must use https: {}", url)));
    }

    let distinct = urls.iter().collect::<BTreeSet<_>>().len();
    if distinct < PROVIDER_COUNT as usize {
        return Err(invalid_input(format!(
            "At least {} distinct RPC URLs are required, got {}.",
            PROVIDER_COUNT, distinct
        )));
    }
    Ok(())
}

/// Candid view of the configuration
#[derive(Clone, CandidType, Deserialize, Debug)]
pub struct PlatformConfigQuery {
    pub rpc_canister: Principal,
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub ecdsa_key_name: String,
    pub core: String,
    pub analytics: String,
    pub admin: String,
    pub claims: String,
    pub nft: String,
    pub usdt: String,
}

impl From<PlatformConfig> for PlatformConfigQuery {
    fn from(value: PlatformConfig) -> Self {
        Self {
            rpc_canister: value.rpc_canister.0,
            rpc_urls: value.rpc_urls,
            chain_id: value.chain_id,
            ecdsa_key_name: value.ecdsa_key_name,
            core: value.contracts.core.to_string(),
            analytics: value.contracts.analytics.to_string(),
            admin: value.contracts.admin.to_string(),
            claims: value.contracts.claims.to_string(),
            nft: value.contracts.nft.to_string(),
            usdt: value.contracts.usdt.to_string(),
        }
    }
}
