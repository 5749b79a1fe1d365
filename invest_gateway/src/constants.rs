//! Investment Gateway's Constants

/// Decimals of every on-chain amount (USDT and token prices alike)
pub const TOKEN_DECIMALS: u8 = 18;

/// Chain ID used when the init arguments do not provide one
#[cfg(feature = "mainnet")]
pub const DEFAULT_CHAIN_ID: u64 = 1;
#[cfg(not(feature = "mainnet"))]
pub const DEFAULT_CHAIN_ID: u64 = 11155111; // Sepolia testnet

/// Seconds in a day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Days over which a round's reward percentage accrues
pub const DAYS_PER_YEAR: u64 = 365;

/// Percent denominator
pub const PERCENT: u64 = 100;

/// Waiting period after a round's investment close before rewards can be claimed
pub const CLAIM_WAITING_PERIOD_DAYS: u64 = 180;
pub const fn claim_waiting_period() -> u64 {
    CLAIM_WAITING_PERIOD_DAYS * SECONDS_PER_DAY
}

/// Max number of retry attempts
pub const MAX_RETRY_ATTEMPTS: u8 = 3;

/// Admin submission lock timeout in seconds
pub const SUBMISSION_LOCK_TIMEOUT: u64 = 3_600;

/// Gas limit of admin transactions
pub const DEFAULT_GAS_LIMIT: u128 = 450_000;

/// Cycles attached to `eth_sendRawTransaction`
pub const SEND_TRANSACTION_CYCLES: u128 = 40_000_000_000;

/// Default max response bytes
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 8_000;

/// Hard ceiling of an HTTPS outcall response
pub const MAX_RESPONSE_BYTES_CEILING: u64 = 2_000_000;

/// Number of providers to use
pub const PROVIDER_COUNT: u8 = 3;

/// Number of providers needed to reach consensus
pub const PROVIDER_THRESHOLD: u8 = 2;

/// Number of journal collections kept by the daily cleanup
pub const JOURNAL_RETENTION: u64 = 300;

/// Upper bound of a single journal depth query
pub const MAX_JOURNAL_QUERY: u64 = 100;

/// Upper bound of NFTs enumerated for one wallet in a single call
pub const MAX_OWNED_TOKENS: u64 = 200;

/// Upper bound of rounds listed in a single call
pub const MAX_LISTED_ROUNDS: u64 = 100;
