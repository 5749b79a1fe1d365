//! Conversions between human-readable decimal amounts and the 10^18 scaled
//! integers the contracts work with.

use alloy_primitives::{
    utils::{format_units, parse_units},
    U256,
};

use crate::{
    constants::TOKEN_DECIMALS,
    utils::error::{invalid_input, GatewayError, GatewayResult},
};

/// Parses a decimal string such as `"12.5"` into its scaled on-chain value.
pub fn parse_amount(amount: &str) -> GatewayResult<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(invalid_input("The amount is empty."));
    }
    if trimmed.starts_with('-') {
        return Err(invalid_input(format!("Negative amount: {}", trimmed)));
    }

    parse_units(trimmed, TOKEN_DECIMALS)
        .map(|parsed| parsed.get_absolute())
        .map_err(|err| invalid_input(format!("Could not parse amount {}: {}", trimmed, err)))
}

/// Formats a scaled on-chain value as a decimal string with trailing zeros trimmed.
pub fn format_amount(amount: U256) -> GatewayResult<String> {
    let formatted = format_units(amount, TOKEN_DECIMALS)
        .map_err(|err| GatewayError::DecodingError(err.to_string()))?;

    if !formatted.contains('.') {
        return Ok(formatted);
    }

    Ok(formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string())
}

/// Scales a whole number of units, e.g. a token price of `2000` USDT.
#[cfg(test)]
pub fn whole_units(units: u64) -> U256 {
    U256::from(units) * U256::from(10_u64.pow(TOKEN_DECIMALS as u32))
}
