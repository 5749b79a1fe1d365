//! Platform domain: rounds, their NFTs and the figures derived from them.
//!
//! Nothing here touches the network. Values are read-only copies of the contract
//! state, fetched by [`crate::platform::reader`] for the duration of one call.

pub mod dashboard;
pub mod dividend;
pub mod round;
pub mod token;
