mod canister;
mod cleanup;
mod clock;
mod config;
mod constants;
mod journal;
mod platform;
mod providers;
mod rounds;
mod state;
mod timers;
mod types;
mod units;
mod utils;

pub use canister::InvestGateway;
