//! Time source used by every time-dependent calculation.
//!
//! Inside the canister the time comes from the system API. Native builds
//! (unit tests, candid generation) fall back to the host clock, since the
//! system API traps outside of a replica.

/// Current time in nanoseconds since the unix epoch
#[cfg(target_arch = "wasm32")]
pub fn now_nanos() -> u64 {
    ic_exports::ic_cdk::api::time()
}

/// Current time in nanoseconds since the unix epoch
#[cfg(not(target_arch = "wasm32"))]
pub fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as u64)
        .unwrap_or_default()
}

/// Current time in seconds since the unix epoch
pub fn now_secs() -> u64 {
    now_nanos() / 1_000_000_000
}

/// Source of "now" for the derived round calculations
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    /// Seconds since the unix epoch
    fn now_secs(&self) -> u64;
}

/// Clock backed by the canister's system time
#[derive(Clone, Copy, Default)]
pub struct CanisterClock;

impl Clock for CanisterClock {
    fn now_secs(&self) -> u64 {
        now_secs()
    }
}

/// Clock frozen at a caller supplied instant
#[cfg(test)]
#[derive(Clone, Copy)]
pub struct FixedClock(pub u64);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_its_instant() {
        assert_eq!(FixedClock(1_700_000_000).now_secs(), 1_700_000_000);
    }

    #[test]
    fn canister_clock_is_after_2023() {
        assert!(CanisterClock.now_secs() > 1_672_531_200);
    }
}
