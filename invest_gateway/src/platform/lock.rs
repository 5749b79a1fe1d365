//! Admin submission lock
//!
//! Serializes the admin account's transactions so two updates never sign with
//! the same nonce. A trapped call never releases its lock, so the lock expires
//! on its own after a timeout.
//!
//! ```plain
//!                   ┌──────────┐
//!              ┌────► Unlocked │◄─────┐
//!              │    └──────────┘      │
//!              │         │            │
//!   timeout    │     try_lock       unlock
//!              │         │            │
//!              │         ▼            │
//!              │    ┌─────────┐       │
//!              └────┤ Locked  ├───────┘
//!                   └─────────┘
//!
//! Timeout = SUBMISSION_LOCK_TIMEOUT (3600s)
//! ```

use crate::{
    clock::now_secs,
    constants::SUBMISSION_LOCK_TIMEOUT,
    utils::error::{GatewayError, GatewayResult},
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lock {
    pub is_locked: bool,
    /// Unix seconds of the last acquisition
    pub last_locked_at: Option<u64>,
}

impl Lock {
    /// Acquires the lock at the current time
    pub fn try_lock(&mut self) -> GatewayResult<()> {
        self.try_lock_at(now_secs())
    }

    /// Acquires the lock if it is free or its holder timed out
    pub fn try_lock_at(&mut self, now: u64) -> GatewayResult<()> {
        self.expire(now);

        if self.is_locked {
            return Err(GatewayError::Locked);
        }

        self.is_locked = true;
        self.last_locked_at = Some(now);
        Ok(())
    }

    /// Releases the lock if the caller holds it, otherwise only clears an expired lock
    pub fn unlock(&mut self, acquired_lock: bool) -> &mut Self {
        if acquired_lock {
            self.is_locked = false;
            self.last_locked_at = None;
        } else {
            self.expire(now_secs());
        }
        self
    }

    fn expire(&mut self, now: u64) {
        if let Some(last_locked_at) = self.last_locked_at {
            if self.is_locked && now.saturating_sub(last_locked_at) > SUBMISSION_LOCK_TIMEOUT {
                self.is_locked = false;
                self.last_locked_at = None;
            }
        }
    }
}
