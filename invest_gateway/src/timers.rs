use std::time::Duration;

use ic_exports::{
    ic_cdk::spawn,
    ic_cdk_timers::{set_timer, set_timer_interval},
};

use crate::{
    cleanup::daily_cleanup,
    constants::SECONDS_PER_DAY,
    journal::{JournalCollection, LogType},
    platform::admin::set_admin_address,
};

pub fn start_timers() {
    // derive the admin account's address once the canister is installed
    set_timer(Duration::ZERO, || {
        spawn(async {
            let result = set_admin_address().await;
            let note = match &result {
                Ok(address) => format!("The admin account is {}.", address),
                Err(_) => "Could not derive the admin account.".to_string(),
            };
            JournalCollection::open(Some("set_admin_address")).append_note(
                result.map(|_| ()),
                LogType::Info,
                note,
            );
        })
    });

    // JOURNAL AND REPUTATION CLEANUP | EVERY 24 HOURS
    set_timer_interval(Duration::from_secs(SECONDS_PER_DAY), || spawn(daily_cleanup()));
}
