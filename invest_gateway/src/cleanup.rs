//! Daily maintenance of the journal and the provider reputations.
//!
//! 1. **Journal**: drops collections that only record provider reputation
//!    changes, then keeps the most recent `JOURNAL_RETENTION` collections.
//!
//! 2. **Provider reputations**: resets every score to zero and shuffles the
//!    configured providers with a seed from the management canister, so a
//!    provider that fell behind gets another chance.

use ic_exports::ic_cdk::api::management_canister::main::raw_rand;
use rand::seq::SliceRandom;
use rand_chacha::rand_core::SeedableRng;

use crate::{
    constants::JOURNAL_RETENTION,
    journal::{JournalCollection, LogType},
    providers::reset_provider_reputations,
    state::{config, JOURNAL},
    utils::{
        common::extract_call_result,
        error::{GatewayError, GatewayResult},
    },
};

pub async fn daily_cleanup() {
    let mut journal = JournalCollection::open(Some("daily_cleanup"));

    let removed = journal_cleanup();
    journal.append_note(
        Ok(()),
        LogType::Info,
        format!(
            "Removed {} journal collections, kept at most {}.",
            removed, JOURNAL_RETENTION
        ),
    );

    match reputations_cleanup().await {
        Ok(()) => journal.append_note(
            Ok(()),
            LogType::Info,
            "Reset provider reputations back to zero and shuffled the list.",
        ),
        Err(err) => journal.append_note(
            Err(err),
            LogType::Info,
            "Failed to reset the provider reputations list.",
        ),
    };
}

/// Resets the reputations to zero in a random order
pub async fn reputations_cleanup() -> GatewayResult<()> {
    let seed: Vec<u8> = extract_call_result(raw_rand().await)?;
    let seed: [u8; 32] = seed.try_into().map_err(|_| {
        GatewayError::DecodingError(
            "Couldn't convert the seed bytes into a fixed length slice.".to_string(),
        )
    })?;

    reset_provider_reputations(&shuffled(config().rpc_urls, seed));
    Ok(())
}

fn shuffled(mut urls: Vec<String>, seed: [u8; 32]) -> Vec<String> {
    let mut rng = rand_chacha::ChaCha8Rng::from_seed(seed);
    urls.shuffle(&mut rng);
    urls
}

/// Prunes the journal and returns the number of removed collections
pub fn journal_cleanup() -> u64 {
    JOURNAL.with(|journal| {
        let mut journal = journal.borrow_mut();

        let mut stale: Vec<u64> = journal
            .iter()
            .filter(|(_, collection)| collection.is_reputation_change())
            .map(|(key, _)| key)
            .collect();
        for key in &stale {
            journal.remove(key);
        }

        let excess = journal.len().saturating_sub(JOURNAL_RETENTION);
        let oldest: Vec<u64> = journal.iter().take(excess as usize).map(|(key, _)| key).collect();
        for key in &oldest {
            journal.remove(key);
        }

        stale.extend(oldest);
        stale.len() as u64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        journal::{JournalEntry, StableJournalCollection},
        state::insert_journal_collection,
    };

    fn collection(log_type: LogType) -> StableJournalCollection {
        StableJournalCollection {
            start_date_and_time: "2024-01-01T00:00:00+00:00".to_string(),
            end_date_and_time: "2024-01-01T00:00:01+00:00".to_string(),
            operation: None,
            entries: vec![JournalEntry {
                date_and_time: "2024-01-01T00:00:00+00:00".to_string(),
                entry: Ok(()),
                log_type,
                note: None,
            }],
        }
    }

    #[test]
    fn cleanup_drops_reputation_noise_and_old_entries() {
        for _ in 0..5 {
            insert_journal_collection(collection(LogType::ProviderReputationChange));
        }
        for _ in 0..JOURNAL_RETENTION + 10 {
            insert_journal_collection(collection(LogType::Info));
        }

        assert_eq!(journal_cleanup(), 15);
        JOURNAL.with(|journal| {
            let journal = journal.borrow();
            assert_eq!(journal.len(), JOURNAL_RETENTION);
            assert!(journal.iter().all(|(_, c)| !c.is_reputation_change()));
            // the newest collection survives
            assert_eq!(
                journal.last_key_value().map(|(key, _)| key),
                Some(JOURNAL_RETENTION + 14)
            );
        });
    }

    #[test]
    fn shuffle_is_deterministic_per_seed() {
        let urls: Vec<String> = (0..8).map(|i| format!("https://rpc{}.example", i)).collect();
        let first = shuffled(urls.clone(), [7; 32]);
        assert_eq!(first, shuffled(urls.clone(), [7; 32]));

        let mut sorted = first;
        sorted.sort();
        let mut expected = urls;
        expected.sort();
        assert_eq!(sorted, expected);
    }
}
