//! Journal of the canister's operations.
//!
//! Every operation opens a [`JournalCollection`], appends notes to it, and the
//! collection is committed to stable memory when it goes out of scope. Notes are
//! echoed to the replica's debug log as they are appended.

use std::borrow::Cow;

use candid::{CandidType, Decode, Encode};
use chrono::DateTime;
use ic_stable_structures::{storable::Bound, Storable};
use serde::Deserialize;

use crate::{
    clock::now_nanos,
    constants::MAX_JOURNAL_QUERY,
    state::{insert_journal_collection, JOURNAL},
    utils::error::GatewayResult,
};

/// Category of a journal entry
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub enum LogType {
    /// General progress information
    Info,
    /// A contract read
    Read,
    /// A prepared or submitted transaction
    Transaction,
    /// A provider's reputation was adjusted
    ProviderReputationChange,
}

/// Single journal entry
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct JournalEntry {
    pub date_and_time: String,
    pub entry: GatewayResult<()>,
    pub log_type: LogType,
    pub note: Option<String>,
}

/// Live collection of entries belonging to one operation.
/// Committed to the journal on drop, unless it is empty.
pub struct JournalCollection {
    start_date_and_time: String,
    operation: Option<String>,
    entries: Vec<JournalEntry>,
}

impl JournalCollection {
    /// Opens a new collection for the named operation
    pub fn open<S: AsRef<str>>(operation: Option<S>) -> Self {
        Self {
            start_date_and_time: date_and_time(),
            operation: operation.map(|name| name.as_ref().to_string()),
            entries: vec![],
        }
    }

    /// Appends a note to the collection
    pub fn append_note<S: AsRef<str>>(
        &mut self,
        entry: GatewayResult<()>,
        log_type: LogType,
        note: S,
    ) -> &mut Self {
        let note = note.as_ref().to_string();
        trace(format!(
            "[{}] {:?} {:?}: {}",
            self.operation.as_deref().unwrap_or("-"),
            log_type,
            entry,
            note
        ));
        self.entries.push(JournalEntry {
            date_and_time: date_and_time(),
            entry,
            log_type,
            note: Some(note),
        });
        self
    }

    /// Snapshot of the collection in its stored form
    pub fn snapshot(&self) -> StableJournalCollection {
        StableJournalCollection {
            start_date_and_time: self.start_date_and_time.clone(),
            end_date_and_time: date_and_time(),
            operation: self.operation.clone(),
            entries: self.entries.clone(),
        }
    }
}

impl Drop for JournalCollection {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            insert_journal_collection(self.snapshot());
        }
    }
}

/// Stored form of a journal collection
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct StableJournalCollection {
    pub start_date_and_time: String,
    pub end_date_and_time: String,
    pub operation: Option<String>,
    pub entries: Vec<JournalEntry>,
}

impl StableJournalCollection {
    /// Returns `true` if every entry is a provider reputation change
    pub fn is_reputation_change(&self) -> bool {
        !self.entries.is_empty()
            && self
                .entries
                .iter()
                .all(|entry| entry.log_type == LogType::ProviderReputationChange)
    }
}

impl Storable for StableJournalCollection {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(Encode!(self).expect("journal collections are always encodable"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        Decode!(bytes.as_ref(), Self).expect("journal collections are always decodable")
    }

    const BOUND: Bound = Bound::Unbounded;
}

/// The `depth` most recent collections, newest first
pub fn recent_collections(depth: u64) -> Vec<StableJournalCollection> {
    let depth = depth.min(MAX_JOURNAL_QUERY);
    JOURNAL.with(|journal| {
        let journal = journal.borrow();
        let skip = journal.len().saturating_sub(depth);
        let mut collections: Vec<StableJournalCollection> = journal
            .iter()
            .skip(skip as usize)
            .map(|(_, collection)| collection)
            .collect();
        collections.reverse();
        collections
    })
}

/// Writes a line to the replica's debug log
pub fn trace<S: AsRef<str>>(message: S) {
    #[cfg(target_arch = "wasm32")]
    ic_exports::ic_cdk::print(message.as_ref());
    #[cfg(not(target_arch = "wasm32"))]
    println!("{}", message.as_ref());
}

fn date_and_time() -> String {
    DateTime::from_timestamp_nanos(now_nanos() as i64).to_rfc3339()
}
