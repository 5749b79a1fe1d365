use std::cell::RefCell;

use evm_rpc_types::RpcApi;
use ic_stable_structures::{
    memory_manager::{MemoryId, MemoryManager, VirtualMemory},
    DefaultMemoryImpl, StableBTreeMap,
};

use crate::{
    config::{InitArgs, PlatformConfig},
    journal::StableJournalCollection,
    platform::admin::AdminAccount,
};

pub type Memory = VirtualMemory<DefaultMemoryImpl>;

const JOURNAL_MEMORY_ID: MemoryId = MemoryId::new(0);
const INIT_ARGS_MEMORY_ID: MemoryId = MemoryId::new(1);

/// Key of the single install arguments entry
const INIT_ARGS_KEY: u8 = 0;

thread_local! {
    pub static CONFIG: RefCell<PlatformConfig> = RefCell::new(PlatformConfig::default());
    /// Providers paired with their reputation score
    pub static RPC_REPUTATIONS: RefCell<Vec<(i64, RpcApi)>> = RefCell::new(Vec::new());
    pub static ADMIN_ACCOUNT: RefCell<AdminAccount> = RefCell::new(AdminAccount::default());

    static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> =
        RefCell::new(MemoryManager::init(DefaultMemoryImpl::default()));

    pub static JOURNAL: RefCell<StableBTreeMap<u64, StableJournalCollection, Memory>> =
        RefCell::new(StableBTreeMap::init(
            MEMORY_MANAGER.with(|manager| manager.borrow().get(JOURNAL_MEMORY_ID)),
        ));

    /// Install arguments, replayed after upgrades
    static INIT_ARGS: RefCell<StableBTreeMap<u8, InitArgs, Memory>> =
        RefCell::new(StableBTreeMap::init(
            MEMORY_MANAGER.with(|manager| manager.borrow().get(INIT_ARGS_MEMORY_ID)),
        ));
}

/// Returns a copy of the current configuration
pub fn config() -> PlatformConfig {
    CONFIG.with(|config| config.borrow().clone())
}

/// Appends a collection to the journal under the next free key
pub fn insert_journal_collection(collection: StableJournalCollection) {
    JOURNAL.with(|journal| {
        let mut journal = journal.borrow_mut();
        let key = journal
            .last_key_value()
            .map(|(key, _)| key + 1)
            .unwrap_or_default();
        journal.insert(key, collection);
    });
}

pub fn store_init_args(args: InitArgs) {
    INIT_ARGS.with(|stored| stored.borrow_mut().insert(INIT_ARGS_KEY, args));
}

pub fn stored_init_args() -> Option<InitArgs> {
    INIT_ARGS.with(|stored| stored.borrow().get(&INIT_ARGS_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::init_args;

    #[test]
    fn install_arguments_outlive_the_heap() {
        assert!(stored_init_args().is_none());

        store_init_args(init_args());
        let restored = stored_init_args().unwrap();
        assert_eq!(restored.rpc_urls, init_args().rpc_urls);

        let config = PlatformConfig::try_from(restored).unwrap();
        assert_eq!(
            config.contracts,
            PlatformConfig::try_from(init_args()).unwrap().contracts
        );
    }
}
