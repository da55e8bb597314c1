//! In-memory account cache.
//!
//! Entries never expire; they are dropped by explicit invalidation when an
//! account is updated or deleted. Each phone id has its own generation
//! counter so an invalidation only races with resolves of the same key.

use super::AccountCache;
use crate::models::account::Account;
use dashmap::DashMap;

#[derive(Default)]
pub struct DashMapAccountCache {
    accounts: DashMap<String, Account>,
    generations: DashMap<String, u64>,
}

impl DashMapAccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountCache for DashMapAccountCache {
    fn get(&self, phone_id: &str) -> Option<Account> {
        self.accounts.get(phone_id).map(|entry| entry.value().clone())
    }

    fn generation(&self, phone_id: &str) -> u64 {
        self.generations
            .get(phone_id)
            .map(|generation| *generation)
            .unwrap_or_default()
    }

    fn insert(&self, account: Account, generation: u64) -> bool {
        // The read guard on the generation shard is held across the insert:
        // `invalidate` needs the write guard, so it either runs before (and
        // the check fails) or after (and removes this entry).
        let current = self.generations.get(&account.phone_id);
        if current.as_deref().copied().unwrap_or_default() != generation {
            return false;
        }

        self.accounts.insert(account.phone_id.clone(), account);
        true
    }

    fn invalidate(&self, phone_id: &str) {
        let mut generation = self.generations.entry(phone_id.to_string()).or_insert(0);
        *generation += 1;
        self.accounts.remove(phone_id);
    }
}

/// Cache that stores nothing; every resolve reads the store.
pub struct NoopAccountCache;

impl AccountCache for NoopAccountCache {
    fn get(&self, _phone_id: &str) -> Option<Account> {
        None
    }

    fn generation(&self, _phone_id: &str) -> u64 {
        0
    }

    fn insert(&self, _account: Account, _generation: u64) -> bool {
        false
    }

    fn invalidate(&self, _phone_id: &str) {}
}
