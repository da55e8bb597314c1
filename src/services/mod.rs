pub mod account_cache;

use crate::models;
use std::sync::Arc;

/// Process-wide projection of accounts keyed by provider phone id.
///
/// Readers snapshot [`AccountCache::generation`] before loading from the
/// store and hand it back to [`AccountCache::insert`]; an insert whose
/// generation was bumped by an invalidation in between is dropped.
pub trait AccountCache: Send + Sync {
    fn get(&self, phone_id: &str) -> Option<models::account::Account>;

    fn generation(&self, phone_id: &str) -> u64;

    /// Returns false when the entry was discarded as stale.
    fn insert(&self, account: models::account::Account, generation: u64) -> bool;

    fn invalidate(&self, phone_id: &str);
}

pub type ImplAccountCache = Arc<dyn AccountCache>;
