use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::debug;

use crate::models::transaction::{RawTransaction, TradeKey};

/// Counts reported after an upload is merged into a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreUpdate {
    /// Rows that were new to the store
    pub added: usize,
    /// Rows held after the merge
    pub total: usize,
}

/// Session-level holder of every transaction uploaded so far.
///
/// Implementations must make `append_dedup` atomic: concurrent uploads
/// never lose rows and never store the same (account, trade key) twice.
pub trait TradeStore: Send + Sync {
    /// Copy of the stored transactions, in insertion order.
    fn snapshot(&self) -> Vec<RawTransaction>;

    /// Merge `incoming`, keeping the first occurrence of every trade key
    /// within each account.
    fn append_dedup(&self, incoming: Vec<RawTransaction>) -> StoreUpdate;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);
}

/// Process-local store guarded by a single mutex.
#[derive(Debug, Default)]
pub struct InMemoryTradeStore {
    inner: Mutex<Vec<RawTransaction>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

type StoreKey = (Option<String>, TradeKey);

// Accounts stay distinct in the store; the account filter picks one later
fn store_key(tx: &RawTransaction) -> StoreKey {
    (tx.account.clone(), tx.trade_key())
}

impl TradeStore for InMemoryTradeStore {
    fn snapshot(&self) -> Vec<RawTransaction> {
        self.inner.lock().clone()
    }

    fn append_dedup(&self, incoming: Vec<RawTransaction>) -> StoreUpdate {
        // Read, merge and replace under one lock
        let mut rows = self.inner.lock();
        let mut seen: HashSet<StoreKey> = rows.iter().map(store_key).collect();
        let before = rows.len();
        rows.extend(incoming.into_iter().filter(|tx| seen.insert(store_key(tx))));

        let update = StoreUpdate {
            added: rows.len() - before,
            total: rows.len(),
        };
        debug!(added = update.added, total = update.total, "Merged upload into trade store");
        update
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }
}
