use std::collections::BTreeSet;

use tracing::debug;

use crate::models::transaction::{AccountFilter, RawTransaction};

/// Account listing and selection over extracted transactions.
pub struct AccountService;

impl AccountService {
    pub fn new() -> Self {
        Self
    }

    /// Distinct accounts present in the transactions, sorted.
    pub fn accounts(&self, transactions: &[RawTransaction]) -> Vec<String> {
        transactions
            .iter()
            .filter_map(|tx| tx.account.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Restrict transactions to the selected account.
    ///
    /// Runs ahead of deduplication so a row repeated in another account
    /// cannot shadow the selected one.
    pub fn filter(
        &self,
        transactions: Vec<RawTransaction>,
        filter: &AccountFilter,
    ) -> Vec<RawTransaction> {
        if let AccountFilter::All = filter {
            return transactions;
        }
        let before = transactions.len();
        let kept: Vec<RawTransaction> = transactions
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect();
        debug!(kept = kept.len(), dropped = before - kept.len(), "Applied account filter");
        kept
    }
}

impl Default for AccountService {
    fn default() -> Self {
        Self::new()
    }
}
