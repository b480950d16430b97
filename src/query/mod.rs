// Read-side lookups, always scoped to the calling profile

use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::ledger::access::PartyFilter;
use crate::ledger::models::{Contract, Job, Profile};
use crate::ledger::store::LedgerStore;

/// Serves contract and job reads through the caller's visibility filter.
/// Nothing here ever returns a row the caller is not a party to.
pub struct QueryService {
    store: Arc<dyn LedgerStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// A single contract, only if the caller is its client or contractor.
    /// A contract owned by someone else looks exactly like one that does
    /// not exist.
    pub async fn contract_for(&self, id: i64, caller: &Profile) -> AppResult<Contract> {
        let party = PartyFilter::for_profile(caller);
        self.store
            .find_contract_for(id, &party)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("contract {}", id)))
    }

    /// Non-terminated contracts the caller is a party to
    pub async fn active_contracts(&self, caller: &Profile) -> AppResult<Vec<Contract>> {
        let party = PartyFilter::for_profile(caller);
        Ok(self.store.list_active_contracts(&party).await?)
    }

    /// Unpaid jobs on the caller's active contracts. An empty list is a
    /// valid answer, not an error.
    pub async fn unpaid_jobs(&self, caller: &Profile) -> AppResult<Vec<Job>> {
        let party = PartyFilter::for_profile(caller);
        Ok(self.store.list_unpaid_jobs(&party).await?)
    }
}
