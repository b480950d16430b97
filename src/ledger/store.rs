use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::access::PartyFilter;
use super::models::{Contract, Job, Profile};
use crate::error::StoreError;

/// A client's outstanding debt, used to compute the deposit cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingObligations {
    pub job_count: i64,
    pub total: Decimal,
}

/// Pool-level ledger reads plus transaction entry.
///
/// The settlement engine and query service only ever see this contract, so
/// tests can swap Postgres for an in-process double.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_profile(&self, id: i64) -> Result<Option<Profile>, StoreError>;

    async fn find_contract_for(
        &self,
        id: i64,
        party: &PartyFilter,
    ) -> Result<Option<Contract>, StoreError>;

    async fn list_active_contracts(&self, party: &PartyFilter)
        -> Result<Vec<Contract>, StoreError>;

    /// Unpaid jobs whose owning contract is active and visible to the party
    async fn list_unpaid_jobs(&self, party: &PartyFilter) -> Result<Vec<Job>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;
}

/// Operations available inside one atomic settlement transaction.
///
/// The `for_update` reads take row locks; callers touching more than one
/// profile must lock them in ascending id order.
#[async_trait]
pub trait LedgerTx: Send {
    async fn find_job_for_update(&mut self, id: i64) -> Result<Option<Job>, StoreError>;

    async fn find_contract(&mut self, id: i64) -> Result<Option<Contract>, StoreError>;

    async fn find_profile_for_update(&mut self, id: i64) -> Result<Option<Profile>, StoreError>;

    async fn update_profile_balance(
        &mut self,
        id: i64,
        balance: Decimal,
    ) -> Result<(), StoreError>;

    async fn mark_job_paid(&mut self, id: i64, paid_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Every unpaid job whose contract names this client, terminated
    /// contracts included
    async fn unpaid_obligations_for_client(
        &mut self,
        client_id: i64,
    ) -> Result<PendingObligations, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
