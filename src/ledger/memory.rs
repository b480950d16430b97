use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::access::PartyFilter;
use super::models::{Contract, ContractStatus, Job, Profile, ProfileType};
use super::store::{LedgerStore, LedgerTx, PendingObligations};
use crate::error::StoreError;

const NO_WRITE_LIMIT: u32 = u32::MAX;

#[derive(Debug, Clone, Default)]
struct MemState {
    profiles: BTreeMap<i64, Profile>,
    contracts: BTreeMap<i64, Contract>,
    jobs: BTreeMap<i64, Job>,
}

/// In-process ledger with the same transactional surface as Postgres.
///
/// A transaction clones the state behind a mutex guard and writes to the
/// clone; commit swaps the clone in, rollback drops it. The failure knobs
/// let tests sever a settlement mid-write or at commit.
pub struct MemoryLedger {
    state: Arc<Mutex<MemState>>,
    fail_after_writes: AtomicU32,
    fail_on_commit: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState::default())),
            fail_after_writes: AtomicU32::new(NO_WRITE_LIMIT),
            fail_on_commit: AtomicBool::new(false),
        }
    }

    // ========== FIXTURES ==========

    pub async fn seed_profile(&self, id: i64, kind: ProfileType, balance: Decimal) -> Profile {
        let now = Utc::now();
        let profile = Profile {
            id,
            kind,
            balance,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .profiles
            .insert(id, profile.clone());
        profile
    }

    pub async fn seed_contract(
        &self,
        id: i64,
        client_id: i64,
        contractor_id: i64,
        status: ContractStatus,
    ) -> Contract {
        let now = Utc::now();
        let contract = Contract {
            id,
            client_id,
            contractor_id,
            status,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .contracts
            .insert(id, contract.clone());
        contract
    }

    pub async fn seed_job(&self, id: i64, contract_id: i64, price: Decimal) -> Job {
        self.insert_job(id, contract_id, price, None, None).await
    }

    pub async fn seed_paid_job(&self, id: i64, contract_id: i64, price: Decimal) -> Job {
        let paid_at = Utc::now();
        self.insert_job(id, contract_id, price, Some(true), Some(paid_at))
            .await
    }

    async fn insert_job(
        &self,
        id: i64,
        contract_id: i64,
        price: Decimal,
        paid: Option<bool>,
        payment_date: Option<DateTime<Utc>>,
    ) -> Job {
        let now = Utc::now();
        let job = Job {
            id,
            contract_id,
            price,
            paid,
            payment_date,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.jobs.insert(id, job.clone());
        job
    }

    // ========== FAILURE INJECTION ==========

    /// Let the next transaction perform `n` writes, then fail the one after
    pub fn fail_after_writes(&self, n: u32) {
        self.fail_after_writes.store(n, Ordering::SeqCst);
    }

    /// Fail transactions at commit, after every write went through
    pub fn fail_on_commit(&self) {
        self.fail_on_commit.store(true, Ordering::SeqCst);
    }

    // ========== INSPECTION ==========

    pub async fn profile_balance(&self, id: i64) -> Decimal {
        self.state.lock().await.profiles[&id].balance
    }

    pub async fn job(&self, id: i64) -> Job {
        self.state.lock().await.jobs[&id].clone()
    }

    /// Sum of every balance; settlement must never change it
    pub async fn total_balance(&self) -> Decimal {
        self.state
            .lock()
            .await
            .profiles
            .values()
            .map(|profile| profile.balance)
            .sum()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn party_matches(party: &PartyFilter, contract: &Contract) -> bool {
    match party {
        PartyFilter::Client(id) => contract.client_id == *id,
        PartyFilter::Contractor(id) => contract.contractor_id == *id,
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn find_profile(&self, id: i64) -> Result<Option<Profile>, StoreError> {
        Ok(self.state.lock().await.profiles.get(&id).cloned())
    }

    async fn find_contract_for(
        &self,
        id: i64,
        party: &PartyFilter,
    ) -> Result<Option<Contract>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .contracts
            .get(&id)
            .filter(|contract| party_matches(party, contract))
            .cloned())
    }

    async fn list_active_contracts(
        &self,
        party: &PartyFilter,
    ) -> Result<Vec<Contract>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .contracts
            .values()
            .filter(|contract| contract.is_active() && party_matches(party, contract))
            .cloned()
            .collect())
    }

    async fn list_unpaid_jobs(&self, party: &PartyFilter) -> Result<Vec<Job>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| !job.is_paid())
            .filter(|job| {
                state
                    .contracts
                    .get(&job.contract_id)
                    .map(|contract| contract.is_active() && party_matches(party, contract))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        let limit = self.fail_after_writes.load(Ordering::SeqCst);

        Ok(Box::new(MemoryTx {
            guard,
            working,
            writes_remaining: (limit != NO_WRITE_LIMIT).then_some(limit),
            fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
        }))
    }
}

/// Holds the ledger mutex for its whole lifetime, which is exactly the
/// serialization the row locks give the Postgres implementation
struct MemoryTx {
    guard: OwnedMutexGuard<MemState>,
    working: MemState,
    writes_remaining: Option<u32>,
    fail_on_commit: bool,
}

impl MemoryTx {
    fn consume_write(&mut self) -> Result<(), StoreError> {
        if let Some(remaining) = self.writes_remaining.as_mut() {
            if *remaining == 0 {
                return Err(StoreError::Backend("injected write failure".to_string()));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn find_job_for_update(&mut self, id: i64) -> Result<Option<Job>, StoreError> {
        Ok(self.working.jobs.get(&id).cloned())
    }

    async fn find_contract(&mut self, id: i64) -> Result<Option<Contract>, StoreError> {
        Ok(self.working.contracts.get(&id).cloned())
    }

    async fn find_profile_for_update(&mut self, id: i64) -> Result<Option<Profile>, StoreError> {
        Ok(self.working.profiles.get(&id).cloned())
    }

    async fn update_profile_balance(
        &mut self,
        id: i64,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        self.consume_write()?;
        let profile = self.working.profiles.get_mut(&id).ok_or_else(|| {
            StoreError::Backend(format!("balance update touched no rows for profile {}", id))
        })?;
        profile.balance = balance;
        profile.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_job_paid(&mut self, id: i64, paid_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.consume_write()?;
        let job = self
            .working
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("job {} not found", id)))?;
        if job.is_paid() {
            return Err(StoreError::Backend(format!(
                "job {} was already marked paid",
                id
            )));
        }
        job.paid = Some(true);
        job.payment_date = Some(paid_at);
        job.updated_at = paid_at;
        Ok(())
    }

    async fn unpaid_obligations_for_client(
        &mut self,
        client_id: i64,
    ) -> Result<PendingObligations, StoreError> {
        let pending: Vec<&Job> = self
            .working
            .jobs
            .values()
            .filter(|job| !job.is_paid())
            .filter(|job| {
                self.working
                    .contracts
                    .get(&job.contract_id)
                    .map(|contract| contract.client_id == client_id)
                    .unwrap_or(false)
            })
            .collect();

        Ok(PendingObligations {
            job_count: pending.len() as i64,
            total: pending.iter().map(|job| job.price).sum(),
        })
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_on_commit {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_writes_stay_invisible_until_commit() {
        let ledger = MemoryLedger::new();
        ledger
            .seed_profile(1, ProfileType::Client, dec!(100))
            .await;

        let mut tx = ledger.begin().await.unwrap();
        tx.update_profile_balance(1, dec!(40)).await.unwrap();

        let inside = tx.find_profile_for_update(1).await.unwrap().unwrap();
        assert_eq!(inside.balance, dec!(40));

        tx.commit().await.unwrap();
        assert_eq!(ledger.profile_balance(1).await, dec!(40));
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let ledger = MemoryLedger::new();
        ledger
            .seed_profile(1, ProfileType::Client, dec!(100))
            .await;

        let mut tx = ledger.begin().await.unwrap();
        tx.update_profile_balance(1, dec!(0)).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(ledger.profile_balance(1).await, dec!(100));
    }

    #[tokio::test]
    async fn test_injected_commit_failure_leaves_state_untouched() {
        let ledger = MemoryLedger::new();
        ledger
            .seed_profile(1, ProfileType::Client, dec!(100))
            .await;
        ledger.fail_on_commit();

        let mut tx = ledger.begin().await.unwrap();
        tx.update_profile_balance(1, dec!(0)).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(ledger.profile_balance(1).await, dec!(100));
    }

    #[tokio::test]
    async fn test_injected_write_failure_counts_writes() {
        let ledger = MemoryLedger::new();
        ledger
            .seed_profile(1, ProfileType::Client, dec!(100))
            .await;
        ledger.fail_after_writes(1);

        let mut tx = ledger.begin().await.unwrap();
        tx.update_profile_balance(1, dec!(50)).await.unwrap();
        assert!(tx.update_profile_balance(1, dec!(25)).await.is_err());
    }
}
