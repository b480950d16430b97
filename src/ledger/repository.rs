use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::access::PartyFilter;
use super::models::{Contract, Job, Profile};
use super::store::{LedgerStore, LedgerTx, PendingObligations};
use crate::error::StoreError;

/// Postgres-backed ledger - THE source of truth for all state
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ========== POOL-LEVEL READS ==========

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn find_profile(&self, id: i64) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, kind, balance, created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn find_contract_for(
        &self,
        id: i64,
        party: &PartyFilter,
    ) -> Result<Option<Contract>, StoreError> {
        // column() comes from a closed enum, never from request input
        let query = format!(
            r#"
            SELECT id, client_id, contractor_id, status, created_at, updated_at
            FROM contracts
            WHERE id = $1 AND {} = $2
            "#,
            party.column()
        );

        let contract = sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(party.profile_id())
            .fetch_optional(&self.pool)
            .await?;

        Ok(contract)
    }

    async fn list_active_contracts(
        &self,
        party: &PartyFilter,
    ) -> Result<Vec<Contract>, StoreError> {
        let query = format!(
            r#"
            SELECT id, client_id, contractor_id, status, created_at, updated_at
            FROM contracts
            WHERE {} = $1 AND status IN ('new', 'in_progress')
            ORDER BY id
            "#,
            party.column()
        );

        let contracts = sqlx::query_as::<_, Contract>(&query)
            .bind(party.profile_id())
            .fetch_all(&self.pool)
            .await?;

        Ok(contracts)
    }

    async fn list_unpaid_jobs(&self, party: &PartyFilter) -> Result<Vec<Job>, StoreError> {
        let query = format!(
            r#"
            SELECT j.id, j.contract_id, j.price, j.paid, j.payment_date, j.created_at, j.updated_at
            FROM jobs j
            JOIN contracts c ON c.id = j.contract_id
            WHERE c.{} = $1
              AND c.status IN ('new', 'in_progress')
              AND j.paid IS NOT TRUE
            ORDER BY j.id
            "#,
            party.column()
        );

        let jobs = sqlx::query_as::<_, Job>(&query)
            .bind(party.profile_id())
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }
}

/// One open settlement transaction over a pooled connection
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

// ========== TRANSACTIONAL OPERATIONS ==========

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_job_for_update(&mut self, id: i64) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, contract_id, price, paid, payment_date, created_at, updated_at
            FROM jobs
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(job)
    }

    async fn find_contract(&mut self, id: i64) -> Result<Option<Contract>, StoreError> {
        let contract = sqlx::query_as::<_, Contract>(
            r#"
            SELECT id, client_id, contractor_id, status, created_at, updated_at
            FROM contracts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(contract)
    }

    async fn find_profile_for_update(&mut self, id: i64) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, kind, balance, created_at, updated_at
            FROM profiles
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(profile)
    }

    async fn update_profile_balance(
        &mut self,
        id: i64,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET balance = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(balance)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!(
                "balance update touched no rows for profile {}",
                id
            )));
        }

        Ok(())
    }

    async fn mark_job_paid(&mut self, id: i64, paid_at: DateTime<Utc>) -> Result<(), StoreError> {
        // The row is locked by this point; zero rows means the paid flag raced anyway
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET paid = TRUE, payment_date = $2, updated_at = NOW()
            WHERE id = $1 AND paid IS NOT TRUE
            "#,
        )
        .bind(id)
        .bind(paid_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!(
                "job {} was already marked paid",
                id
            )));
        }

        Ok(())
    }

    async fn unpaid_obligations_for_client(
        &mut self,
        client_id: i64,
    ) -> Result<PendingObligations, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS job_count, COALESCE(SUM(j.price), 0) AS total
            FROM jobs j
            JOIN contracts c ON c.id = j.contract_id
            WHERE c.client_id = $1 AND j.paid IS NOT TRUE
            "#,
        )
        .bind(client_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(PendingObligations {
            job_count: row.try_get("job_count")?,
            total: row.try_get::<Decimal, _>("total")?,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
