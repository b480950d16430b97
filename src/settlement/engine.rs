use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{SettlementError, StoreError};
use crate::ledger::models::{Profile, ProfileType};
use crate::ledger::store::{LedgerStore, LedgerTx};

/// Share of outstanding obligations a client may move in one deposit
pub const DEPOSIT_CAP_RATIO: Decimal = dec!(0.25);

/// Record of a settled job payment
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub settlement_id: Uuid,
    pub job_id: i64,
    pub contract_id: i64,
    pub client_id: i64,
    pub contractor_id: i64,
    pub amount: Decimal,
    pub client_balance: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Record of a completed deposit
#[derive(Debug, Clone, Serialize)]
pub struct DepositReceipt {
    pub settlement_id: Uuid,
    pub client_id: i64,
    pub target_id: i64,
    pub amount: Decimal,
    pub target_balance: Decimal,
    pub deposited_at: DateTime<Utc>,
}

/// Outcome of a payment request. Paying a job that is already settled is a
/// no-op, not an error, so retries converge instead of alarming the caller.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Settled(PaymentReceipt),
    AlreadyPaid {
        job_id: i64,
        payment_date: Option<DateTime<Utc>>,
    },
}

/// Moves money between profiles. Every operation runs as one store
/// transaction: validation reads, balance writes and the paid flag either
/// all land or none do.
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // ========== JOB PAYMENT ==========

    /// Pay a job on behalf of `caller`, moving the full price from the
    /// contract's client to its contractor.
    pub async fn pay_job(
        &self,
        job_id: i64,
        caller: &Profile,
    ) -> Result<PaymentOutcome, SettlementError> {
        let mut tx = self.store.begin().await?;

        match self.run_payment(&mut tx, job_id, caller).await {
            Ok(PaymentOutcome::Settled(receipt)) => {
                tx.commit().await?;
                info!(
                    "Settled job {}: {} from client {} to contractor {} (settlement {})",
                    receipt.job_id,
                    receipt.amount,
                    receipt.client_id,
                    receipt.contractor_id,
                    receipt.settlement_id
                );
                Ok(PaymentOutcome::Settled(receipt))
            }
            Ok(outcome @ PaymentOutcome::AlreadyPaid { .. }) => {
                tx.rollback().await?;
                info!("Job {} is already paid, nothing to settle", job_id);
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after rejected payment failed: {}", rollback_err);
                }
                warn!(
                    "Payment of job {} by profile {} rejected: {}",
                    job_id, caller.id, err
                );
                Err(err)
            }
        }
    }

    async fn run_payment(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        job_id: i64,
        caller: &Profile,
    ) -> Result<PaymentOutcome, SettlementError> {
        let job = tx
            .find_job_for_update(job_id)
            .await?
            .ok_or(SettlementError::JobNotFound(job_id))?;

        if job.is_paid() {
            return Ok(PaymentOutcome::AlreadyPaid {
                job_id: job.id,
                payment_date: job.payment_date,
            });
        }

        let contract = tx
            .find_contract(job.contract_id)
            .await?
            .ok_or(SettlementError::ContractNotFound(job.contract_id))?;

        if !contract.is_active() {
            return Err(SettlementError::ContractClosed(contract.id));
        }

        if !caller.is_client() {
            return Err(SettlementError::NotAuthorized(
                "only client profiles can pay for jobs".to_string(),
            ));
        }

        if caller.id != contract.client_id {
            return Err(SettlementError::NotAuthorized(
                "a job can only be paid by its contract's client".to_string(),
            ));
        }

        // Balance checks run against fresh rows locked inside this
        // transaction, not the profile resolved at the HTTP edge
        let (client, contractor) = self
            .lock_profile_pair(tx, contract.client_id, contract.contractor_id)
            .await?;

        if !client.can_cover(job.price) {
            return Err(SettlementError::InsufficientFunds {
                balance: client.balance,
                required: job.price,
            });
        }

        let paid_at = Utc::now();
        tx.update_profile_balance(client.id, client.balance - job.price)
            .await?;
        tx.update_profile_balance(contractor.id, contractor.balance + job.price)
            .await?;
        tx.mark_job_paid(job.id, paid_at).await?;

        Ok(PaymentOutcome::Settled(PaymentReceipt {
            settlement_id: Uuid::new_v4(),
            job_id: job.id,
            contract_id: contract.id,
            client_id: client.id,
            contractor_id: contractor.id,
            amount: job.price,
            client_balance: client.balance - job.price,
            paid_at,
        }))
    }

    /// Lock both parties in ascending id order so concurrent settlements
    /// touching the same profiles cannot deadlock
    async fn lock_profile_pair(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        client_id: i64,
        contractor_id: i64,
    ) -> Result<(Profile, Profile), SettlementError> {
        let (first, second) = if client_id <= contractor_id {
            (client_id, contractor_id)
        } else {
            (contractor_id, client_id)
        };

        let first_row = self.lock_party(tx, first).await?;
        let second_row = self.lock_party(tx, second).await?;

        if first_row.id == client_id {
            Ok((first_row, second_row))
        } else {
            Ok((second_row, first_row))
        }
    }

    async fn lock_party(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        id: i64,
    ) -> Result<Profile, SettlementError> {
        tx.find_profile_for_update(id).await?.ok_or_else(|| {
            SettlementError::Failed(StoreError::Backend(format!(
                "contract references missing profile {}",
                id
            )))
        })
    }

    // ========== DEPOSITS ==========

    /// Move `amount` from the caller's balance onto a client balance. The
    /// cap is always computed from the caller's own unpaid obligations,
    /// whoever the target is. Target and caller may be the same profile, in
    /// which case the debit and credit cancel out.
    pub async fn deposit(
        &self,
        target_id: i64,
        amount: Option<Decimal>,
        caller: &Profile,
    ) -> Result<DepositReceipt, SettlementError> {
        let amount = match amount {
            Some(amount) if amount > Decimal::ZERO => amount,
            Some(_) => {
                return Err(SettlementError::InvalidAmount(
                    "deposit amount must be greater than zero".to_string(),
                ))
            }
            None => {
                return Err(SettlementError::InvalidAmount(
                    "deposit amount is required".to_string(),
                ))
            }
        };

        if !caller.is_client() {
            return Err(SettlementError::NotAuthorized(
                "only client profiles can deposit funds".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;

        match self.run_deposit(&mut tx, target_id, amount, caller).await {
            Ok(receipt) => {
                tx.commit().await?;
                info!(
                    "Deposited {} from client {} to client {} (settlement {})",
                    receipt.amount, receipt.client_id, receipt.target_id, receipt.settlement_id
                );
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after rejected deposit failed: {}", rollback_err);
                }
                warn!(
                    "Deposit to profile {} by profile {} rejected: {}",
                    target_id, caller.id, err
                );
                Err(err)
            }
        }
    }

    async fn run_deposit(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        target_id: i64,
        amount: Decimal,
        caller: &Profile,
    ) -> Result<DepositReceipt, SettlementError> {
        let (caller_row, target_row) = self.lock_deposit_pair(tx, caller.id, target_id).await?;

        if target_row.kind != ProfileType::Client {
            return Err(SettlementError::NotAuthorized(
                "deposits can only fund client profiles".to_string(),
            ));
        }

        let pending = tx.unpaid_obligations_for_client(caller.id).await?;
        let deposit_cap = pending.total * DEPOSIT_CAP_RATIO;

        if amount > deposit_cap {
            return Err(SettlementError::DepositLimitExceeded {
                amount,
                pending_jobs: pending.job_count,
                pending_total: pending.total,
                deposit_cap,
            });
        }

        if !caller_row.can_cover(amount) {
            return Err(SettlementError::InsufficientFunds {
                balance: caller_row.balance,
                required: amount,
            });
        }

        let deposited_at = Utc::now();
        let target_balance = if target_row.id == caller_row.id {
            // Debit and credit meet on one row, one net-zero write
            tx.update_profile_balance(caller_row.id, caller_row.balance)
                .await?;
            caller_row.balance
        } else {
            tx.update_profile_balance(caller_row.id, caller_row.balance - amount)
                .await?;
            tx.update_profile_balance(target_row.id, target_row.balance + amount)
                .await?;
            target_row.balance + amount
        };

        Ok(DepositReceipt {
            settlement_id: Uuid::new_v4(),
            client_id: caller_row.id,
            target_id: target_row.id,
            amount,
            target_balance,
            deposited_at,
        })
    }

    /// Same ascending-id lock rule as payments. A missing target is the
    /// caller's mistake; a missing caller row means the store lost a profile
    /// that just authenticated.
    async fn lock_deposit_pair(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        caller_id: i64,
        target_id: i64,
    ) -> Result<(Profile, Profile), SettlementError> {
        if caller_id == target_id {
            let row = tx
                .find_profile_for_update(caller_id)
                .await?
                .ok_or(SettlementError::UserNotFound(caller_id))?;
            return Ok((row.clone(), row));
        }

        let (first, second) = if caller_id <= target_id {
            (caller_id, target_id)
        } else {
            (target_id, caller_id)
        };

        let first_row = tx.find_profile_for_update(first).await?;
        let second_row = tx.find_profile_for_update(second).await?;

        let mut caller_row = None;
        let mut target_row = None;
        for row in [first_row, second_row].into_iter().flatten() {
            if row.id == caller_id {
                caller_row = Some(row);
            } else {
                target_row = Some(row);
            }
        }

        let target = target_row.ok_or(SettlementError::UserNotFound(target_id))?;
        let caller = caller_row.ok_or_else(|| {
            SettlementError::Failed(StoreError::Backend(format!(
                "caller profile {} disappeared during deposit",
                caller_id
            )))
        })?;

        Ok((caller, target))
    }
}
