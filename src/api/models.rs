use crate::ledger::models::*;
use crate::settlement::{DepositReceipt, PaymentOutcome};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ========== REQUEST MODELS ==========

/// Body of a deposit request. The amount is optional on the wire so a
/// missing field reaches the engine as a typed rejection instead of a
/// generic 422.
#[derive(Debug, Default, Deserialize)]
pub struct DepositRequest {
    pub amount: Option<Decimal>,
}

// ========== RESPONSE MODELS ==========

/// Contract as seen by one of its parties
#[derive(Debug, Serialize)]
pub struct ContractResponse {
    pub id: i64,
    pub client_id: i64,
    pub contractor_id: i64,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Contract> for ContractResponse {
    fn from(contract: Contract) -> Self {
        Self {
            id: contract.id,
            client_id: contract.client_id,
            contractor_id: contract.contractor_id,
            status: contract.status,
            created_at: contract.created_at,
            updated_at: contract.updated_at,
        }
    }
}

/// Job response, with the nullable stored flag normalized to a plain bool
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: i64,
    pub contract_id: i64,
    pub price: Decimal,
    pub paid: bool,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            contract_id: job.contract_id,
            price: job.price,
            paid: job.is_paid(),
            payment_date: job.payment_date,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Payment response. Retrying a settled job answers `already_paid` with the
/// original payment date rather than an error.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentResponse {
    Settled {
        settlement_id: Uuid,
        job_id: i64,
        contract_id: i64,
        client_id: i64,
        contractor_id: i64,
        amount: Decimal,
        client_balance: Decimal,
        paid_at: DateTime<Utc>,
    },
    AlreadyPaid {
        job_id: i64,
        payment_date: Option<DateTime<Utc>>,
    },
}

impl From<PaymentOutcome> for PaymentResponse {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Settled(receipt) => PaymentResponse::Settled {
                settlement_id: receipt.settlement_id,
                job_id: receipt.job_id,
                contract_id: receipt.contract_id,
                client_id: receipt.client_id,
                contractor_id: receipt.contractor_id,
                amount: receipt.amount,
                client_balance: receipt.client_balance,
                paid_at: receipt.paid_at,
            },
            PaymentOutcome::AlreadyPaid {
                job_id,
                payment_date,
            } => PaymentResponse::AlreadyPaid {
                job_id,
                payment_date,
            },
        }
    }
}

/// Deposit response
#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub settlement_id: Uuid,
    pub client_id: i64,
    pub target_id: i64,
    pub amount: Decimal,
    pub target_balance: Decimal,
    pub deposited_at: DateTime<Utc>,
}

impl From<DepositReceipt> for DepositResponse {
    fn from(receipt: DepositReceipt) -> Self {
        Self {
            settlement_id: receipt.settlement_id,
            client_id: receipt.client_id,
            target_id: receipt.target_id,
            amount: receipt.amount,
            target_balance: receipt.target_balance,
            deposited_at: receipt.deposited_at,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
