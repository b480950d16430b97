use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;

/// Profile role enum - every account is exactly one of these
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "profile_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProfileType {
    Client,
    Contractor,
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ProfileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileType::Client => "client",
            ProfileType::Contractor => "contractor",
        }
    }
}

/// Contract lifecycle enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "contract_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    New,
    InProgress,
    Terminated,
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::New => "new",
            ContractStatus::InProgress => "in_progress",
            ContractStatus::Terminated => "terminated",
        }
    }

    /// Active contracts accept queries and payments
    pub fn is_active(&self) -> bool {
        !matches!(self, ContractStatus::Terminated)
    }
}

/// Profile entity - a balance-holding account, client or contractor
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: i64,
    pub kind: ProfileType,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_client(&self) -> bool {
        self.kind == ProfileType::Client
    }

    pub fn can_cover(&self, required: Decimal) -> bool {
        self.balance >= required
    }
}

/// Contract entity - one client hiring one contractor
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub id: i64,
    pub client_id: i64,
    pub contractor_id: i64,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Job entity - a billable unit of work under a contract, paid at most once
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: i64,
    pub contract_id: i64,
    pub price: Decimal,
    /// Nullable in the source data; NULL means never paid
    pub paid: Option<bool>,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_paid(&self) -> bool {
        self.paid.unwrap_or(false)
    }
}
