use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Storage-layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Settlement rejections and failures
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Contract not found: {0}")]
    ContractNotFound(i64),

    #[error("Contract {0} is terminated")]
    ContractClosed(i64),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Insufficient funds: required {required}, available {balance}")]
    InsufficientFunds { balance: Decimal, required: Decimal },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Deposit of {amount} exceeds the cap of {deposit_cap} ({pending_jobs} unpaid jobs totaling {pending_total})")]
    DepositLimitExceeded {
        amount: Decimal,
        pending_jobs: i64,
        pending_total: Decimal,
        deposit_cap: Decimal,
    },

    #[error("Settlement failed: {0}")]
    Failed(#[from] StoreError),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Settlement(SettlementError::JobNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "JOB_NOT_FOUND",
                format!("Job not found: {}", id),
                None,
            ),
            AppError::Settlement(SettlementError::ContractNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "CONTRACT_NOT_FOUND",
                format!("Contract not found: {}", id),
                None,
            ),
            AppError::Settlement(SettlementError::ContractClosed(id)) => (
                StatusCode::CONFLICT,
                "CONTRACT_CLOSED",
                format!("Contract {} is terminated and can no longer be paid against", id),
                Some(serde_json::json!({ "contract_id": id })),
            ),
            AppError::Settlement(SettlementError::NotAuthorized(reason)) => (
                StatusCode::FORBIDDEN,
                "NOT_AUTHORIZED",
                reason,
                None,
            ),
            AppError::Settlement(SettlementError::InsufficientFunds { balance, required }) => (
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_FUNDS",
                format!("Insufficient funds: required {}, available {}", required, balance),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required,
                })),
            ),
            AppError::Settlement(SettlementError::InvalidAmount(reason)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_AMOUNT",
                reason,
                None,
            ),
            AppError::Settlement(SettlementError::UserNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "USER_NOT_FOUND",
                format!("User not found: {}", id),
                None,
            ),
            AppError::Settlement(SettlementError::DepositLimitExceeded {
                amount,
                pending_jobs,
                pending_total,
                deposit_cap,
            }) => (
                StatusCode::BAD_REQUEST,
                "DEPOSIT_LIMIT_EXCEEDED",
                format!(
                    "Deposit of {} exceeds the cap of {} (25% of {} pending across {} unpaid jobs)",
                    amount, deposit_cap, pending_total, pending_jobs
                ),
                Some(serde_json::json!({
                    "pending_jobs": pending_jobs,
                    "pending_total": pending_total,
                    "deposit_cap": deposit_cap,
                })),
            ),
            AppError::Settlement(SettlementError::Failed(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SETTLEMENT_FAILED",
                "Settlement could not be completed".to_string(),
                None,
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::Unauthenticated(reason) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                reason,
                None,
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many settlement requests, please try again later".to_string(),
                None,
            ),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError::Store(StoreError::Database(error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Store(StoreError::Migrate(error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
