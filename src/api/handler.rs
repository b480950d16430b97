use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::models::*;
use crate::{
    error::AppResult,
    ledger::{models::Profile, store::LedgerStore},
    middleware::SettlementRateLimit,
    query::QueryService,
    settlement::SettlementEngine,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub query: Arc<QueryService>,
    pub settlement: Arc<SettlementEngine>,
    pub rate_limit: Arc<SettlementRateLimit>,
}

/// Liveness probe, the only route that skips profile resolution
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Fetch one contract the caller is a party to
/// GET /contracts/:id
pub async fn get_contract(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<i64>,
) -> AppResult<Json<ContractResponse>> {
    let contract = state.query.contract_for(id, &profile).await?;
    Ok(Json(ContractResponse::from(contract)))
}

/// List the caller's non-terminated contracts
/// GET /contracts
pub async fn list_active_contracts(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
) -> AppResult<Json<Vec<ContractResponse>>> {
    let contracts = state.query.active_contracts(&profile).await?;

    Ok(Json(
        contracts.into_iter().map(ContractResponse::from).collect(),
    ))
}

/// List unpaid jobs on the caller's active contracts
/// GET /jobs/unpaid
pub async fn list_unpaid_jobs(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
) -> AppResult<Json<Vec<JobResponse>>> {
    let jobs = state.query.unpaid_jobs(&profile).await?;

    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

/// Settle a job, moving its full price from client to contractor
/// POST /jobs/:job_id/pay
pub async fn pay_job(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(job_id): Path<i64>,
) -> AppResult<Json<PaymentResponse>> {
    info!(
        "Payment requested for job {} by profile {}",
        job_id, profile.id
    );

    let outcome = state.settlement.pay_job(job_id, &profile).await?;

    Ok(Json(PaymentResponse::from(outcome)))
}

/// Fund a client balance, capped at 25% of the caller's unpaid obligations
/// POST /balances/deposit/:user_id
pub async fn deposit(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(user_id): Path<i64>,
    body: Option<Json<DepositRequest>>,
) -> AppResult<Json<DepositResponse>> {
    // A missing or malformed body becomes a missing amount, which the
    // engine rejects with a typed error
    let amount = body.and_then(|Json(request)| request.amount);

    info!(
        "Deposit of {:?} to profile {} requested by profile {}",
        amount, user_id, profile.id
    );

    let receipt = state.settlement.deposit(user_id, amount, &profile).await?;

    Ok(Json(DepositResponse::from(receipt)))
}
