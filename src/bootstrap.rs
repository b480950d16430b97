use std::{sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::{
    api::handler::AppState,
    config::Config,
    error::AppResult,
    ledger::{repository::LedgerRepository, store::LedgerStore},
    middleware::SettlementRateLimit,
    query::QueryService,
    settlement::SettlementEngine,
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Database pool
    let pool = initialize_database(config).await?;

    // Core components
    let store: Arc<dyn LedgerStore> = Arc::new(LedgerRepository::new(pool));
    info!("✅ Ledger store initialized");

    let query = Arc::new(QueryService::new(store.clone()));
    info!("✅ Query service initialized");

    let settlement = Arc::new(SettlementEngine::new(store.clone()));
    info!("✅ Settlement engine initialized");

    let rate_limit = Arc::new(SettlementRateLimit::new(
        config.settlement_rate_limit,
        config.settlement_rate_window_secs,
    ));
    info!(
        "✅ Settlement rate limit: {} requests per {}s per profile",
        config.settlement_rate_limit, config.settlement_rate_window_secs
    );

    Ok(AppState {
        store,
        query,
        settlement,
        rate_limit,
    })
}

async fn initialize_database(config: &Config) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await?;

    info!(
        "✓ Database pool configured: {} max connections",
        config.max_db_connections
    );

    // Run migrations
    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
